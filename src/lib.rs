pub mod catalog;
pub mod game;
pub mod manager;
pub mod storage;

use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

pub use catalog::{CardSource, CoreSet, StoredCards};
pub use game::{
    Ability, ActionKind, Card, CardKind, EffectKind, GameAction, GameEffect, GameEvent, GamePhase,
    GameState, GameStatus, Layer, PlayerState, ResourcePool, RuleEngine, RuleError,
    RuleResolution, TargetKind, TriggerKind,
};
pub use manager::{Deck, GameError, GameManager, Profile, ProfileStats};
pub use storage::{MemoryStore, Storage, StorageError};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
}

fn rule_error_to_js(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn game_error_to_js(error: GameError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

#[cfg(target_arch = "wasm32")]
fn log_action(game_id: &str, action: &str) {
    web_sys::console::log_1(&format!("{game_id}: {action}").into());
}

#[cfg(not(target_arch = "wasm32"))]
fn log_action(_game_id: &str, _action: &str) {}

/// Checks an action against a state without touching either. Resolves with
/// the structured rejection reason on failure.
#[wasm_bindgen(js_name = "validateAction")]
pub fn validate_action(state: JsValue, action: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let action: GameAction = from_value(action).map_err(JsValue::from)?;
    game::rules::validate_action(&state, &action).map_err(rule_error_to_js)
}

/// Stateless one-shot transition for hosts that keep their own snapshots:
/// validate, execute, run the effect pass and win check against the
/// built-in core set, and return `{state, events, winner}`.
#[wasm_bindgen(js_name = "applyAction")]
pub fn apply_action(state: JsValue, action: JsValue) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let action: GameAction = from_value(action).map_err(JsValue::from)?;
    game::rules::validate_action(&state, &action).map_err(rule_error_to_js)?;
    let events = game::rules::resolve_action(&mut state, &action, &CoreSet)
        .map_err(|fault| JsValue::from_str(&fault.detail))?;
    to_value(&RuleResolution::new(state, events)).map_err(JsValue::from)
}

/// The full built-in card set, for host-side deck building and display.
#[wasm_bindgen(js_name = "coreSet")]
pub fn core_set() -> Result<JsValue, JsValue> {
    to_value(catalog::core_set()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "starterDeck")]
pub fn starter_deck(layer: JsValue) -> Result<JsValue, JsValue> {
    let layer: Layer = from_value(layer).map_err(JsValue::from)?;
    to_value(&catalog::starter_deck(layer)).map_err(JsValue::from)
}

/// Orchestrator bound to an in-process store. The host seeds decks and
/// profiles through `put_record`, then drives games by code; every method
/// speaks JSON strings so the host can persist records as-is.
#[wasm_bindgen]
pub struct GameHost {
    manager: GameManager<MemoryStore>,
}

#[wasm_bindgen]
impl GameHost {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<GameHost, JsValue> {
        let mut store = MemoryStore::new();
        catalog::seed_core_set(&mut store).map_err(|err| JsValue::from_str(&err.detail))?;
        Ok(GameHost {
            manager: GameManager::new(store),
        })
    }

    pub fn put_record(&mut self, key: &str, value: &str) -> Result<(), JsValue> {
        self.manager
            .storage_mut()
            .put(key, value)
            .map_err(|err| JsValue::from_str(&err.detail))
    }

    pub fn get_record(&self, key: &str) -> Result<Option<String>, JsValue> {
        self.manager
            .storage()
            .get(key)
            .map_err(|err| JsValue::from_str(&err.detail))
    }

    pub fn create_game(&mut self, player_id: &str, deck_id: &str) -> Result<String, JsValue> {
        let state = self
            .manager
            .create_game(player_id, deck_id)
            .map_err(game_error_to_js)?;
        log_action(&state.id, "created");
        serde_json::to_string(&state).map_err(serde_to_js_error)
    }

    pub fn join_game(
        &mut self,
        game_code: &str,
        player_id: &str,
        deck_id: &str,
    ) -> Result<String, JsValue> {
        let state = self
            .manager
            .join_game(game_code, player_id, deck_id)
            .map_err(game_error_to_js)?;
        log_action(game_code, "joined");
        serde_json::to_string(&state).map_err(serde_to_js_error)
    }

    pub fn state_json(&self, game_code: &str) -> Result<String, JsValue> {
        let state = self.manager.state(game_code).map_err(game_error_to_js)?;
        serde_json::to_string(&state).map_err(serde_to_js_error)
    }

    pub fn apply_action_json(&mut self, game_code: &str, action_json: &str) -> Result<String, JsValue> {
        let action: GameAction = serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        log_action(game_code, action.kind.name());
        let resolution = self
            .manager
            .apply_action(game_code, action)
            .map_err(game_error_to_js)?;
        serde_json::to_string(&resolution).map_err(serde_to_js_error)
    }
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
