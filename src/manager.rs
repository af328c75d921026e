use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::catalog::{CardSource, StoredCards};
use crate::game::cards::{Card, CardId, PlayerId};
use crate::game::rules::{
    resolve_action, validate_action, GameAction, RuleError, RuleResolution,
};
use crate::game::state::{
    GamePhase, GameState, GameStatus, PlayerState, OPENING_HAND,
};
use crate::storage::{keys, Storage, StorageError};

/// A saved deck record: an ordered list of catalog card ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub id: String,
    pub name: String,
    pub cards: Vec<CardId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub wins: u32,
    pub losses: u32,
    pub win_streak: u32,
    pub games_played: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: PlayerId,
    pub username: String,
    #[serde(default)]
    pub statistics: ProfileStats,
}

/// Error taxonomy at the orchestrator boundary. `status` mirrors the
/// HTTP-ish class the transport layer should translate each case into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameError {
    Rejected { reason: RuleError },
    NotFound { resource: String },
    Conflict { detail: String },
    Internal { detail: String },
    Storage { error: StorageError },
}

impl GameError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        GameError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        GameError::Conflict {
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        GameError::Internal {
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            GameError::Rejected { .. } => 400,
            GameError::NotFound { .. } => 404,
            GameError::Conflict { .. } => 409,
            GameError::Internal { .. } | GameError::Storage { .. } => 500,
        }
    }
}

impl From<StorageError> for GameError {
    fn from(error: StorageError) -> Self {
        GameError::Storage { error }
    }
}

/// Top-level façade owning the storage handle. Every call is a full
/// read-modify-write round trip; the new state is computed completely
/// before the single persist, so a failure writes nothing.
pub struct GameManager<S: Storage> {
    storage: S,
    rng: SmallRng,
}

impl<S: Storage> GameManager<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Deterministic shuffles and game ids, for tests and replays.
    pub fn with_seed(storage: S, seed: u64) -> Self {
        Self {
            storage,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Starts a game in the waiting room: the creator's deck is shuffled,
    /// an opening hand dealt, and the snapshot persisted.
    pub fn create_game(&mut self, creator: &str, deck_id: &str) -> Result<GameState, GameError> {
        let player = self.build_player(creator, deck_id)?;
        let now = now_ms();
        let id = format!("game-{}-{:06x}", now, self.rng.gen_range(0..0x100_0000u32));
        let state = GameState {
            id,
            status: GameStatus::Waiting,
            turn: 0,
            phase: GamePhase::Init,
            current_player: creator.to_string(),
            players: vec![player],
            active_effects: Vec::new(),
            history: Vec::new(),
            winner: None,
            created_by: creator.to_string(),
            created_at: now,
            started_at: None,
            finished_at: None,
        };
        self.save_game(&state)?;
        Ok(state)
    }

    /// Seats the second player and activates the game: draw phase, turn 1,
    /// with the creator's turn-one draw taken immediately.
    pub fn join_game(
        &mut self,
        game_code: &str,
        joiner: &str,
        deck_id: &str,
    ) -> Result<GameState, GameError> {
        let mut state = self.load_game(game_code)?;
        if state.status != GameStatus::Waiting {
            return Err(GameError::conflict("game is not in waiting state"));
        }
        if state.player(joiner).is_some() {
            return Err(GameError::conflict("already in game"));
        }
        if state.players.len() >= 2 {
            return Err(GameError::conflict("game is full"));
        }

        let player = self.build_player(joiner, deck_id)?;
        state.players.push(player);
        state.status = GameStatus::Active;
        state.phase = GamePhase::Draw;
        state.turn = 1;
        state.started_at = Some(now_ms());

        {
            let cards = StoredCards::new(&self.storage);
            let current = state.current_player.clone();
            if let Some(player) = state.player_mut(&current) {
                player.draw(&cards);
            }
        }

        self.save_game(&state)?;
        Ok(state)
    }

    pub fn state(&self, game_code: &str) -> Result<GameState, GameError> {
        self.load_game(game_code)
    }

    /// The per-action round trip: load, validate, execute, post-process,
    /// check win conditions, persist.
    pub fn apply_action(
        &mut self,
        game_code: &str,
        action: GameAction,
    ) -> Result<RuleResolution, GameError> {
        let mut state = self.load_game(game_code)?;
        validate_action(&state, &action).map_err(|reason| GameError::Rejected { reason })?;

        let events = {
            let cards = StoredCards::new(&self.storage);
            resolve_action(&mut state, &action, &cards)
                .map_err(|fault| GameError::internal(fault.detail))?
        };

        if state.is_finished() {
            state.finished_at = Some(now_ms());
            self.record_outcome(&state)?;
        }
        self.save_game(&state)?;
        Ok(RuleResolution::new(state, events))
    }

    pub fn put_deck(&mut self, player_id: &str, deck: &Deck) -> Result<(), GameError> {
        let raw = serde_json::to_string(deck)
            .map_err(|err| GameError::internal(format!("encode deck: {err}")))?;
        self.storage.put(&keys::deck(player_id, &deck.id), &raw)?;
        Ok(())
    }

    pub fn put_profile(&mut self, profile: &Profile) -> Result<(), GameError> {
        let raw = serde_json::to_string(profile)
            .map_err(|err| GameError::internal(format!("encode profile: {err}")))?;
        self.storage.put(&keys::profile(&profile.id), &raw)?;
        Ok(())
    }

    pub fn profile(&self, player_id: &str) -> Result<Option<Profile>, GameError> {
        let Some(raw) = self.storage.get(&keys::profile(player_id))? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| GameError::internal(format!("corrupt profile record: {err}")))
    }

    fn load_game(&self, game_code: &str) -> Result<GameState, GameError> {
        let raw = self
            .storage
            .get(&keys::game(game_code))?
            .ok_or_else(|| GameError::not_found("game"))?;
        serde_json::from_str(&raw)
            .map_err(|err| GameError::internal(format!("corrupt game record: {err}")))
    }

    fn save_game(&mut self, state: &GameState) -> Result<(), GameError> {
        let raw = serde_json::to_string(state)
            .map_err(|err| GameError::internal(format!("encode game: {err}")))?;
        self.storage.put(&keys::game(&state.id), &raw)?;
        Ok(())
    }

    fn load_deck(&self, player_id: &str, deck_id: &str) -> Result<Deck, GameError> {
        let raw = self
            .storage
            .get(&keys::deck(player_id, deck_id))?
            .ok_or_else(|| GameError::not_found("deck"))?;
        serde_json::from_str(&raw)
            .map_err(|err| GameError::internal(format!("corrupt deck record: {err}")))
    }

    /// Shuffles the saved deck list and deals the opening hand. Every id is
    /// resolved against the catalog upfront so later draws cannot lose
    /// cards to a missing definition.
    fn build_player(&mut self, player_id: &str, deck_id: &str) -> Result<PlayerState, GameError> {
        let deck = self.load_deck(player_id, deck_id)?;
        let cards = StoredCards::new(&self.storage);
        for id in &deck.cards {
            if cards.card(id).is_none() {
                return Err(GameError::not_found(format!("card {id}")));
            }
        }

        let mut ids = deck.cards;
        ids.shuffle(&mut self.rng);

        let dealt = OPENING_HAND.min(ids.len());
        let hand: Vec<Card> = ids
            .drain(..dealt)
            .filter_map(|id| cards.card(&id))
            .collect();
        // Draw position is the back of the vector; keep shuffled order.
        ids.reverse();
        Ok(PlayerState::new(player_id, ids, hand))
    }

    /// Win/loss bookkeeping for both profiles. Players without a stored
    /// profile are skipped.
    fn record_outcome(&mut self, state: &GameState) -> Result<(), GameError> {
        let Some(winner) = state.winner.clone() else {
            return Ok(());
        };
        let loser = state
            .players
            .iter()
            .map(|player| player.id.clone())
            .find(|id| *id != winner);
        self.bump_profile(&winner, true)?;
        if let Some(loser) = loser {
            self.bump_profile(&loser, false)?;
        }
        Ok(())
    }

    fn bump_profile(&mut self, player_id: &str, won: bool) -> Result<(), GameError> {
        let Some(mut profile) = self.profile(player_id)? else {
            return Ok(());
        };
        profile.statistics.games_played += 1;
        if won {
            profile.statistics.wins += 1;
            profile.statistics.win_streak += 1;
        } else {
            profile.statistics.losses += 1;
            profile.statistics.win_streak = 0;
        }
        self.put_profile(&profile)
    }
}

#[cfg(target_arch = "wasm32")]
fn now_ms() -> u64 {
    web_sys::js_sys::Date::now() as u64
}

#[cfg(not(target_arch = "wasm32"))]
fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::seed_core_set;
    use crate::game::rules::{
        ActionKind, ChangePhaseAction, DeclareAttackAction, PlayCardAction,
    };
    use crate::game::resources::ResourcePool;
    use crate::game::state::{GameEvent, FIELD_SIZE};
    use crate::storage::MemoryStore;

    fn manager() -> GameManager<MemoryStore> {
        let mut store = MemoryStore::new();
        seed_core_set(&mut store).unwrap();
        let mut manager = GameManager::with_seed(store, 7);
        manager
            .put_deck(
                "alice",
                &Deck {
                    id: "starter".into(),
                    name: "Vanguard Swarm".into(),
                    cards: vec!["mat-u-01".into(); 20],
                },
            )
            .unwrap();
        manager
            .put_deck(
                "bob",
                &Deck {
                    id: "starter".into(),
                    name: "Wisp Swarm".into(),
                    cards: vec!["min-u-01".into(); 20],
                },
            )
            .unwrap();
        manager
    }

    fn action(player: &str, kind: ActionKind) -> GameAction {
        GameAction::new(player, 1_700_000_000_000, kind)
    }

    fn started_game(manager: &mut GameManager<MemoryStore>) -> String {
        let created = manager.create_game("alice", "starter").unwrap();
        manager.join_game(&created.id, "bob", "starter").unwrap();
        created.id
    }

    #[test]
    fn create_waits_with_a_dealt_hand() {
        let mut manager = manager();
        let state = manager.create_game("alice", "starter").unwrap();
        assert_eq!(state.status, GameStatus::Waiting);
        assert_eq!(state.phase, GamePhase::Init);
        assert_eq!(state.turn, 0);
        let alice = state.player("alice").unwrap();
        assert_eq!(alice.hand.len(), OPENING_HAND);
        assert_eq!(alice.deck.len(), 15);
        assert_eq!(alice.resources, ResourcePool::base());
    }

    #[test]
    fn create_rejects_a_missing_deck() {
        let mut manager = manager();
        assert!(matches!(
            manager.create_game("alice", "no-such-deck"),
            Err(GameError::NotFound { .. })
        ));
    }

    #[test]
    fn join_activates_and_draws_for_the_creator() {
        let mut manager = manager();
        let created = manager.create_game("alice", "starter").unwrap();
        let state = manager.join_game(&created.id, "bob", "starter").unwrap();

        assert_eq!(state.status, GameStatus::Active);
        assert_eq!(state.phase, GamePhase::Draw);
        assert_eq!(state.turn, 1);
        assert_eq!(state.players.len(), 2);
        assert_eq!(state.current_player, "alice");
        // The creator's turn-one draw happened on activation.
        assert_eq!(state.player("alice").unwrap().hand.len(), OPENING_HAND + 1);
        assert_eq!(state.player("bob").unwrap().hand.len(), OPENING_HAND);
    }

    #[test]
    fn join_rejects_full_duplicate_and_started_games() {
        let mut manager = manager();
        let created = manager.create_game("alice", "starter").unwrap();
        assert!(matches!(
            manager.join_game(&created.id, "alice", "starter"),
            Err(GameError::Conflict { .. })
        ));
        manager.join_game(&created.id, "bob", "starter").unwrap();
        manager
            .put_deck(
                "carol",
                &Deck {
                    id: "starter".into(),
                    name: "Late".into(),
                    cards: vec!["mat-u-01".into(); 20],
                },
            )
            .unwrap();
        assert!(matches!(
            manager.join_game(&created.id, "carol", "starter"),
            Err(GameError::Conflict { .. })
        ));
    }

    #[test]
    fn actions_round_trip_through_storage() {
        let mut manager = manager();
        let code = started_game(&mut manager);

        let resolution = manager
            .apply_action(
                &code,
                action(
                    "alice",
                    ActionKind::ChangePhase(ChangePhaseAction {
                        phase: GamePhase::Main,
                    }),
                ),
            )
            .unwrap();
        assert_eq!(resolution.state.phase, GamePhase::Main);
        assert_eq!(resolution.state.history.len(), 1);

        // The persisted snapshot matches what the caller got back.
        let reloaded = manager.state(&code).unwrap();
        assert_eq!(reloaded, resolution.state);
    }

    #[test]
    fn turn_exclusivity_is_enforced_at_the_boundary() {
        let mut manager = manager();
        let code = started_game(&mut manager);
        let result = manager.apply_action(
            &code,
            action(
                "bob",
                ActionKind::ChangePhase(ChangePhaseAction {
                    phase: GamePhase::Main,
                }),
            ),
        );
        assert!(matches!(
            result,
            Err(GameError::Rejected {
                reason: RuleError::NotPlayerTurn
            })
        ));
    }

    #[test]
    fn a_full_scripted_turn_conserves_cards() {
        let mut manager = manager();
        let code = started_game(&mut manager);

        let zone_total = |state: &GameState, id: &str| {
            let player = state.player(id).unwrap();
            player.deck.len()
                + player.hand.len()
                + player.field.iter().flatten().count()
        };
        let before = zone_total(&manager.state(&code).unwrap(), "alice");

        manager
            .apply_action(
                &code,
                action(
                    "alice",
                    ActionKind::ChangePhase(ChangePhaseAction {
                        phase: GamePhase::Main,
                    }),
                ),
            )
            .unwrap();
        let resolution = manager
            .apply_action(
                &code,
                action(
                    "alice",
                    ActionKind::PlayCard(PlayCardAction {
                        card_id: "mat-u-01".into(),
                        position: 0,
                    }),
                ),
            )
            .unwrap();

        let alice = resolution.state.player("alice").unwrap();
        assert!(alice.field[0].is_some());
        assert_eq!(alice.resources, ResourcePool::new(2, 3));
        assert_eq!(zone_total(&resolution.state, "alice"), before);

        manager
            .apply_action(
                &code,
                action(
                    "alice",
                    ActionKind::ChangePhase(ChangePhaseAction {
                        phase: GamePhase::Combat,
                    }),
                ),
            )
            .unwrap();
        let resolution = manager
            .apply_action(
                &code,
                action(
                    "alice",
                    ActionKind::DeclareAttack(DeclareAttackAction {
                        attacker_id: "mat-u-01".into(),
                        target_id: "bob".into(),
                    }),
                ),
            )
            .unwrap();
        assert_eq!(resolution.state.player("bob").unwrap().health, 18);

        let resolution = manager
            .apply_action(
                &code,
                action(
                    "alice",
                    ActionKind::ChangePhase(ChangePhaseAction {
                        phase: GamePhase::End,
                    }),
                ),
            )
            .unwrap();
        assert_eq!(
            resolution.state.player("alice").unwrap().resources,
            ResourcePool::base()
        );

        let resolution = manager
            .apply_action(&code, action("alice", ActionKind::EndTurn))
            .unwrap();
        assert_eq!(resolution.state.current_player, "bob");
        assert_eq!(resolution.state.turn, 2);
        assert_eq!(resolution.state.phase, GamePhase::Draw);
        // Bob's draw-phase card arrived with the turn.
        assert_eq!(
            resolution.state.player("bob").unwrap().hand.len(),
            OPENING_HAND + 1
        );
        assert!(resolution
            .events
            .iter()
            .any(|event| matches!(event, GameEvent::CardDrawn { .. })));
    }

    #[test]
    fn surrender_finishes_and_updates_statistics() {
        let mut manager = manager();
        for (id, name) in [("alice", "Alice"), ("bob", "Bob")] {
            manager
                .put_profile(&Profile {
                    id: id.into(),
                    username: name.into(),
                    statistics: ProfileStats::default(),
                })
                .unwrap();
        }
        let code = started_game(&mut manager);

        let resolution = manager
            .apply_action(&code, action("bob", ActionKind::Surrender))
            .unwrap();
        assert_eq!(resolution.state.status, GameStatus::Finished);
        assert_eq!(resolution.winner.as_deref(), Some("alice"));
        assert!(resolution.state.finished_at.is_some());

        let alice = manager.profile("alice").unwrap().unwrap();
        let bob = manager.profile("bob").unwrap().unwrap();
        assert_eq!((alice.statistics.wins, alice.statistics.win_streak), (1, 1));
        assert_eq!((bob.statistics.losses, bob.statistics.win_streak), (1, 0));

        // No further actions are accepted.
        let result = manager.apply_action(&code, action("alice", ActionKind::Surrender));
        assert!(matches!(
            result,
            Err(GameError::Rejected {
                reason: RuleError::GameNotActive
            })
        ));
    }

    #[test]
    fn field_is_always_four_slots() {
        let mut manager = manager();
        let code = started_game(&mut manager);
        let state = manager.state(&code).unwrap();
        for player in &state.players {
            assert_eq!(player.field.len(), FIELD_SIZE);
        }
    }
}
