use serde::{Deserialize, Serialize};

use super::cards::{Card, CardId, CardKind, Layer, PlayerId};
use super::combat;
use super::effects::{self, EffectContext, EffectEngine};
use super::resources::ResourcePool;
use super::state::{
    GameEvent, GamePhase, GameState, GameStatus, PlayerState, FIELD_SIZE,
};
use crate::catalog::CardSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayCardAction {
    pub card_id: CardId,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivateAbilityAction {
    pub card_id: CardId,
    pub ability_index: usize,
    #[serde(default)]
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePhaseAction {
    pub phase: GamePhase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLayerAction {
    pub layer: Layer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclareAttackAction {
    pub attacker_id: CardId,
    /// An opposing unit's card id, or the opposing player's id.
    pub target_id: String,
}

/// The closed set of player actions, each with its own typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ActionKind {
    #[serde(rename = "PLAY_CARD")]
    PlayCard(PlayCardAction),
    #[serde(rename = "ACTIVATE_ABILITY")]
    ActivateAbility(ActivateAbilityAction),
    #[serde(rename = "CHANGE_PHASE")]
    ChangePhase(ChangePhaseAction),
    #[serde(rename = "CHANGE_LAYER")]
    ChangeLayer(ChangeLayerAction),
    #[serde(rename = "END_TURN")]
    EndTurn,
    #[serde(rename = "DECLARE_ATTACK")]
    DeclareAttack(DeclareAttackAction),
    #[serde(rename = "SURRENDER")]
    Surrender,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::PlayCard(_) => "PLAY_CARD",
            ActionKind::ActivateAbility(_) => "ACTIVATE_ABILITY",
            ActionKind::ChangePhase(_) => "CHANGE_PHASE",
            ActionKind::ChangeLayer(_) => "CHANGE_LAYER",
            ActionKind::EndTurn => "END_TURN",
            ActionKind::DeclareAttack(_) => "DECLARE_ATTACK",
            ActionKind::Surrender => "SURRENDER",
        }
    }
}

/// Envelope every inbound action arrives in. The player id is supplied by
/// the identity collaborator and trusted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameAction {
    pub player_id: PlayerId,
    pub timestamp: u64,
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl GameAction {
    pub fn new(player_id: impl Into<PlayerId>, timestamp: u64, kind: ActionKind) -> Self {
        Self {
            player_id: player_id.into(),
            timestamp,
            kind,
        }
    }
}

/// Stable rejection reasons surfaced to the caller. The state is untouched
/// when any of these comes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RuleError {
    GameNotActive,
    NotPlayerTurn,
    PlayerNotFound { player_id: PlayerId },
    InvalidPhase { expected: GamePhase, actual: GamePhase },
    InvalidPhaseTransition { from: GamePhase, to: GamePhase },
    CardNotInHand { card_id: CardId },
    InvalidPosition { position: usize },
    PositionOccupied { position: usize },
    LayerMismatch { card_layer: Layer, active_layer: Layer },
    InsufficientResources { required: ResourcePool, available: ResourcePool },
    CardNotOnField { card_id: CardId },
    NotAUnit { card_id: CardId },
    UnknownAbility { card_id: CardId, ability_index: usize },
    PhaseRestricted { required: GamePhase, actual: GamePhase },
    TargetCountMismatch { expected: usize, actual: usize },
    InvalidTarget { target_id: String },
    InvalidAttacker { card_id: CardId },
}

/// An inconsistency the validator was supposed to rule out. Never shown to
/// players as a rejection; the orchestrator reports it as an internal error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineFault {
    pub detail: String,
}

impl EngineFault {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Response shape for an applied action: the full new state plus the audit
/// events the resolution emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,
}

impl RuleResolution {
    pub fn new(state: GameState, events: Vec<GameEvent>) -> Self {
        let winner = state.winner.clone();
        Self {
            state,
            events,
            winner,
        }
    }
}

/// Pure legality check; reads the state, mutates nothing.
pub fn validate_action(state: &GameState, action: &GameAction) -> Result<(), RuleError> {
    if state.status != GameStatus::Active {
        return Err(RuleError::GameNotActive);
    }
    let player = state
        .player(&action.player_id)
        .ok_or_else(|| RuleError::PlayerNotFound {
            player_id: action.player_id.clone(),
        })?;
    // The engine is strictly turn-exclusive; surrender is the one action
    // the waiting player may take.
    if !matches!(action.kind, ActionKind::Surrender) && action.player_id != state.current_player {
        return Err(RuleError::NotPlayerTurn);
    }

    match &action.kind {
        ActionKind::PlayCard(play) => validate_play_card(state, player, play),
        ActionKind::ActivateAbility(activate) => validate_activate_ability(state, player, activate),
        ActionKind::ChangePhase(change) => validate_change_phase(state, change),
        ActionKind::ChangeLayer(_) => expect_phase(state, GamePhase::Main),
        ActionKind::EndTurn => expect_phase(state, GamePhase::End),
        ActionKind::DeclareAttack(attack) => validate_declare_attack(state, player, attack),
        ActionKind::Surrender => Ok(()),
    }
}

fn expect_phase(state: &GameState, expected: GamePhase) -> Result<(), RuleError> {
    if state.phase != expected {
        return Err(RuleError::InvalidPhase {
            expected,
            actual: state.phase,
        });
    }
    Ok(())
}

fn validate_play_card(
    state: &GameState,
    player: &PlayerState,
    play: &PlayCardAction,
) -> Result<(), RuleError> {
    expect_phase(state, GamePhase::Main)?;
    if play.position >= FIELD_SIZE {
        return Err(RuleError::InvalidPosition {
            position: play.position,
        });
    }
    if player.field[play.position].is_some() {
        return Err(RuleError::PositionOccupied {
            position: play.position,
        });
    }
    let card = player
        .hand_index(&play.card_id)
        .map(|idx| &player.hand[idx])
        .ok_or_else(|| RuleError::CardNotInHand {
            card_id: play.card_id.clone(),
        })?;
    if card.layer != player.active_layer {
        return Err(RuleError::LayerMismatch {
            card_layer: card.layer,
            active_layer: player.active_layer,
        });
    }
    if !player.resources.has_enough(&card.cost) {
        return Err(RuleError::InsufficientResources {
            required: card.cost,
            available: player.resources,
        });
    }
    Ok(())
}

fn validate_activate_ability(
    state: &GameState,
    player: &PlayerState,
    activate: &ActivateAbilityAction,
) -> Result<(), RuleError> {
    let card = player
        .field_card(&activate.card_id)
        .ok_or_else(|| RuleError::CardNotOnField {
            card_id: activate.card_id.clone(),
        })?;
    let stats = card.unit().ok_or_else(|| RuleError::NotAUnit {
        card_id: activate.card_id.clone(),
    })?;
    let ability =
        stats
            .abilities
            .get(activate.ability_index)
            .ok_or_else(|| RuleError::UnknownAbility {
                card_id: activate.card_id.clone(),
                ability_index: activate.ability_index,
            })?;

    if let Some(required) = ability.phase {
        if state.phase != required {
            return Err(RuleError::PhaseRestricted {
                required,
                actual: state.phase,
            });
        }
    }
    if let Some(cost) = &ability.cost {
        if !player.resources.has_enough(cost) {
            return Err(RuleError::InsufficientResources {
                required: *cost,
                available: player.resources,
            });
        }
    }
    if let Some(expected) = ability.target_count {
        if activate.targets.len() != expected {
            return Err(RuleError::TargetCountMismatch {
                expected,
                actual: activate.targets.len(),
            });
        }
    }

    for target_id in &activate.targets {
        validate_ability_target(state, player, ability, target_id)?;
    }
    Ok(())
}

fn validate_ability_target(
    state: &GameState,
    player: &PlayerState,
    ability: &super::cards::Ability,
    target_id: &str,
) -> Result<(), RuleError> {
    use super::cards::TargetKind;

    let invalid = || RuleError::InvalidTarget {
        target_id: target_id.to_string(),
    };

    // A target is either a player endpoint or a card on somebody's field.
    let (owner, is_player_endpoint) = if state.player(target_id).is_some() {
        (target_id.to_string(), true)
    } else if let Some((owner, slot)) = state.find_field_card(target_id) {
        let card = state
            .player(&owner)
            .and_then(|p| p.field[slot].as_ref())
            .ok_or_else(invalid)?;
        if card.layer != player.active_layer && !ability.can_target_other_layer {
            return Err(invalid());
        }
        (owner, false)
    } else {
        return Err(invalid());
    };

    let ok = match ability.target {
        TargetKind::SelfSide | TargetKind::Ally => owner == player.id,
        TargetKind::Enemy => owner != player.id,
        TargetKind::All => true,
        TargetKind::Player => is_player_endpoint,
    };
    if ok {
        Ok(())
    } else {
        Err(invalid())
    }
}

fn validate_change_phase(state: &GameState, change: &ChangePhaseAction) -> Result<(), RuleError> {
    // Forward one step, or jump straight to end-of-turn from anywhere.
    let allowed = state.phase.successor() == Some(change.phase) || change.phase == GamePhase::End;
    if allowed {
        Ok(())
    } else {
        Err(RuleError::InvalidPhaseTransition {
            from: state.phase,
            to: change.phase,
        })
    }
}

fn validate_declare_attack(
    state: &GameState,
    player: &PlayerState,
    attack: &DeclareAttackAction,
) -> Result<(), RuleError> {
    expect_phase(state, GamePhase::Combat)?;
    let attacker = player
        .field_card(&attack.attacker_id)
        .ok_or_else(|| RuleError::InvalidAttacker {
            card_id: attack.attacker_id.clone(),
        })?;
    if !attacker.is_unit() {
        return Err(RuleError::InvalidAttacker {
            card_id: attack.attacker_id.clone(),
        });
    }

    let invalid = || RuleError::InvalidTarget {
        target_id: attack.target_id.clone(),
    };
    // The target must resolve to the opposing side, never our own.
    if state.player(&attack.target_id).is_some() {
        if attack.target_id == player.id {
            return Err(invalid());
        }
        return Ok(());
    }
    match state.find_field_card(&attack.target_id) {
        Some((owner, _)) if owner != player.id => Ok(()),
        _ => Err(invalid()),
    }
}

/// Executes a validated action. Assumes validity: anything inconsistent
/// found here is a fault, not a rejection.
#[derive(Default)]
pub struct RuleEngine {
    effects: EffectEngine,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute(
        &mut self,
        state: &mut GameState,
        action: &GameAction,
        cards: &dyn CardSource,
    ) -> Result<Vec<GameEvent>, EngineFault> {
        match &action.kind {
            ActionKind::PlayCard(play) => self.play_card(state, &action.player_id, play, cards),
            ActionKind::ActivateAbility(activate) => {
                self.activate_ability(state, &action.player_id, activate, cards)
            }
            ActionKind::ChangePhase(change) => {
                state.phase = change.phase;
                Ok(vec![GameEvent::PhaseChanged {
                    phase: change.phase,
                }])
            }
            ActionKind::ChangeLayer(change) => {
                let player = state
                    .player_mut(&action.player_id)
                    .ok_or_else(|| EngineFault::new("acting player vanished"))?;
                player.active_layer = change.layer;
                Ok(vec![GameEvent::LayerChanged {
                    player_id: action.player_id.clone(),
                    layer: change.layer,
                }])
            }
            ActionKind::EndTurn => self.end_turn(state, &action.player_id),
            ActionKind::DeclareAttack(attack) => {
                combat::resolve_attack(state, &action.player_id, attack, &mut self.effects, cards)
            }
            ActionKind::Surrender => {
                let winner = state
                    .opponent_of(&action.player_id)
                    .ok_or_else(|| EngineFault::new("surrender with no opponent"))?;
                state.status = GameStatus::Finished;
                state.winner = Some(winner);
                Ok(vec![GameEvent::Surrendered {
                    player_id: action.player_id.clone(),
                }])
            }
        }
    }

    fn play_card(
        &mut self,
        state: &mut GameState,
        player_id: &str,
        play: &PlayCardAction,
        cards: &dyn CardSource,
    ) -> Result<Vec<GameEvent>, EngineFault> {
        let player = state
            .player_mut(player_id)
            .ok_or_else(|| EngineFault::new("acting player vanished"))?;
        let hand_idx = player
            .hand_index(&play.card_id)
            .ok_or_else(|| EngineFault::new("played card not in hand"))?;
        if player.field[play.position].is_some() {
            return Err(EngineFault::new("played onto an occupied slot"));
        }
        let card = player.hand.remove(hand_idx);
        player.resources = player.resources.spend(&card.cost);

        let mut events = vec![GameEvent::CardPlayed {
            player_id: player_id.to_string(),
            card_id: card.id.clone(),
            position: play.position,
        }];

        match &card.kind {
            CardKind::Unit(_) => {
                player.field[play.position] = Some(card.clone());
                self.effects
                    .queue_triggers(&card, super::cards::TriggerKind::OnEnter, player_id);
                events.extend(self.effects.resolve_all(state, cards));
            }
            CardKind::Effect { effect } => {
                // One-shot spells resolve on play and are consumed; timed
                // payloads register instead and tick on later passes.
                let ctx = EffectContext::new(player_id).with_source_card(card.id.clone());
                if effect.duration.unwrap_or(0) > 0 {
                    effects::register_timed(state, effect, &ctx, &card.name);
                } else {
                    self.effects.queue_effect(effect.clone(), ctx);
                    events.extend(self.effects.resolve_all(state, cards));
                }
            }
            CardKind::Ritual(_) => {
                player.field[play.position] = Some(card);
            }
        }
        Ok(events)
    }

    fn activate_ability(
        &mut self,
        state: &mut GameState,
        player_id: &str,
        activate: &ActivateAbilityAction,
        cards: &dyn CardSource,
    ) -> Result<Vec<GameEvent>, EngineFault> {
        let card = state
            .player(player_id)
            .and_then(|player| player.field_card(&activate.card_id))
            .cloned()
            .ok_or_else(|| EngineFault::new("activated card not on field"))?;
        let ability = card
            .unit()
            .and_then(|stats| stats.abilities.get(activate.ability_index))
            .cloned()
            .ok_or_else(|| EngineFault::new("activated ability index out of range"))?;

        let ctx = EffectContext::new(player_id)
            .with_source_card(card.id.clone())
            .with_targets(activate.targets.clone());

        let mut events = Vec::new();
        if ability.duration.unwrap_or(0) > 0 {
            effects::register_timed(state, &ability, &ctx, &card.name);
        } else {
            self.effects.queue_effect(ability.clone(), ctx);
            events.extend(self.effects.resolve_all(state, cards));
        }

        if let Some(cost) = &ability.cost {
            let player = state
                .player_mut(player_id)
                .ok_or_else(|| EngineFault::new("acting player vanished"))?;
            player.resources = player.resources.spend(cost);
        }
        Ok(events)
    }

    fn end_turn(
        &mut self,
        state: &mut GameState,
        player_id: &str,
    ) -> Result<Vec<GameEvent>, EngineFault> {
        let next = state
            .opponent_of(player_id)
            .ok_or_else(|| EngineFault::new("end turn with no opponent"))?;
        for player in state.players.iter_mut() {
            player.tick_control_markers();
        }
        state.current_player = next;
        state.phase = GamePhase::Draw;
        state.turn += 1;
        Ok(vec![GameEvent::TurnEnded {
            player_id: player_id.to_string(),
            turn: state.turn,
        }])
    }
}

/// Phase-boundary hooks, run when an action moved the game into a new
/// phase: the draw-phase card draw and the end-phase ritual upkeep plus
/// resource replenishment.
pub fn phase_entry(state: &mut GameState, cards: &dyn CardSource) -> Vec<GameEvent> {
    match state.phase {
        GamePhase::Draw => {
            let current = state.current_player.clone();
            state
                .player_mut(&current)
                .and_then(|player| player.draw(cards))
                .into_iter()
                .collect()
        }
        GamePhase::End => {
            let mut events = ritual_upkeep(state, cards);
            let current = state.current_player.clone();
            if let Some(player) = state.player_mut(&current) {
                player.resources = ResourcePool::base();
                events.push(GameEvent::ResourcesReplenished {
                    player_id: current,
                    resources: player.resources,
                });
            }
            events
        }
        _ => Vec::new(),
    }
}

/// Rituals the current player cannot sustain expire; the rest fire their
/// effects and burn one turn of duration. Standing resources are checked
/// before the end-phase replenishment.
fn ritual_upkeep(state: &mut GameState, cards: &dyn CardSource) -> Vec<GameEvent> {
    let current = state.current_player.clone();
    let mut events = Vec::new();
    let mut fired: Vec<(usize, CardId, Vec<super::cards::Ability>)> = Vec::new();

    let Some(player) = state.player_mut(&current) else {
        return events;
    };
    for slot in 0..FIELD_SIZE {
        let Some(card) = player.field[slot].as_ref() else {
            continue;
        };
        let Some(spec) = card.ritual() else {
            continue;
        };
        if !player.resources.has_enough(&spec.layer_requirements) {
            if let Some(card) = player.field[slot].take() {
                events.push(GameEvent::RitualExpired {
                    player_id: current.clone(),
                    card_id: card.id,
                });
            }
            continue;
        }
        fired.push((slot, card.id.clone(), spec.effects.clone()));
    }

    let mut engine = EffectEngine::new();
    for (_, card_id, ritual_effects) in &fired {
        for effect in ritual_effects {
            let ctx = EffectContext::new(current.clone()).with_source_card(card_id.clone());
            engine.queue_effect(effect.clone(), ctx);
        }
        events.push(GameEvent::RitualResolved {
            player_id: current.clone(),
            card_id: card_id.clone(),
        });
    }
    events.extend(engine.resolve_all(state, cards));

    if let Some(player) = state.player_mut(&current) {
        for (slot, card_id, _) in fired {
            if let Some(spec) = player.field[slot].as_mut().and_then(Card::ritual_mut) {
                spec.duration = spec.duration.saturating_sub(1);
                if spec.duration == 0 {
                    player.field[slot] = None;
                    events.push(GameEvent::RitualExpired {
                        player_id: current.clone(),
                        card_id,
                    });
                }
            }
        }
    }
    events
}

/// Full post-validation pipeline for one action: execute, run the phase
/// hooks if the phase moved, process active effects, append to history,
/// and check win conditions. The caller persists the result.
pub fn resolve_action(
    state: &mut GameState,
    action: &GameAction,
    cards: &dyn CardSource,
) -> Result<Vec<GameEvent>, EngineFault> {
    let phase_before = state.phase;
    let mut engine = RuleEngine::new();
    let mut events = engine.execute(state, action, cards)?;

    if state.phase != phase_before {
        events.extend(phase_entry(state, cards));
    }
    events.extend(effects::process_pass(state, cards));

    state.history.push(action.clone());

    if state.status == GameStatus::Finished {
        if let Some(winner) = state.winner.clone() {
            events.push(GameEvent::GameWon { winner });
        }
    } else if let Some(winner) = state.evaluate_victory() {
        events.push(GameEvent::GameWon { winner });
    }
    Ok(events)
}
