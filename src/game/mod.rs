//! Core rules engine: card model, resource ledger, board state, the
//! validator/executor state machine, effect resolution and combat.

pub mod cards;
pub mod combat;
pub mod effects;
pub mod resources;
pub mod rules;
pub mod state;

pub use cards::{
    Ability, Card, CardId, CardKind, ControlMarker, EffectKind, Layer, PlayerId, Rarity,
    RitualSpec, TargetKind, TriggerKind, UnitStats,
};
pub use effects::{EffectContext, EffectEngine, TargetRef};
pub use resources::ResourcePool;
pub use rules::{
    ActionKind, ActivateAbilityAction, ChangeLayerAction, ChangePhaseAction, DeclareAttackAction,
    EngineFault, GameAction, PlayCardAction, RuleEngine, RuleError, RuleResolution,
};
pub use state::{
    GameEffect, GameEvent, GamePhase, GameState, GameStatus, PlayerState, FIELD_SIZE,
    INITIAL_HEALTH, OPENING_HAND,
};
