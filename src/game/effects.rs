use std::collections::VecDeque;

use super::cards::{Ability, Card, CardId, EffectKind, PlayerId, TargetKind, TriggerKind};
use super::state::{GameEffect, GameEvent, GameState};
use crate::catalog::CardSource;

/// Resolution context for a single payload: who is acting, which card the
/// payload came from, and any explicitly chosen targets.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectContext {
    pub source_player: PlayerId,
    pub source_card: Option<CardId>,
    pub targets: Vec<String>,
}

impl EffectContext {
    pub fn new(source_player: impl Into<PlayerId>) -> Self {
        Self {
            source_player: source_player.into(),
            source_card: None,
            targets: Vec::new(),
        }
    }

    pub fn with_source_card(mut self, card_id: impl Into<CardId>) -> Self {
        self.source_card = Some(card_id.into());
        self
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }
}

/// A resolved target endpoint: a player or a unit on somebody's field.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetRef {
    Player(PlayerId),
    Unit { owner: PlayerId, card_id: CardId },
}

/// Resolves an ability's target set against the current state.
///
/// Explicit targets (chosen by the acting player) take precedence;
/// otherwise the selector picks endpoints. Units tuned to the other layer
/// are excluded unless the ability can target across layers.
pub fn resolve_targets(state: &GameState, ability: &Ability, ctx: &EffectContext) -> Vec<TargetRef> {
    let acting_layer = state
        .player(&ctx.source_player)
        .map(|player| player.active_layer);
    let layer_ok =
        |card: &Card| ability.can_target_other_layer || acting_layer == Some(card.layer);

    if !ctx.targets.is_empty() {
        return ctx
            .targets
            .iter()
            .filter_map(|target_id| {
                if state.player(target_id).is_some() {
                    return Some(TargetRef::Player(target_id.clone()));
                }
                let (owner, slot) = state.find_field_card(target_id)?;
                let card = state.player(&owner)?.field[slot].as_ref()?;
                layer_ok(card).then(|| TargetRef::Unit {
                    owner,
                    card_id: target_id.clone(),
                })
            })
            .collect();
    }

    let unit_scoped = ability.kind.is_unit_scoped();
    match ability.target {
        TargetKind::SelfSide => {
            if unit_scoped {
                ctx.source_card
                    .as_ref()
                    .and_then(|card_id| {
                        state
                            .find_field_card(card_id)
                            .map(|(owner, _)| TargetRef::Unit {
                                owner,
                                card_id: card_id.clone(),
                            })
                    })
                    .into_iter()
                    .collect()
            } else {
                vec![TargetRef::Player(ctx.source_player.clone())]
            }
        }
        TargetKind::Enemy => match state.opponent_of(&ctx.source_player) {
            Some(opponent) if unit_scoped => units_of(state, &opponent, &layer_ok),
            Some(opponent) => vec![TargetRef::Player(opponent)],
            None => Vec::new(),
        },
        TargetKind::Ally => {
            if unit_scoped {
                units_of(state, &ctx.source_player, &layer_ok)
            } else {
                vec![TargetRef::Player(ctx.source_player.clone())]
            }
        }
        TargetKind::All => {
            if unit_scoped {
                state
                    .players
                    .iter()
                    .map(|player| player.id.clone())
                    .collect::<Vec<_>>()
                    .into_iter()
                    .flat_map(|owner| units_of(state, &owner, &layer_ok))
                    .collect()
            } else {
                state
                    .players
                    .iter()
                    .map(|player| TargetRef::Player(player.id.clone()))
                    .collect()
            }
        }
        // The bare player endpoint; without an explicit choice this is the
        // acting player.
        TargetKind::Player => vec![TargetRef::Player(ctx.source_player.clone())],
    }
}

fn units_of(state: &GameState, owner: &str, layer_ok: &dyn Fn(&Card) -> bool) -> Vec<TargetRef> {
    state
        .player(owner)
        .map(|player| {
            player
                .field
                .iter()
                .flatten()
                .filter(|card| card.is_unit() && layer_ok(card))
                .map(|card| TargetRef::Unit {
                    owner: owner.to_string(),
                    card_id: card.id.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Applies one payload to its resolved target set. Destruction events are
/// returned so the engine can cascade death triggers.
pub fn apply_effect(
    state: &mut GameState,
    ability: &Ability,
    ctx: &EffectContext,
    cards: &dyn CardSource,
) -> Vec<GameEvent> {
    let targets = resolve_targets(state, ability, ctx);
    let source = ctx.source_card.as_deref();
    let mut events = Vec::new();

    match ability.kind {
        EffectKind::Damage => {
            for target in targets {
                match target {
                    TargetRef::Player(id) => {
                        events.extend(state.damage_player(&id, ability.value, source));
                    }
                    TargetRef::Unit { owner, card_id } => {
                        events.extend(state.damage_unit(&owner, &card_id, ability.value, source));
                    }
                }
            }
        }
        EffectKind::Heal => {
            for target in targets {
                match target {
                    TargetRef::Player(id) => {
                        events.extend(state.heal_player(&id, ability.value, source));
                    }
                    TargetRef::Unit { owner, card_id } => {
                        events.extend(state.heal_unit(&owner, &card_id, ability.value, source));
                    }
                }
            }
        }
        EffectKind::Buff => {
            for target in targets {
                if let TargetRef::Unit { owner, card_id } = target {
                    events.extend(state.buff_unit(&owner, &card_id, ability.value, source));
                }
            }
        }
        EffectKind::Debuff => {
            for target in targets {
                if let TargetRef::Unit { owner, card_id } = target {
                    events.extend(state.debuff_unit(&owner, &card_id, ability.value, source));
                }
            }
        }
        EffectKind::Control => {
            let duration = ability.duration.unwrap_or(1);
            for target in targets {
                if let TargetRef::Unit { owner, card_id } = target {
                    events.extend(state.control_unit(
                        &owner,
                        &card_id,
                        &ctx.source_player,
                        duration,
                    ));
                }
            }
        }
        EffectKind::Draw => {
            for target in targets {
                if let TargetRef::Player(id) = target {
                    if let Some(player) = state.player_mut(&id) {
                        for _ in 0..ability.value.max(0) {
                            events.extend(player.draw(cards));
                        }
                    }
                }
            }
        }
        EffectKind::Discard => {
            for target in targets {
                if let TargetRef::Player(id) = target {
                    if let Some(player) = state.player_mut(&id) {
                        events.extend(player.discard_front(ability.value.max(0) as usize));
                    }
                }
            }
        }
        EffectKind::Transform => {
            for target in targets {
                if let TargetRef::Unit { owner, card_id } = target {
                    events.extend(transform_unit(state, &owner, &card_id, ability.value));
                }
            }
        }
        EffectKind::Summon => {
            events.extend(summon_copy(state, ctx, cards));
        }
    }

    events
}

/// The target unit becomes a vanilla value/value body.
fn transform_unit(state: &mut GameState, owner: &str, card_id: &str, value: i32) -> Vec<GameEvent> {
    let mut events = Vec::new();
    let Some(player) = state.player_mut(owner) else {
        return events;
    };
    let Some(slot) = player.field_slot(card_id) else {
        return events;
    };
    if let Some(stats) = player.field[slot].as_mut().and_then(Card::unit_mut) {
        stats.attack = value.max(0);
        stats.defense = value;
        stats.max_defense = Some(value);
        events.push(GameEvent::UnitTransformed {
            card_id: card_id.to_string(),
            value,
        });
        if stats.defense <= 0 {
            if let Some(card) = player.field[slot].take() {
                events.push(GameEvent::UnitDestroyed {
                    player_id: owner.to_string(),
                    card,
                });
            }
        }
    }
    events
}

/// Places a fresh catalog copy of the source card into the acting player's
/// first empty slot. No-op when the field is full or the source is not a
/// unit.
fn summon_copy(
    state: &mut GameState,
    ctx: &EffectContext,
    cards: &dyn CardSource,
) -> Vec<GameEvent> {
    let Some(card) = ctx.source_card.as_deref().and_then(|id| cards.card(id)) else {
        return Vec::new();
    };
    if !card.is_unit() {
        return Vec::new();
    }
    let Some(player) = state.player_mut(&ctx.source_player) else {
        return Vec::new();
    };
    let Some(slot) = player.first_empty_slot() else {
        return Vec::new();
    };
    let card_id = card.id.clone();
    player.field[slot] = Some(card);
    vec![GameEvent::UnitSummoned {
        player_id: ctx.source_player.clone(),
        card_id,
        position: slot,
    }]
}

/// FIFO resolution queue. Destroying a unit queues its death triggers,
/// which may destroy further units; the loop drains until quiet.
#[derive(Default)]
pub struct EffectEngine {
    queue: VecDeque<(Ability, EffectContext)>,
}

impl EffectEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_effect(&mut self, ability: Ability, ctx: EffectContext) {
        self.queue.push_back((ability, ctx));
    }

    pub fn queue_triggers(&mut self, card: &Card, trigger: TriggerKind, owner: &str) {
        for ability in card.triggered_abilities(trigger) {
            let ctx = EffectContext::new(owner).with_source_card(card.id.clone());
            self.queue.push_back((ability, ctx));
        }
    }

    pub fn resolve_all(&mut self, state: &mut GameState, cards: &dyn CardSource) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while let Some((ability, ctx)) = self.queue.pop_front() {
            let step = apply_effect(state, &ability, &ctx, cards);
            for event in &step {
                if let GameEvent::UnitDestroyed { player_id, card } = event {
                    self.queue_triggers(card, TriggerKind::OnDeath, player_id);
                }
            }
            events.extend(step);
        }
        events
    }
}

/// Registers a timed payload on the acting player. The first application
/// happens in the next processing pass, not at registration.
pub fn register_timed(
    state: &mut GameState,
    ability: &Ability,
    ctx: &EffectContext,
    source_name: &str,
) {
    let duration = match ability.duration {
        Some(duration) if duration > 0 => duration,
        _ => return,
    };
    let affected: Vec<CardId> = resolve_targets(state, ability, ctx)
        .into_iter()
        .filter_map(|target| match target {
            TargetRef::Unit { card_id, .. } => Some(card_id),
            TargetRef::Player(_) => None,
        })
        .collect();
    let source_card_id = ctx.source_card.clone().unwrap_or_default();
    let turn = state.turn;
    let Some(player) = state.player_mut(&ctx.source_player) else {
        return;
    };
    let effect = GameEffect {
        id: format!(
            "fx-{}-t{}-{}",
            source_card_id,
            turn,
            player.active_effects.len()
        ),
        source_player: ctx.source_player.clone(),
        source_card_id,
        source_name: source_name.to_string(),
        effect: ability.clone(),
        remaining_duration: duration,
        affected_card_ids: affected,
    };
    player.active_effects.push(effect);
}

/// One processing pass, run after every executed action: re-apply global
/// and per-player timed effects, fire phase-triggered unit abilities
/// matching the current phase, then prune whatever expired. Durations
/// decrement once per pass.
pub fn process_pass(state: &mut GameState, cards: &dyn CardSource) -> Vec<GameEvent> {
    let mut engine = EffectEngine::new();

    for fx in &state.active_effects {
        engine.queue_effect(fx.effect.clone(), context_for(fx));
    }
    for fx in state.active_effects.iter_mut() {
        fx.remaining_duration = fx.remaining_duration.saturating_sub(1);
    }

    for idx in 0..state.players.len() {
        for fx in &state.players[idx].active_effects {
            engine.queue_effect(fx.effect.clone(), context_for(fx));
        }
        for fx in state.players[idx].active_effects.iter_mut() {
            fx.remaining_duration = fx.remaining_duration.saturating_sub(1);
        }
    }

    let phase = state.phase;
    for idx in 0..state.players.len() {
        let owner = state.players[idx].id.clone();
        let field: Vec<Card> = state.players[idx].field.iter().flatten().cloned().collect();
        for card in field {
            for ability in card.triggered_abilities(TriggerKind::OnPhase) {
                if ability.phase == Some(phase) {
                    let ctx = EffectContext::new(owner.clone()).with_source_card(card.id.clone());
                    engine.queue_effect(ability, ctx);
                }
            }
        }
    }

    let mut events = engine.resolve_all(state, cards);
    events.extend(prune_expired(state));
    events
}

fn context_for(fx: &GameEffect) -> EffectContext {
    EffectContext::new(fx.source_player.clone())
        .with_source_card(fx.source_card_id.clone())
        .with_targets(fx.affected_card_ids.clone())
}

fn prune_expired(state: &mut GameState) -> Vec<GameEvent> {
    let mut events = Vec::new();
    state.active_effects.retain(|fx| {
        if fx.remaining_duration == 0 {
            events.push(GameEvent::EffectExpired {
                effect_id: fx.id.clone(),
            });
            false
        } else {
            true
        }
    });
    for player in state.players.iter_mut() {
        player.active_effects.retain(|fx| {
            if fx.remaining_duration == 0 {
                events.push(GameEvent::EffectExpired {
                    effect_id: fx.id.clone(),
                });
                false
            } else {
                true
            }
        });
    }
    events
}
