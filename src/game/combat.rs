use super::cards::Card;
use super::effects::EffectEngine;
use super::rules::{DeclareAttackAction, EngineFault};
use super::state::{GameEvent, GameState};
use crate::catalog::CardSource;

/// Resolves a declared attack: the attacker's attack stat hits the target,
/// and a defending unit strikes back with its own attack stat. Exactly one
/// exchange per declaration.
///
/// Destruction and death-trigger cascades go through the same effect
/// engine path as the damage effect.
pub fn resolve_attack(
    state: &mut GameState,
    attacking_player: &str,
    action: &DeclareAttackAction,
    engine: &mut EffectEngine,
    cards: &dyn CardSource,
) -> Result<Vec<GameEvent>, EngineFault> {
    let attacker = state
        .player(attacking_player)
        .and_then(|player| player.field_card(&action.attacker_id))
        .and_then(Card::unit)
        .cloned()
        .ok_or_else(|| EngineFault::new("attacker missing from field after validation"))?;
    let opponent = state
        .opponent_of(attacking_player)
        .ok_or_else(|| EngineFault::new("attack resolved without an opponent"))?;

    let mut events = vec![GameEvent::AttackDeclared {
        attacker_id: action.attacker_id.clone(),
        target_id: action.target_id.clone(),
    }];

    if action.target_id == opponent {
        events.extend(state.damage_player(&opponent, attacker.attack, Some(&action.attacker_id)));
    } else {
        let defender = state
            .player(&opponent)
            .and_then(|player| player.field_card(&action.target_id))
            .and_then(Card::unit)
            .cloned()
            .ok_or_else(|| EngineFault::new("attack target missing after validation"))?;

        events.extend(state.damage_unit(
            &opponent,
            &action.target_id,
            attacker.attack,
            Some(&action.attacker_id),
        ));
        // Mutual combat: the defender trades back even if it just died.
        events.extend(state.damage_unit(
            attacking_player,
            &action.attacker_id,
            defender.attack,
            Some(&action.target_id),
        ));
    }

    for event in &events {
        if let GameEvent::UnitDestroyed { player_id, card } = event {
            engine.queue_triggers(card, super::cards::TriggerKind::OnDeath, player_id);
        }
    }
    events.extend(engine.resolve_all(state, cards));
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::cards::{Ability, CardKind, EffectKind, Layer, Rarity, TargetKind, TriggerKind, UnitStats};
    use crate::game::resources::ResourcePool;
    use crate::game::state::{GamePhase, GameStatus, PlayerState};

    struct NoCards;

    impl CardSource for NoCards {
        fn card(&self, _id: &str) -> Option<Card> {
            None
        }
    }

    fn unit(id: &str, attack: i32, defense: i32, abilities: Vec<Ability>) -> Card {
        Card {
            id: id.into(),
            name: id.into(),
            layer: Layer::Material,
            cost: ResourcePool::new(1, 0),
            rarity: Rarity::Common,
            set: "core".into(),
            kind: CardKind::Unit(UnitStats {
                attack,
                defense,
                max_defense: Some(defense),
                abilities,
                controlled: None,
            }),
        }
    }

    fn combat_state(attacker: Card, defender: Option<Card>) -> GameState {
        let mut alice = PlayerState::new("alice", vec!["filler".into()], Vec::new());
        alice.field[0] = Some(attacker);
        let mut bob = PlayerState::new("bob", vec!["filler".into()], Vec::new());
        if let Some(card) = defender {
            bob.field[0] = Some(card);
        }
        GameState {
            id: "game-1".into(),
            status: GameStatus::Active,
            turn: 3,
            phase: GamePhase::Combat,
            current_player: "alice".into(),
            players: vec![alice, bob],
            active_effects: Vec::new(),
            history: Vec::new(),
            winner: None,
            created_by: "alice".into(),
            created_at: 0,
            started_at: Some(0),
            finished_at: None,
        }
    }

    #[test]
    fn direct_attack_hits_player_health() {
        let mut state = combat_state(unit("u-raider", 3, 2, Vec::new()), None);
        let action = DeclareAttackAction {
            attacker_id: "u-raider".into(),
            target_id: "bob".into(),
        };
        let mut engine = EffectEngine::new();
        let events = resolve_attack(&mut state, "alice", &action, &mut engine, &NoCards)
            .expect("attack resolves");
        assert_eq!(state.player("bob").unwrap().health, 17);
        assert!(matches!(events.first(), Some(GameEvent::AttackDeclared { .. })));
    }

    #[test]
    fn unit_combat_is_mutual() {
        let mut state = combat_state(
            unit("u-raider", 3, 4, Vec::new()),
            Some(unit("u-wall", 2, 5, Vec::new())),
        );
        let action = DeclareAttackAction {
            attacker_id: "u-raider".into(),
            target_id: "u-wall".into(),
        };
        let mut engine = EffectEngine::new();
        resolve_attack(&mut state, "alice", &action, &mut engine, &NoCards)
            .expect("attack resolves");

        let wall = state
            .player("bob")
            .unwrap()
            .field_card("u-wall")
            .and_then(Card::unit)
            .unwrap()
            .defense;
        let raider = state
            .player("alice")
            .unwrap()
            .field_card("u-raider")
            .and_then(Card::unit)
            .unwrap()
            .defense;
        assert_eq!(wall, 2);
        assert_eq!(raider, 2);
    }

    #[test]
    fn trade_destroys_both_and_fires_death_triggers() {
        let attacker = unit(
            "u-martyr",
            2,
            2,
            vec![
                Ability::new("a-last-word", EffectKind::Damage, TargetKind::Enemy, 1)
                    .with_trigger(TriggerKind::OnDeath),
            ],
        );
        let mut state = combat_state(attacker, Some(unit("u-brute", 4, 2, Vec::new())));
        let action = DeclareAttackAction {
            attacker_id: "u-martyr".into(),
            target_id: "u-brute".into(),
        };
        let mut engine = EffectEngine::new();
        let events = resolve_attack(&mut state, "alice", &action, &mut engine, &NoCards)
            .expect("attack resolves");

        let destroyed = events
            .iter()
            .filter(|event| matches!(event, GameEvent::UnitDestroyed { .. }))
            .count();
        assert_eq!(destroyed, 2);
        assert!(state.player("alice").unwrap().field[0].is_none());
        assert!(state.player("bob").unwrap().field[0].is_none());
        // The martyr's death trigger chips the opposing player.
        assert_eq!(state.player("bob").unwrap().health, 19);
    }
}
