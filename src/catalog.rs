use once_cell::sync::Lazy;

use crate::game::cards::{
    Ability, Card, CardId, CardKind, EffectKind, Layer, Rarity, RitualSpec, TargetKind,
    TriggerKind, UnitStats,
};
use crate::game::resources::ResourcePool;
use crate::game::state::GamePhase;
use crate::storage::{keys, Storage, StorageError};

/// Card catalog lookup as the engine sees it: immutable definitions by id.
pub trait CardSource {
    fn card(&self, id: &str) -> Option<Card>;
}

/// Catalog backed by `card:<id>` records in the key-value store.
/// Unreadable or missing records resolve to `None`; the orchestrator
/// verifies deck lists upfront so this only matters for corrupt data.
pub struct StoredCards<'a, S: Storage> {
    store: &'a S,
}

impl<'a, S: Storage> StoredCards<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

impl<S: Storage> CardSource for StoredCards<'_, S> {
    fn card(&self, id: &str) -> Option<Card> {
        let raw = self.store.get(&keys::card(id)).ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }
}

/// The built-in core set, usable directly as a catalog.
pub struct CoreSet;

impl CardSource for CoreSet {
    fn card(&self, id: &str) -> Option<Card> {
        core_card(id)
    }
}

pub fn core_card(id: &str) -> Option<Card> {
    core_set().iter().find(|card| card.id == id).cloned()
}

/// Writes every core-set card into storage under its `card:<id>` key.
pub fn seed_core_set<S: Storage>(store: &mut S) -> Result<(), StorageError> {
    for card in core_set() {
        let raw = serde_json::to_string(card)
            .map_err(|err| StorageError::new(format!("encode {}: {err}", card.id)))?;
        store.put(&keys::card(&card.id), &raw)?;
    }
    Ok(())
}

/// A legal 20-card starter list for one layer, built from core-set commons.
pub fn starter_deck(layer: Layer) -> Vec<CardId> {
    let ids: &[(&str, usize)] = match layer {
        Layer::Material => &[
            ("mat-u-01", 3),
            ("mat-u-02", 2),
            ("mat-u-03", 2),
            ("mat-u-04", 2),
            ("mat-u-05", 2),
            ("mat-u-06", 1),
            ("mat-u-07", 1),
            ("mat-u-08", 1),
            ("mat-s-01", 2),
            ("mat-s-02", 2),
            ("mat-s-03", 1),
            ("mat-r-01", 1),
        ],
        Layer::Mind => &[
            ("min-u-01", 3),
            ("min-u-02", 2),
            ("min-u-03", 2),
            ("min-u-04", 2),
            ("min-u-05", 2),
            ("min-u-06", 1),
            ("min-u-07", 1),
            ("min-s-01", 2),
            ("min-s-02", 2),
            ("min-s-03", 1),
            ("min-s-04", 1),
            ("min-r-01", 1),
        ],
    };
    ids.iter()
        .flat_map(|(id, copies)| std::iter::repeat(id.to_string()).take(*copies))
        .collect()
}

pub fn core_set() -> &'static [Card] {
    &CORE_SET
}

static CORE_SET: Lazy<Vec<Card>> = Lazy::new(|| {
    vec![
        // Material: bodies first, tricks second.
        unit(
            "mat-u-01",
            "Boneclad Vanguard",
            Layer::Material,
            ResourcePool::new(1, 0),
            Rarity::Common,
            2,
            1,
            vec![],
        ),
        unit(
            "mat-u-02",
            "Fleshsmith",
            Layer::Material,
            ResourcePool::new(2, 0),
            Rarity::Common,
            1,
            3,
            vec![
                Ability::new("a-graft", EffectKind::Heal, TargetKind::Ally, 2)
                    .with_cost(ResourcePool::new(1, 0)),
            ],
        ),
        unit(
            "mat-u-03",
            "Quarry Golem",
            Layer::Material,
            ResourcePool::new(2, 0),
            Rarity::Common,
            2,
            3,
            vec![],
        ),
        unit(
            "mat-u-04",
            "Redvein Hunter",
            Layer::Material,
            ResourcePool::new(1, 0),
            Rarity::Common,
            2,
            1,
            vec![
                Ability::new("a-first-blood", EffectKind::Damage, TargetKind::Enemy, 1)
                    .with_trigger(TriggerKind::OnEnter),
            ],
        ),
        unit(
            "mat-u-05",
            "Graniteback Warden",
            Layer::Material,
            ResourcePool::new(4, 0),
            Rarity::Common,
            2,
            5,
            vec![],
        ),
        unit(
            "mat-u-06",
            "Gravewright",
            Layer::Material,
            ResourcePool::new(3, 0),
            Rarity::Uncommon,
            3,
            2,
            vec![
                Ability::new("a-reknit", EffectKind::Summon, TargetKind::SelfSide, 1)
                    .with_trigger(TriggerKind::OnDeath),
            ],
        ),
        unit(
            "mat-u-07",
            "Pulse Reaver",
            Layer::Material,
            ResourcePool::new(3, 1),
            Rarity::Uncommon,
            3,
            3,
            vec![
                Ability::new("a-fervor", EffectKind::Buff, TargetKind::SelfSide, 1)
                    .with_trigger(TriggerKind::OnPhase)
                    .with_phase(GamePhase::Combat),
            ],
        ),
        unit(
            "mat-u-08",
            "Colossus of the Red Vale",
            Layer::Material,
            ResourcePool::new(5, 0),
            Rarity::Rare,
            5,
            6,
            vec![{
                let mut crush =
                    Ability::new("a-crush", EffectKind::Damage, TargetKind::Enemy, 2)
                        .with_cost(ResourcePool::new(2, 0));
                crush.target_count = Some(1);
                crush
            }],
        ),
        spell(
            "mat-s-01",
            "Rending Grasp",
            Layer::Material,
            ResourcePool::new(2, 0),
            Rarity::Common,
            Ability::new("e-rend", EffectKind::Damage, TargetKind::Enemy, 3),
        ),
        spell(
            "mat-s-02",
            "Mend the Broken",
            Layer::Material,
            ResourcePool::new(1, 0),
            Rarity::Common,
            Ability::new("e-mend", EffectKind::Heal, TargetKind::SelfSide, 4),
        ),
        spell(
            "mat-s-03",
            "Stonehide",
            Layer::Material,
            ResourcePool::new(1, 0),
            Rarity::Uncommon,
            Ability::new("e-stonehide", EffectKind::Buff, TargetKind::Ally, 1),
        ),
        ritual(
            "mat-r-01",
            "Rite of the Bleeding Earth",
            Layer::Material,
            ResourcePool::new(3, 0),
            Rarity::Rare,
            RitualSpec {
                duration: 3,
                effects: vec![Ability::new(
                    "e-bleed",
                    EffectKind::Damage,
                    TargetKind::Enemy,
                    1,
                )],
                layer_requirements: ResourcePool::new(1, 0),
            },
        ),
        // Mind: thinner bodies, card flow and meddling.
        unit(
            "min-u-01",
            "Thought Wisp",
            Layer::Mind,
            ResourcePool::new(0, 1),
            Rarity::Common,
            1,
            1,
            vec![],
        ),
        unit(
            "min-u-02",
            "Dream Stalker",
            Layer::Mind,
            ResourcePool::new(0, 2),
            Rarity::Common,
            2,
            2,
            vec![
                Ability::new("a-lucid-pull", EffectKind::Draw, TargetKind::SelfSide, 1)
                    .with_trigger(TriggerKind::OnEnter),
            ],
        ),
        unit(
            "min-u-03",
            "Echo Weaver",
            Layer::Mind,
            ResourcePool::new(0, 2),
            Rarity::Common,
            1,
            3,
            vec![
                Ability::new("a-soothe", EffectKind::Heal, TargetKind::SelfSide, 2)
                    .with_cost(ResourcePool::new(0, 1)),
            ],
        ),
        unit(
            "min-u-04",
            "Veil Shade",
            Layer::Mind,
            ResourcePool::new(0, 3),
            Rarity::Common,
            3,
            2,
            vec![
                Ability::new("a-parting-curse", EffectKind::Damage, TargetKind::Enemy, 1)
                    .with_trigger(TriggerKind::OnDeath),
            ],
        ),
        unit(
            "min-u-05",
            "Memory Warden",
            Layer::Mind,
            ResourcePool::new(0, 4),
            Rarity::Common,
            2,
            5,
            vec![],
        ),
        unit(
            "min-u-06",
            "Lucid Tyrant",
            Layer::Mind,
            ResourcePool::new(1, 4),
            Rarity::Rare,
            4,
            4,
            vec![{
                let mut dominate =
                    Ability::new("a-dominate", EffectKind::Control, TargetKind::Enemy, 0)
                        .with_duration(2)
                        .with_cost(ResourcePool::new(0, 2))
                        .cross_layer();
                dominate.target_count = Some(1);
                dominate
            }],
        ),
        unit(
            "min-u-07",
            "Somnolent Drifter",
            Layer::Mind,
            ResourcePool::new(0, 1),
            Rarity::Uncommon,
            0,
            3,
            vec![
                Ability::new("a-restful", EffectKind::Heal, TargetKind::SelfSide, 1)
                    .with_trigger(TriggerKind::OnPhase)
                    .with_phase(GamePhase::End),
            ],
        ),
        spell(
            "min-s-01",
            "Shatter Psyche",
            Layer::Mind,
            ResourcePool::new(0, 2),
            Rarity::Common,
            Ability::new("e-shatter", EffectKind::Damage, TargetKind::Enemy, 2),
        ),
        spell(
            "min-s-02",
            "Veiled Insight",
            Layer::Mind,
            ResourcePool::new(0, 1),
            Rarity::Common,
            Ability::new("e-insight", EffectKind::Draw, TargetKind::SelfSide, 1),
        ),
        spell(
            "min-s-03",
            "Mass Disquiet",
            Layer::Mind,
            ResourcePool::new(0, 3),
            Rarity::Uncommon,
            Ability::new("e-disquiet", EffectKind::Debuff, TargetKind::Enemy, 1).cross_layer(),
        ),
        spell(
            "min-s-04",
            "Forgettance",
            Layer::Mind,
            ResourcePool::new(0, 2),
            Rarity::Uncommon,
            Ability::new("e-forget", EffectKind::Discard, TargetKind::Enemy, 1),
        ),
        ritual(
            "min-r-01",
            "Communion of Whispers",
            Layer::Mind,
            ResourcePool::new(0, 3),
            Rarity::Rare,
            RitualSpec {
                duration: 2,
                effects: vec![Ability::new(
                    "e-commune",
                    EffectKind::Draw,
                    TargetKind::SelfSide,
                    1,
                )],
                layer_requirements: ResourcePool::new(0, 1),
            },
        ),
    ]
});

fn unit(
    id: &str,
    name: &str,
    layer: Layer,
    cost: ResourcePool,
    rarity: Rarity,
    attack: i32,
    defense: i32,
    abilities: Vec<Ability>,
) -> Card {
    Card {
        id: id.into(),
        name: name.into(),
        layer,
        cost,
        rarity,
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

fn spell(
    id: &str,
    name: &str,
    layer: Layer,
    cost: ResourcePool,
    rarity: Rarity,
    effect: Ability,
) -> Card {
    Card {
        id: id.into(),
        name: name.into(),
        layer,
        cost,
        rarity,
        set: "core".into(),
        kind: CardKind::Effect { effect },
    }
}

fn ritual(
    id: &str,
    name: &str,
    layer: Layer,
    cost: ResourcePool,
    rarity: Rarity,
    spec: RitualSpec,
) -> Card {
    Card {
        id: id.into(),
        name: name.into(),
        layer,
        cost,
        rarity,
        set: "core".into(),
        kind: CardKind::Ritual(spec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn core_set_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for card in core_set() {
            assert!(seen.insert(card.id.clone()), "duplicate id {}", card.id);
        }
    }

    #[test]
    fn starter_decks_are_legal_twenty_card_lists() {
        for layer in [Layer::Material, Layer::Mind] {
            let deck = starter_deck(layer);
            assert_eq!(deck.len(), 20);
            for id in &deck {
                let card = core_card(id).expect("starter card exists in core set");
                assert_eq!(card.layer, layer);
            }
        }
    }

    #[test]
    fn seeded_store_serves_the_same_cards() {
        let mut store = MemoryStore::new();
        seed_core_set(&mut store).unwrap();
        let stored = StoredCards::new(&store);
        let direct = core_card("mat-u-01").unwrap();
        assert_eq!(stored.card("mat-u-01"), Some(direct));
        assert_eq!(stored.card("no-such-card"), None);
    }
}
