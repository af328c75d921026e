use serde::{Deserialize, Serialize};

use super::resources::ResourcePool;
use super::state::GamePhase;

/// Catalog identifier of a card. Decks may contain duplicates, so a card id
/// is not unique on a field; lookups take the first match.
pub type CardId = String;
/// Stable identifier supplied by the identity collaborator.
pub type PlayerId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Material,
    Mind,
}

impl Layer {
    pub fn other(self) -> Layer {
        match self {
            Layer::Material => Layer::Mind,
            Layer::Mind => Layer::Material,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Damage,
    Heal,
    Buff,
    Debuff,
    Control,
    Draw,
    Discard,
    Transform,
    Summon,
}

impl EffectKind {
    /// Effect kinds that resolve against units rather than player endpoints
    /// when the target selector is left implicit.
    pub fn is_unit_scoped(self) -> bool {
        matches!(
            self,
            EffectKind::Buff
                | EffectKind::Debuff
                | EffectKind::Control
                | EffectKind::Transform
                | EffectKind::Summon
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[serde(rename = "self")]
    SelfSide,
    Ally,
    Enemy,
    All,
    Player,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerKind {
    #[serde(rename = "onEnter")]
    OnEnter,
    #[serde(rename = "onDeath")]
    OnDeath,
    #[serde(rename = "onPhase")]
    OnPhase,
}

/// A parameterized rule payload. Attached to units as an activatable or
/// triggered ability, embedded in effect cards, and carried by rituals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    pub id: String,
    pub kind: EffectKind,
    pub target: TargetKind,
    pub value: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default)]
    pub can_target_other_layer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<GamePhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<ResourcePool>,
}

impl Ability {
    pub fn new(id: impl Into<String>, kind: EffectKind, target: TargetKind, value: i32) -> Self {
        Self {
            id: id.into(),
            kind,
            target,
            value,
            duration: None,
            can_target_other_layer: false,
            phase: None,
            target_count: None,
            trigger: None,
            cost: None,
        }
    }

    pub fn with_trigger(mut self, trigger: TriggerKind) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn with_phase(mut self, phase: GamePhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_cost(mut self, cost: ResourcePool) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn cross_layer(mut self) -> Self {
        self.can_target_other_layer = true;
        self
    }
}

/// Transient marker left on a unit by a control effect. The marker is
/// recorded and ticked down at turn boundaries; no other rule consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlMarker {
    pub by: PlayerId,
    pub duration: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub attack: i32,
    pub defense: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_defense: Option<i32>,
    #[serde(default)]
    pub abilities: Vec<Ability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controlled: Option<ControlMarker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RitualSpec {
    /// Turns remaining; decremented when the owner's end phase begins.
    pub duration: u32,
    pub effects: Vec<Ability>,
    /// Minimum standing resources the owner must hold at upkeep for the
    /// ritual to stay active.
    #[serde(default)]
    pub layer_requirements: ResourcePool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CardKind {
    Unit(UnitStats),
    Effect { effect: Ability },
    Ritual(RitualSpec),
}

/// An immutable catalog definition that becomes a live instance once it
/// enters a hand; field copies carry mutable combat state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub name: String,
    pub layer: Layer,
    pub cost: ResourcePool,
    pub rarity: Rarity,
    pub set: String,
    #[serde(flatten)]
    pub kind: CardKind,
}

impl Card {
    pub fn is_unit(&self) -> bool {
        matches!(self.kind, CardKind::Unit(_))
    }

    pub fn unit(&self) -> Option<&UnitStats> {
        match &self.kind {
            CardKind::Unit(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn unit_mut(&mut self) -> Option<&mut UnitStats> {
        match &mut self.kind {
            CardKind::Unit(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn ritual(&self) -> Option<&RitualSpec> {
        match &self.kind {
            CardKind::Ritual(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn ritual_mut(&mut self) -> Option<&mut RitualSpec> {
        match &mut self.kind {
            CardKind::Ritual(spec) => Some(spec),
            _ => None,
        }
    }

    /// Abilities matching a trigger, empty for non-units.
    pub fn triggered_abilities(&self, trigger: TriggerKind) -> Vec<Ability> {
        self.unit()
            .map(|stats| {
                stats
                    .abilities
                    .iter()
                    .filter(|ability| ability.trigger == Some(trigger))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vanilla_unit() -> Card {
        Card {
            id: "u-test".into(),
            name: "Test Unit".into(),
            layer: Layer::Material,
            cost: ResourcePool::new(2, 0),
            rarity: Rarity::Common,
            set: "core".into(),
            kind: CardKind::Unit(UnitStats {
                attack: 2,
                defense: 3,
                max_defense: None,
                abilities: vec![
                    Ability::new("a-sting", EffectKind::Damage, TargetKind::Enemy, 1)
                        .with_trigger(TriggerKind::OnDeath),
                ],
                controlled: None,
            }),
        }
    }

    #[test]
    fn card_kind_round_trips_with_type_tag() {
        let card = vanilla_unit();
        let json = serde_json::to_string(&card).expect("serialize");
        assert!(json.contains("\"type\":\"unit\""));
        let back: Card = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, card);
    }

    #[test]
    fn triggered_abilities_filters_by_trigger() {
        let card = vanilla_unit();
        assert_eq!(card.triggered_abilities(TriggerKind::OnDeath).len(), 1);
        assert!(card.triggered_abilities(TriggerKind::OnEnter).is_empty());
    }

    #[test]
    fn ritual_layer_requirements_default_to_zero() {
        let json = r#"{
            "id": "r-test", "name": "Test Rite", "layer": "mind",
            "cost": {"material": 0, "mind": 2}, "rarity": "rare", "set": "core",
            "type": "ritual", "duration": 2, "effects": []
        }"#;
        let card: Card = serde_json::from_str(json).expect("deserialize");
        let ritual = card.ritual().expect("ritual kind");
        assert!(ritual.layer_requirements.is_zero());
    }
}
