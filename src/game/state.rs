use serde::{Deserialize, Serialize};

use super::cards::{Ability, Card, CardId, ControlMarker, Layer, PlayerId};
use super::resources::ResourcePool;
use super::rules::GameAction;
use crate::catalog::CardSource;

/// Fixed number of field slots per player.
pub const FIELD_SIZE: usize = 4;
pub const INITIAL_HEALTH: i32 = 20;
pub const HEALTH_CAP: i32 = 20;
pub const OPENING_HAND: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Init,
    Draw,
    Main,
    Combat,
    End,
}

impl GamePhase {
    /// Forward order within a turn. `End` wraps through `END_TURN`, never
    /// through a phase change, and `Init` is left exactly once.
    pub fn successor(self) -> Option<GamePhase> {
        match self {
            GamePhase::Init => None,
            GamePhase::Draw => Some(GamePhase::Main),
            GamePhase::Main => Some(GamePhase::Combat),
            GamePhase::Combat => Some(GamePhase::End),
            GamePhase::End => None,
        }
    }
}

/// A timed effect instance: the payload plus source attribution and the
/// turns it has left. Re-applied once per processing pass until expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEffect {
    pub id: String,
    pub source_player: PlayerId,
    pub source_card_id: CardId,
    pub source_name: String,
    pub effect: Ability,
    pub remaining_duration: u32,
    #[serde(default)]
    pub affected_card_ids: Vec<CardId>,
}

/// Audit events emitted while resolving an action, returned to the caller
/// alongside the new state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameEvent {
    CardDrawn {
        player_id: PlayerId,
        card_id: CardId,
    },
    CardPlayed {
        player_id: PlayerId,
        card_id: CardId,
        position: usize,
    },
    CardDiscarded {
        player_id: PlayerId,
        card_id: CardId,
    },
    PhaseChanged {
        phase: GamePhase,
    },
    LayerChanged {
        player_id: PlayerId,
        layer: Layer,
    },
    ResourcesReplenished {
        player_id: PlayerId,
        resources: ResourcePool,
    },
    DamageDealt {
        target_id: String,
        value: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_id: Option<CardId>,
    },
    HealingApplied {
        target_id: String,
        value: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_id: Option<CardId>,
    },
    BuffApplied {
        card_id: CardId,
        value: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_id: Option<CardId>,
    },
    DebuffApplied {
        card_id: CardId,
        value: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_id: Option<CardId>,
    },
    ControlApplied {
        card_id: CardId,
        controller: PlayerId,
        duration: u32,
    },
    UnitDestroyed {
        player_id: PlayerId,
        card: Card,
    },
    UnitSummoned {
        player_id: PlayerId,
        card_id: CardId,
        position: usize,
    },
    UnitTransformed {
        card_id: CardId,
        value: i32,
    },
    AttackDeclared {
        attacker_id: CardId,
        target_id: String,
    },
    RitualResolved {
        player_id: PlayerId,
        card_id: CardId,
    },
    RitualExpired {
        player_id: PlayerId,
        card_id: CardId,
    },
    EffectExpired {
        effect_id: String,
    },
    TurnEnded {
        player_id: PlayerId,
        turn: u32,
    },
    Surrendered {
        player_id: PlayerId,
    },
    GameWon {
        winner: PlayerId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub health: i32,
    /// Remaining card ids; the back of the vector is the draw position.
    pub deck: Vec<CardId>,
    pub hand: Vec<Card>,
    pub field: [Option<Card>; FIELD_SIZE],
    pub resources: ResourcePool,
    pub active_layer: Layer,
    #[serde(default)]
    pub active_effects: Vec<GameEffect>,
}

impl PlayerState {
    pub fn new(id: impl Into<PlayerId>, deck: Vec<CardId>, hand: Vec<Card>) -> Self {
        Self {
            id: id.into(),
            health: INITIAL_HEALTH,
            deck,
            hand,
            field: Default::default(),
            resources: ResourcePool::base(),
            active_layer: Layer::Material,
            active_effects: Vec::new(),
        }
    }

    pub fn hand_index(&self, card_id: &str) -> Option<usize> {
        self.hand.iter().position(|card| card.id == card_id)
    }

    pub fn field_slot(&self, card_id: &str) -> Option<usize> {
        self.field
            .iter()
            .position(|slot| slot.as_ref().map(|card| card.id == card_id) == Some(true))
    }

    pub fn field_card(&self, card_id: &str) -> Option<&Card> {
        self.field_slot(card_id)
            .and_then(|slot| self.field[slot].as_ref())
    }

    pub fn first_empty_slot(&self) -> Option<usize> {
        self.field.iter().position(|slot| slot.is_none())
    }

    /// Moves the top deck card into the hand. An empty deck is a silent
    /// no-op; exhaustion is a loss condition checked elsewhere.
    pub fn draw(&mut self, cards: &dyn CardSource) -> Option<GameEvent> {
        let card_id = self.deck.pop()?;
        let card = cards.card(&card_id)?;
        self.hand.push(card);
        Some(GameEvent::CardDrawn {
            player_id: self.id.clone(),
            card_id,
        })
    }

    /// Discards up to `count` cards from the front of the hand.
    pub fn discard_front(&mut self, count: usize) -> Vec<GameEvent> {
        let count = count.min(self.hand.len());
        self.hand
            .drain(..count)
            .map(|card| GameEvent::CardDiscarded {
                player_id: self.id.clone(),
                card_id: card.id,
            })
            .collect()
    }

    /// Ticks down control markers on this player's units, clearing the
    /// expired ones. Runs at turn boundaries.
    pub fn tick_control_markers(&mut self) {
        for slot in self.field.iter_mut() {
            if let Some(stats) = slot.as_mut().and_then(|card| card.unit_mut()) {
                if let Some(marker) = stats.controlled.as_mut() {
                    marker.duration = marker.duration.saturating_sub(1);
                    if marker.duration == 0 {
                        stats.controlled = None;
                    }
                }
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.deck.is_empty() && self.hand.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub id: String,
    pub status: GameStatus,
    pub turn: u32,
    pub phase: GamePhase,
    pub current_player: PlayerId,
    /// Join order preserved; exactly two entries once the game is active.
    pub players: Vec<PlayerState>,
    #[serde(default)]
    pub active_effects: Vec<GameEffect>,
    #[serde(default)]
    pub history: Vec<GameAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,
    pub created_by: PlayerId,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<u64>,
}

impl GameState {
    pub fn player(&self, id: &str) -> Option<&PlayerState> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    pub fn opponent_of(&self, id: &str) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|player| player.id != id)
            .map(|player| player.id.clone())
    }

    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }

    /// Locates a card anywhere on either field.
    pub fn find_field_card(&self, card_id: &str) -> Option<(PlayerId, usize)> {
        self.players.iter().find_map(|player| {
            player
                .field_slot(card_id)
                .map(|slot| (player.id.clone(), slot))
        })
    }

    pub fn damage_player(
        &mut self,
        target: &str,
        value: i32,
        source: Option<&str>,
    ) -> Vec<GameEvent> {
        if value <= 0 {
            return Vec::new();
        }
        match self.player_mut(target) {
            Some(player) => {
                // Health may go negative here; the game-over check runs
                // after the full transition.
                player.health -= value;
                vec![GameEvent::DamageDealt {
                    target_id: target.to_string(),
                    value,
                    source_id: source.map(str::to_string),
                }]
            }
            None => Vec::new(),
        }
    }

    pub fn heal_player(
        &mut self,
        target: &str,
        value: i32,
        source: Option<&str>,
    ) -> Vec<GameEvent> {
        if value <= 0 {
            return Vec::new();
        }
        match self.player_mut(target) {
            Some(player) => {
                player.health = (player.health + value).min(HEALTH_CAP);
                vec![GameEvent::HealingApplied {
                    target_id: target.to_string(),
                    value,
                    source_id: source.map(str::to_string),
                }]
            }
            None => Vec::new(),
        }
    }

    /// Applies damage to a fielded unit, removing it from its slot when
    /// defense drops to zero or below.
    pub fn damage_unit(
        &mut self,
        owner: &str,
        card_id: &str,
        value: i32,
        source: Option<&str>,
    ) -> Vec<GameEvent> {
        if value <= 0 {
            return Vec::new();
        }
        let mut events = Vec::new();
        let Some(player) = self.player_mut(owner) else {
            return events;
        };
        let Some(slot) = player.field_slot(card_id) else {
            return events;
        };
        if let Some(stats) = player.field[slot].as_mut().and_then(Card::unit_mut) {
            stats.defense -= value;
            events.push(GameEvent::DamageDealt {
                target_id: card_id.to_string(),
                value,
                source_id: source.map(str::to_string),
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

    /// Heals a unit up to its max-defense cap, or not at all if uncapped.
    pub fn heal_unit(
        &mut self,
        owner: &str,
        card_id: &str,
        value: i32,
        source: Option<&str>,
    ) -> Vec<GameEvent> {
        if value <= 0 {
            return Vec::new();
        }
        let Some(player) = self.player_mut(owner) else {
            return Vec::new();
        };
        let Some(slot) = player.field_slot(card_id) else {
            return Vec::new();
        };
        let Some(stats) = player.field[slot].as_mut().and_then(Card::unit_mut) else {
            return Vec::new();
        };
        let cap = stats.max_defense.unwrap_or(stats.defense);
        let healed = (stats.defense + value).min(cap);
        if healed == stats.defense {
            return Vec::new();
        }
        stats.defense = healed;
        vec![GameEvent::HealingApplied {
            target_id: card_id.to_string(),
            value,
            source_id: source.map(str::to_string),
        }]
    }

    pub fn buff_unit(
        &mut self,
        owner: &str,
        card_id: &str,
        value: i32,
        source: Option<&str>,
    ) -> Vec<GameEvent> {
        let Some(player) = self.player_mut(owner) else {
            return Vec::new();
        };
        let Some(slot) = player.field_slot(card_id) else {
            return Vec::new();
        };
        match player.field[slot].as_mut().and_then(Card::unit_mut) {
            Some(stats) => {
                stats.attack += value;
                stats.defense += value;
                vec![GameEvent::BuffApplied {
                    card_id: card_id.to_string(),
                    value,
                    source_id: source.map(str::to_string),
                }]
            }
            None => Vec::new(),
        }
    }

    /// Buff in reverse: attack floors at zero, defense reaching zero
    /// destroys the unit like damage would.
    pub fn debuff_unit(
        &mut self,
        owner: &str,
        card_id: &str,
        value: i32,
        source: Option<&str>,
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let Some(player) = self.player_mut(owner) else {
            return events;
        };
        let Some(slot) = player.field_slot(card_id) else {
            return events;
        };
        if let Some(stats) = player.field[slot].as_mut().and_then(Card::unit_mut) {
            stats.attack = (stats.attack - value).max(0);
            stats.defense -= value;
            events.push(GameEvent::DebuffApplied {
                card_id: card_id.to_string(),
                value,
                source_id: source.map(str::to_string),
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

    pub fn control_unit(
        &mut self,
        owner: &str,
        card_id: &str,
        controller: &str,
        duration: u32,
    ) -> Vec<GameEvent> {
        let Some(player) = self.player_mut(owner) else {
            return Vec::new();
        };
        let Some(slot) = player.field_slot(card_id) else {
            return Vec::new();
        };
        let Some(stats) = player.field[slot].as_mut().and_then(Card::unit_mut) else {
            return Vec::new();
        };
        stats.controlled = Some(ControlMarker {
            by: controller.to_string(),
            duration,
        });
        vec![GameEvent::ControlApplied {
            card_id: card_id.to_string(),
            controller: controller.to_string(),
            duration,
        }]
    }

    /// Flips the game to finished the moment a terminal condition holds.
    /// Checks run in join order, so the first player to hit a condition
    /// loses even if the opponent would reach one later the same turn.
    pub fn evaluate_victory(&mut self) -> Option<PlayerId> {
        if self.status != GameStatus::Active {
            return self.winner.clone();
        }
        let loser = self
            .players
            .iter()
            .find(|player| player.health <= 0 || player.is_exhausted())
            .map(|player| player.id.clone())?;
        let winner = self.opponent_of(&loser)?;
        self.status = GameStatus::Finished;
        self.winner = Some(winner.clone());
        Some(winner)
    }
}
