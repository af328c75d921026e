use serde::{Deserialize, Serialize};

use super::cards::Layer;

/// Base allotment a player is reset to when their end phase begins.
pub const BASE_MATERIAL: u32 = 3;
pub const BASE_MIND: u32 = 3;

/// The two-currency balance every player carries. Also doubles as a cost
/// and as the layer-requirement map on ritual cards.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourcePool {
    #[serde(default)]
    pub material: u32,
    #[serde(default)]
    pub mind: u32,
}

impl ResourcePool {
    pub fn new(material: u32, mind: u32) -> Self {
        Self { material, mind }
    }

    /// The per-turn allotment; resources do not carry over between turns.
    pub fn base() -> Self {
        Self {
            material: BASE_MATERIAL,
            mind: BASE_MIND,
        }
    }

    pub fn get(&self, layer: Layer) -> u32 {
        match layer {
            Layer::Material => self.material,
            Layer::Mind => self.mind,
        }
    }

    pub fn has_enough(&self, cost: &ResourcePool) -> bool {
        self.material >= cost.material && self.mind >= cost.mind
    }

    /// Subtracts per key, clamped at zero. Callers are expected to check
    /// `has_enough` first; overspending clamps rather than panics.
    pub fn spend(&self, cost: &ResourcePool) -> ResourcePool {
        ResourcePool {
            material: self.material.saturating_sub(cost.material),
            mind: self.mind.saturating_sub(cost.mind),
        }
    }

    pub fn add(&self, gain: &ResourcePool) -> ResourcePool {
        ResourcePool {
            material: self.material.saturating_add(gain.material),
            mind: self.mind.saturating_add(gain.mind),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.material == 0 && self.mind == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affordability_checks_every_key() {
        let balance = ResourcePool::new(2, 1);
        assert!(balance.has_enough(&ResourcePool::new(2, 1)));
        assert!(balance.has_enough(&ResourcePool::new(0, 0)));
        assert!(!balance.has_enough(&ResourcePool::new(3, 0)));
        assert!(!balance.has_enough(&ResourcePool::new(1, 2)));
    }

    #[test]
    fn spend_never_goes_negative() {
        let balance = ResourcePool::new(1, 0);
        let after = balance.spend(&ResourcePool::new(4, 2));
        assert_eq!(after, ResourcePool::new(0, 0));
    }

    #[test]
    fn spend_and_add_round_trip() {
        let balance = ResourcePool::base();
        let cost = ResourcePool::new(2, 1);
        let after = balance.spend(&cost).add(&cost);
        assert_eq!(after, balance);
    }
}
