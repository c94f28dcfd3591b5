//! Tiered upgrades. Each accepted offer moves the session one tier up (capped
//! at [`MAX_TIER`]) and applies that tier's magnitude for the chosen kind.

use tracing::info;

use boat_match3_protocol::{GameState, Status, UpgradeKind, UpgradeTier};

use crate::error::RuleError;

pub const MAX_TIER: UpgradeTier = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefreshEffect {
    ReduceBy(u32),
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierEffects {
    pub time_bonus: u32,
    pub multiplier: f64,
    pub refresh: RefreshEffect,
    pub bomb_chance: f64,
    pub crystal_chance: f64,
}

pub const TIERS: [TierEffects; 3] = [
    TierEffects {
        time_bonus: 10,
        multiplier: 2.0,
        refresh: RefreshEffect::ReduceBy(3),
        bomb_chance: 0.05,
        crystal_chance: 0.02,
    },
    TierEffects {
        time_bonus: 30,
        multiplier: 3.0,
        refresh: RefreshEffect::ReduceBy(6),
        bomb_chance: 0.15,
        crystal_chance: 0.05,
    },
    TierEffects {
        time_bonus: 60,
        multiplier: 4.0,
        refresh: RefreshEffect::Zero,
        bomb_chance: 0.35,
        crystal_chance: 0.20,
    },
];

impl TierEffects {
    pub fn label(&self, kind: UpgradeKind) -> String {
        match kind {
            UpgradeKind::Time => format!("+{}s", self.time_bonus),
            UpgradeKind::Multiplier => format!("×{}", self.multiplier),
            UpgradeKind::Refresh => match self.refresh {
                RefreshEffect::ReduceBy(secs) => format!("-{secs}s"),
                RefreshEffect::Zero => "0s".to_string(),
            },
            UpgradeKind::Bomb => format!("+{}%", (self.bomb_chance * 100.0).round()),
            UpgradeKind::Crystal => format!("+{}%", (self.crystal_chance * 100.0).round()),
        }
    }
}

pub fn next_tier(current: UpgradeTier) -> UpgradeTier {
    current.saturating_add(1).clamp(0, MAX_TIER)
}

pub fn tier_effects(tier: UpgradeTier) -> &'static TierEffects {
    &TIERS[tier.clamp(0, MAX_TIER) as usize]
}

/// Labels for the open offer, describing what accepting each choice would apply.
/// This is the next tier's table row, not the tier already reached.
pub fn offer_labels(state: &GameState) -> Vec<(UpgradeKind, String)> {
    let effects = tier_effects(next_tier(state.upgrade_tier));
    state
        .upgrade_choices
        .iter()
        .map(|&kind| (kind, effects.label(kind)))
        .collect()
}

/// Accepts one of the offered kinds. Returns the new tier.
pub fn accept(state: &mut GameState, choice: UpgradeKind) -> Result<UpgradeTier, RuleError> {
    if !state.awaiting_upgrade() {
        return Err(RuleError::NoUpgradePending);
    }
    if !state.upgrade_choices.contains(&choice) {
        return Err(RuleError::ChoiceNotOffered(choice));
    }

    let tier = next_tier(state.upgrade_tier);
    let effects = tier_effects(tier);
    match choice {
        UpgradeKind::Time => state.time_left = state.time_left.saturating_add(effects.time_bonus),
        UpgradeKind::Multiplier => {
            state.score_multiplier = state.score_multiplier.max(effects.multiplier)
        }
        UpgradeKind::Refresh => {
            state.refresh_base = match effects.refresh {
                RefreshEffect::ReduceBy(secs) => state.refresh_base.saturating_sub(secs),
                RefreshEffect::Zero => 0,
            }
        }
        UpgradeKind::Bomb => {
            state.bomb_drop_chance = (state.bomb_drop_chance + effects.bomb_chance).min(1.0)
        }
        UpgradeKind::Crystal => {
            state.crystal_drop_chance = (state.crystal_drop_chance + effects.crystal_chance).min(1.0)
        }
    }

    state.upgrade_tier = tier;
    state.upgrade_pending = false;
    state.upgrade_choices.clear();
    state.status = if state.time_left == 0 {
        Status::Ended
    } else {
        Status::Active
    };
    info!(?choice, tier, "upgrade accepted");
    Ok(tier)
}
