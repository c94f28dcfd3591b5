use serde::{Deserialize, Serialize};

mod grid;

pub use grid::{Grid, GridError, Symbol, CELL_COUNT, GRID_SIZE};

pub type UpgradeTier = i8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ready,
    Active,
    Upgrade,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpgradeKind {
    Time,
    Multiplier,
    Refresh,
    Bomb,
    Crystal,
}

impl UpgradeKind {
    pub const ALL: [UpgradeKind; 5] = [
        UpgradeKind::Time,
        UpgradeKind::Multiplier,
        UpgradeKind::Refresh,
        UpgradeKind::Bomb,
        UpgradeKind::Crystal,
    ];
}

fn no_tier() -> UpgradeTier {
    -1
}

/// Session snapshot as returned by the authority after every accepted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub grid: Grid,
    pub score: u32,
    pub time_left: u32,
    pub status: Status,
    pub bombs: u32,
    #[serde(default)]
    pub crystals: u32,
    pub bomb_drop_chance: f64,
    #[serde(default)]
    pub crystal_drop_chance: f64,
    pub score_multiplier: f64,
    pub refresh_base: u32,
    pub upgrade_pending: bool,
    #[serde(default = "no_tier")]
    pub upgrade_tier: UpgradeTier,
    #[serde(default)]
    pub upgrade_choices: Vec<UpgradeKind>,
}

impl GameState {
    /// An offer is open either via the flag or the status; older sessions only set one.
    pub fn awaiting_upgrade(&self) -> bool {
        self.upgrade_pending || self.status == Status::Upgrade
    }

    pub fn is_playing(&self) -> bool {
        self.status == Status::Active && !self.awaiting_upgrade() && self.time_left > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameAction {
    Session {
        #[serde(default)]
        start: bool,
        #[serde(default)]
        reset: bool,
    },
    Move { from: usize, to: usize },
    Bomb { index: usize },
    Crystal { index: usize },
    Upgrade { choice: UpgradeKind },
    Refresh,
    End,
}

impl GameAction {
    /// The REST-style endpoint this action stands for; used in logs.
    pub fn endpoint(&self) -> &'static str {
        match self {
            GameAction::Session { .. } => "/game/session",
            GameAction::Move { .. } => "/game/move",
            GameAction::Bomb { .. } => "/game/bomb",
            GameAction::Crystal { .. } => "/game/crystal",
            GameAction::Upgrade { .. } => "/game/upgrade",
            GameAction::Refresh => "/game/refresh",
            GameAction::End => "/game/end",
        }
    }
}

/// One request per action; `token` is the player's bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRequest {
    pub token: String,
    pub action: GameAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSummary {
    pub final_score: u32,
    pub personal_best: u32,
    pub was_improved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    State { state: GameState },
    Ended { summary: EndSummary },
    Rejected { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_state_uses_camel_case_and_defaults() {
        let mut cells = vec![r#""⛵""#; CELL_COUNT].join(",");
        cells.insert(0, '[');
        cells.push(']');
        let json = format!(
            r#"{{"grid":{cells},"score":40,"timeLeft":12,"status":"upgrade","bombs":1,
                "bombDropChance":0.05,"scoreMultiplier":2.0,"refreshBase":7,"upgradePending":false}}"#
        );
        let state: GameState = serde_json::from_str(&json).unwrap();
        assert_eq!(state.time_left, 12);
        assert_eq!(state.crystals, 0);
        assert_eq!(state.upgrade_tier, -1);
        assert!(state.upgrade_choices.is_empty());
        assert!(state.awaiting_upgrade());
        assert!(!state.is_playing());
    }

    #[test]
    fn actions_are_tagged_by_type() {
        let request = ClientRequest {
            token: "abc".into(),
            action: GameAction::Move { from: 3, to: 8 },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"token":"abc","action":{"type":"Move","from":3,"to":8}}"#);

        let action: GameAction = serde_json::from_str(r#"{"type":"Session","start":true}"#).unwrap();
        assert_eq!(action, GameAction::Session { start: true, reset: false });
        assert_eq!(action.endpoint(), "/game/session");
    }

    #[test]
    fn end_summary_wire_names() {
        let reply = ServerMessage::Ended {
            summary: EndSummary {
                final_score: 120,
                personal_best: 300,
                was_improved: false,
            },
        };
        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains(r#""finalScore":120"#));
        assert!(json.contains(r#""personalBest":300"#));
        assert!(json.contains(r#""wasImproved":false"#));
    }
}
