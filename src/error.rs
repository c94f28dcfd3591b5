use boat_match3_protocol::{Status, UpgradeKind};
use thiserror::Error;

use crate::effects::SpecialTile;

/// Why the rules refused an action. The state is left untouched in every case.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("session is not accepting moves (status {0:?})")]
    NotActive(Status),
    #[error("an upgrade choice is pending")]
    UpgradePending,
    #[error("cell {0} is outside the grid")]
    OutOfBounds(usize),
    #[error("cells {from} and {to} are not adjacent")]
    NotAdjacent { from: usize, to: usize },
    #[error("no {0:?} left")]
    OutOfStock(SpecialTile),
    #[error("no upgrade offer is open")]
    NoUpgradePending,
    #[error("{0:?} was not among the offered upgrades")]
    ChoiceNotOffered(UpgradeKind),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("another request is already in flight")]
    Busy,
    #[error("no connection to the session authority")]
    NotConnected,
    #[error("no bearer token")]
    NotAuthenticated,
    #[error("connection to the session authority was lost")]
    Disconnected,
    #[error("rejected by the session authority: {0}")]
    Rejected(String),
    #[error("reply did not match the request")]
    UnexpectedReply,
    #[error("could not reach the session authority: {0}")]
    Connect(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid engine config: {0}")]
    Parse(#[from] serde_json::Error),
}
