//! Match-3 engine for the boat-trip challenge: board model, cascades, scoring,
//! upgrades, special tiles, drag input, timers and the optimistic session sync.

pub mod cascade;
pub mod collapse;
pub mod config;
pub mod effects;
pub mod error;
pub mod game;
pub mod grid;
pub mod input;
pub mod matcher;
pub mod rules;
pub mod score;
pub mod sync;
pub mod timer;
pub mod upgrade;

pub use boat_match3_protocol as protocol;
pub use config::{EngineConfig, RulesConfig};
pub use error::{ConfigError, RuleError, SyncError};
pub use game::{Game, GameEvent, NetworkMode};
pub use rules::Rules;
pub use sync::SessionLink;
