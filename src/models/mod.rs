// Re-export all model types from submodules
mod actors;
mod badges;
mod checkins;
mod leaderboard;
mod map;
mod social;
mod stats;

pub use actors::*;
pub use badges::*;
pub use checkins::*;
pub use leaderboard::*;
pub use map::*;
pub use social::*;
pub use stats::*;
