pub mod actors;
pub mod checkins;
pub mod leaderboard;
pub mod map;
pub mod social;
pub mod stats;
