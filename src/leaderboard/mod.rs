pub mod aggregator;
pub mod service;
pub mod streaks;
