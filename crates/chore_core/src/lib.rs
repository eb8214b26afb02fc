pub mod aggregate;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod leaderboard;
pub mod model;
pub mod storage;
