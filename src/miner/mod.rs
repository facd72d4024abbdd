//! Claim/upgrade policy and the mining loop.

pub mod policy;
mod runner;

pub use policy::{LevelTables, UpgradeDecision, UpgradePrice, UpgradeTrack};
pub use runner::{CycleReport, Miner, MinerError, UpgradeOutcome};
