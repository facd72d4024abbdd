//! Zavod Miner Library
//!
//! A single-account bot for the Zavod farming mini-app on Telegram.
//!
//! This crate provides the core functionality for:
//! - Loading settings and Telegram API credentials
//! - Exchanging a Telegram `MTProto` session for mini-app init-data
//! - Calling the game's REST backend
//! - Claiming rewards and buying upgrades on a cooldown-driven loop

pub mod config;
pub mod game;
pub mod miner;
pub mod telegram;
