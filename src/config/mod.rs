//! Configuration module for the miner.
//!
//! Handles loading of Telegram API credentials, miner behaviour
//! settings and the optional proxy.

mod proxy;
mod settings;

pub use proxy::ProxyConfig;
pub use settings::{ConfigError, MinerSettings, TelegramConfig};
