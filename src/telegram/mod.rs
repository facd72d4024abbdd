//! Telegram client wrapper module.
//!
//! Provides the MTProto client used for login and the credential
//! exchange that turns a Telegram session into game init-data.

mod client;
mod init_data;
mod webapp;

pub use client::{ResolvedBot, TelegramBot, TelegramError};
pub use init_data::{InitData, InitDataError};
pub use webapp::{
    AuthError, GAME_BOT_USERNAME, GAME_WEB_APP_URL, InitDataProvider, TelegramWebApp,
};
