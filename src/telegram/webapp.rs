//! Exchange of a Telegram session for mini-app init-data.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::{InitData, TelegramBot, TelegramError};
use crate::config::{ProxyConfig, TelegramConfig};

/// Bot hosting the game mini-app.
pub const GAME_BOT_USERNAME: &str = "Marswallet_bot";

/// Mini-app page opened from the bot menu.
pub const GAME_WEB_APP_URL: &str = "https://zavod.mdaowallet.com/";

/// Platform reported in the web-view request.
const WEB_VIEW_PLATFORM: &str = "android";

/// Outcome of a failed exchange.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The Telegram session is unauthorized, deactivated or revoked.
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// Any other failure; the exchange may be retried.
    #[error("{0}")]
    Failed(String),
}

/// Source of game session tokens.
#[async_trait]
pub trait InitDataProvider: Send + Sync {
    /// Produces fresh init-data for the account.
    async fn init_data(&self) -> Result<InitData, AuthError>;
}

/// Credential exchanger backed by a real Telegram account.
///
/// Every exchange opens its own MTProto connection and closes it again,
/// so no Telegram connection is held while mining.
#[derive(Debug, Clone)]
pub struct TelegramWebApp {
    config: TelegramConfig,
    proxy: Option<ProxyConfig>,
}

impl TelegramWebApp {
    #[must_use]
    pub const fn new(config: TelegramConfig, proxy: Option<ProxyConfig>) -> Self {
        Self { config, proxy }
    }

    fn classify(&self, err: TelegramError) -> AuthError {
        if err.is_session_invalid() {
            AuthError::InvalidSession(self.config.session_name())
        } else {
            AuthError::Failed(err.to_string())
        }
    }

    async fn open_web_app(&self, bot: &TelegramBot) -> Result<InitData, AuthError> {
        if !bot.is_authorized().await.map_err(|e| self.classify(e))? {
            return Err(AuthError::InvalidSession(self.config.session_name()));
        }

        let game_bot = bot
            .resolve_bot(GAME_BOT_USERNAME)
            .await
            .map_err(|e| self.classify(e))?;

        let auth_url = bot
            .request_web_view(&game_bot, GAME_WEB_APP_URL, WEB_VIEW_PLATFORM)
            .await
            .map_err(|e| self.classify(e))?;

        debug!("Received web view URL ({} bytes)", auth_url.len());

        InitData::from_redirect_url(&auth_url).map_err(|e| AuthError::Failed(e.to_string()))
    }
}

#[async_trait]
impl InitDataProvider for TelegramWebApp {
    async fn init_data(&self) -> Result<InitData, AuthError> {
        let bot = TelegramBot::connect(&self.config, self.proxy.as_ref())
            .await
            .map_err(|e| self.classify(e))?;

        let result = self.open_web_app(&bot).await;
        bot.disconnect();
        result
    }
}
