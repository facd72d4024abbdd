//! Telegram client wrapper for login and mini-app web views.

use std::sync::Arc;

use grammers_client::client::{LoginToken, PasswordToken};
use grammers_client::{sender, Client, InvocationError, SenderPool, SignInError};
use grammers_session::storages::SqliteSession;
use grammers_tl_types as tl;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{ProxyConfig, TelegramConfig};

/// RPC error names meaning the stored session can no longer be used.
const INVALID_SESSION_ERRORS: &[&str] = &[
    "AUTH_KEY_UNREGISTERED",
    "AUTH_KEY_INVALID",
    "USER_DEACTIVATED",
    "USER_DEACTIVATED_BAN",
    "SESSION_REVOKED",
    "SESSION_EXPIRED",
];

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Session is no longer valid: {0}")]
    SessionInvalid(String),

    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Password required for 2FA")]
    PasswordRequired(PasswordToken),

    #[error("Invalid password")]
    InvalidPassword(PasswordToken),

    #[error("Bot @{0} could not be resolved")]
    BotNotFound(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("API invocation error: {0}")]
    Invocation(String),
}

impl TelegramError {
    /// Whether this error means the account must be logged in again.
    #[must_use]
    pub const fn is_session_invalid(&self) -> bool {
        matches!(self, Self::SessionInvalid(_))
    }
}

impl From<InvocationError> for TelegramError {
    fn from(err: InvocationError) -> Self {
        let err_str = err.to_string();

        if INVALID_SESSION_ERRORS.iter().any(|name| err_str.contains(name)) {
            return Self::SessionInvalid(err_str);
        }

        Self::Invocation(err_str)
    }
}

/// A bot resolved to the input types web-view requests need.
#[derive(Debug, Clone)]
pub struct ResolvedBot {
    pub username: String,
    pub peer: tl::enums::InputPeer,
    pub user: tl::enums::InputUser,
}

/// High-level Telegram client wrapper.
pub struct TelegramBot {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramBot {
    /// Connects to Telegram, routing through `proxy` when given.
    ///
    /// Only the session file is touched here; authorization is checked
    /// separately with [`TelegramBot::is_authorized`].
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be opened.
    pub async fn connect(
        config: &TelegramConfig,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Self, TelegramError> {
        match proxy {
            Some(proxy) => info!("Connecting to Telegram via proxy {}...", proxy),
            None => info!("Connecting to Telegram..."),
        }

        let session = Arc::new(
            SqliteSession::open(&config.session_path)
                .await
                .map_err(|e| TelegramError::Session(e.to_string()))?,
        );

        let params = sender::ConnectionParams {
            proxy_url: proxy.map(ProxyConfig::to_url),
            ..Default::default()
        };

        let SenderPool {
            runner,
            updates: _updates,
            handle,
        } = SenderPool::with_configuration(Arc::clone(&session), config.api_id, params);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        debug!("Sender pool started");

        Ok(Self {
            client,
            handle: handle.thin,
            _pool_task: pool_task,
        })
    }

    /// Checks if the client is authorized.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError::SessionInvalid`] for a revoked or
    /// unregistered auth key, or a connection error otherwise.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client.is_authorized().await.map_err(|e| {
            let err: TelegramError = e.into();
            match err {
                TelegramError::SessionInvalid(_) => err,
                other => TelegramError::Connection(other.to_string()),
            }
        })
    }

    /// Requests a login code to be sent to the phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn request_login_code(
        &self,
        phone: &str,
        api_hash: &str,
    ) -> Result<LoginToken, TelegramError> {
        info!("Requesting login code for phone: {}...", mask_phone(phone));

        self.client
            .request_login_code(phone, api_hash)
            .await
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))
    }

    /// Signs in with the login code.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError::PasswordRequired`] when 2FA is enabled.
    pub async fn sign_in(&self, token: &LoginToken, code: &str) -> Result<(), TelegramError> {
        info!("Signing in with login code...");

        match self.client.sign_in(token, code).await {
            Ok(_user) => {
                info!("Successfully signed in!");
                Ok(())
            }
            Err(SignInError::PasswordRequired(password_token)) => {
                debug!("2FA password required, hint: {:?}", password_token.hint());
                Err(TelegramError::PasswordRequired(password_token))
            }
            Err(SignInError::InvalidCode) => {
                Err(TelegramError::SignInFailed("Invalid code".to_owned()))
            }
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Checks the 2FA password.
    ///
    /// # Errors
    ///
    /// Returns an error if the password is invalid.
    pub async fn check_password(
        &self,
        password_token: PasswordToken,
        password: &str,
    ) -> Result<(), TelegramError> {
        info!("Checking 2FA password...");

        match self.client.check_password(password_token, password).await {
            Ok(_user) => {
                info!("Successfully authenticated with 2FA!");
                Ok(())
            }
            Err(SignInError::InvalidPassword(token)) => Err(TelegramError::InvalidPassword(token)),
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Resolves a bot username into input peer/user references.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError::BotNotFound`] if the username does not
    /// belong to a user with a known access hash.
    pub async fn resolve_bot(&self, username: &str) -> Result<ResolvedBot, TelegramError> {
        debug!("Resolving @{}...", username);

        let request = tl::functions::contacts::ResolveUsername {
            username: username.to_owned(),
            referer: None,
        };

        let tl::enums::contacts::ResolvedPeer::Peer(resolved) =
            self.client.invoke(&request).await?;

        let tl::enums::Peer::User(peer) = resolved.peer else {
            return Err(TelegramError::BotNotFound(username.to_owned()));
        };

        let access_hash = resolved
            .users
            .iter()
            .find_map(|user| match user {
                tl::enums::User::User(u) if u.id == peer.user_id => u.access_hash,
                _ => None,
            })
            .ok_or_else(|| TelegramError::BotNotFound(username.to_owned()))?;

        Ok(ResolvedBot {
            username: username.to_owned(),
            peer: tl::enums::InputPeer::User(tl::types::InputPeerUser {
                user_id: peer.user_id,
                access_hash,
            }),
            user: tl::enums::InputUser::User(tl::types::InputUser {
                user_id: peer.user_id,
                access_hash,
            }),
        })
    }

    /// Opens the bot's menu web view and returns the redirect URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected.
    pub async fn request_web_view(
        &self,
        bot: &ResolvedBot,
        url: &str,
        platform: &str,
    ) -> Result<String, TelegramError> {
        debug!("Requesting web view from @{}...", bot.username);

        let request = tl::functions::messages::RequestWebView {
            from_bot_menu: true,
            silent: false,
            compact: false,
            fullscreen: false,
            peer: bot.peer.clone(),
            bot: bot.user.clone(),
            url: Some(url.to_owned()),
            start_param: None,
            theme_params: None,
            platform: platform.to_owned(),
            reply_to: None,
            send_as: None,
        };

        let tl::enums::WebViewResult::Url(result) = self.client.invoke(&request).await?;
        Ok(result.url)
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        info!("Disconnecting from Telegram...");
        self.handle.quit();
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot").finish_non_exhaustive()
    }
}

/// Masks a phone number for logging (shows last 4 digits).
fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() > 4 {
        format!("***{}", &digits[digits.len() - 4..])
    } else {
        "****".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+1234567890"), "***7890");
        assert_eq!(mask_phone("123"), "****");
        assert_eq!(mask_phone("+7 (999) 123-45-67"), "***4567");
    }

    #[test]
    fn test_session_invalid_classification() {
        assert!(TelegramError::SessionInvalid("AUTH_KEY_UNREGISTERED".to_owned())
            .is_session_invalid());
        assert!(!TelegramError::Connection("reset".to_owned()).is_session_invalid());
        assert!(!TelegramError::Invocation("FLOOD_WAIT_5".to_owned()).is_session_invalid());
    }

    #[tokio::test]
    async fn test_connect_fails_before_starting_pool() {
        let mut config = TelegramConfig::new(1, "hash".to_owned());
        config.session_path = "/nonexistent-dir/miner.session".into();

        let err = TelegramBot::connect(&config, None).await.unwrap_err();
        assert!(matches!(err, TelegramError::Session(_)));
    }
}
