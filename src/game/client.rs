//! HTTP client for the game backend.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use super::{ClaimInfo, FarmInfo, LevelPrice, ProfileInfo};
use crate::config::ProxyConfig;
use crate::telegram::InitData;

/// Header carrying the exchanged init-data.
pub const INIT_DATA_HEADER: &str = "Telegram-Init-Data";

/// Default service echoing the caller's public address.
pub const PROXY_CHECK_URL: &str = "https://httpbin.org/ip";

const PROXY_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

const MINI_APP_ORIGIN: &str = "https://zavod.mdaowallet.com";

const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 13; SM-S908B Build/TP1A.220624.014; wv) \
    AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/124.0.6367.82 Mobile Safari/537.36";

/// Errors from a single game request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },

    #[error("Invalid response from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Whether the backend rejected the init-data itself.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Status { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}

/// Game backend endpoints. Paths are fixed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Profile,
    Farm,
    ToolkitSettings,
    WorkbenchSettings,
    Claim,
    UpgradeWorkbench,
    UpgradeToolkit,
}

impl Endpoint {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Profile => "/user/profile",
            Self::Farm => "/user/farm",
            Self::ToolkitSettings => "/farm/toolkitSettings",
            Self::WorkbenchSettings => "/farm/workbenchSettings",
            Self::Claim => "/user/claim",
            Self::UpgradeWorkbench => "/user/upgradeWorkbench",
            Self::UpgradeToolkit => "/user/upgradeToolkit",
        }
    }

    fn method(self) -> Method {
        match self {
            Self::Profile | Self::Farm | Self::ToolkitSettings | Self::WorkbenchSettings => {
                Method::GET
            }
            Self::Claim | Self::UpgradeWorkbench | Self::UpgradeToolkit => Method::POST,
        }
    }
}

/// Stateless client for the game REST API.
///
/// The session is passed to every call rather than stored in the client.
#[derive(Debug, Clone)]
pub struct GameApi {
    http: reqwest::Client,
    base_url: String,
    proxy_check_url: String,
}

impl GameApi {
    /// Builds a client for `base_url`, optionally routed through `proxy`.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy URL is rejected or the TLS backend
    /// cannot be initialized.
    pub fn new(base_url: &str, proxy: Option<&ProxyConfig>) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder()
            .default_headers(default_headers())
            .user_agent(USER_AGENT);

        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.to_url())?);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            proxy_check_url: PROXY_CHECK_URL.to_owned(),
        })
    }

    /// Sets the IP echo service used by [`GameApi::check_proxy`].
    #[must_use]
    pub fn with_proxy_check_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_check_url = url.into();
        self
    }

    /// Fetches the account profile (token balance).
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-2xx status, or a body
    /// without `tokens`.
    pub async fn profile(&self, session: &InitData) -> Result<ProfileInfo, ApiError> {
        self.call(session, Endpoint::Profile).await
    }

    /// Fetches claim timing and current levels.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-2xx status, or an
    /// unparsable body.
    pub async fn farm(&self, session: &InitData) -> Result<FarmInfo, ApiError> {
        self.call(session, Endpoint::Farm).await
    }

    /// Fetches the toolkit (storage) price table.
    pub async fn toolkit_settings(&self, session: &InitData) -> Result<Vec<LevelPrice>, ApiError> {
        self.call(session, Endpoint::ToolkitSettings).await
    }

    /// Fetches the workbench (speed) price table.
    pub async fn workbench_settings(
        &self,
        session: &InitData,
    ) -> Result<Vec<LevelPrice>, ApiError> {
        self.call(session, Endpoint::WorkbenchSettings).await
    }

    /// Collects the accrued tokens.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or a non-2xx status, e.g. when
    /// the cooldown has not elapsed yet.
    pub async fn claim(&self, session: &InitData) -> Result<ClaimInfo, ApiError> {
        self.call(session, Endpoint::Claim).await
    }

    /// Buys the next workbench (speed) level.
    pub async fn upgrade_workbench(&self, session: &InitData) -> Result<FarmInfo, ApiError> {
        self.call(session, Endpoint::UpgradeWorkbench).await
    }

    /// Buys the next toolkit (storage) level.
    pub async fn upgrade_toolkit(&self, session: &InitData) -> Result<FarmInfo, ApiError> {
        self.call(session, Endpoint::UpgradeToolkit).await
    }

    /// Returns the public IP seen through the configured proxy.
    ///
    /// # Errors
    ///
    /// Returns an error if the echo service is unreachable within 5 seconds
    /// or answers with a non-2xx status.
    pub async fn check_proxy(&self) -> Result<String, ApiError> {
        let response = self
            .http
            .get(&self.proxy_check_url)
            .timeout(PROXY_CHECK_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = response.json().await?;
        Ok(body
            .get("origin")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown")
            .to_owned())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        session: &InitData,
        endpoint: Endpoint,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let method = endpoint.method();
        debug!("{} {}", method, endpoint.path());

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(INIT_DATA_HEADER, session.as_str());
        if method == Method::POST {
            request = request.json(&serde_json::json!({}));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.path(),
                status,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| ApiError::Decode {
            endpoint: endpoint.path(),
            source,
        })
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(header::ORIGIN, HeaderValue::from_static(MINI_APP_ORIGIN));
    headers.insert(
        header::REFERER,
        HeaderValue::from_static("https://zavod.mdaowallet.com/"),
    );
    headers.insert(
        "X-Requested-With",
        HeaderValue::from_static("org.telegram.messenger"),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_methods() {
        assert_eq!(Endpoint::Profile.method(), Method::GET);
        assert_eq!(Endpoint::WorkbenchSettings.method(), Method::GET);
        assert_eq!(Endpoint::Claim.method(), Method::POST);
        assert_eq!(Endpoint::UpgradeToolkit.method(), Method::POST);
    }

    #[test]
    fn test_unauthorized_statuses() {
        let err = ApiError::Status {
            endpoint: Endpoint::Farm.path(),
            status: StatusCode::UNAUTHORIZED,
        };
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "/user/farm returned HTTP 401 Unauthorized");

        let err = ApiError::Status {
            endpoint: Endpoint::Farm.path(),
            status: StatusCode::BAD_GATEWAY,
        };
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let api = GameApi::new("http://localhost:1234/", None).unwrap();
        assert_eq!(api.base_url, "http://localhost:1234");
    }
}
