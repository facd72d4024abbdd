//! Extraction of mini-app init-data from a web-view redirect URL.
//!
//! Telegram answers a web-view request with a URL whose fragment carries a
//! percent-encoded `tgWebAppData=` payload. The game backend only accepts
//! the signed subset of that payload, re-assembled in a fixed order.

use std::fmt;

use thiserror::Error;

/// Marker preceding the encoded payload in the redirect URL.
const WEB_APP_DATA_MARKER: &str = "tgWebAppData=";

/// Fields forwarded to the backend, in output order.
const SIGNED_FIELDS: [&str; 4] = ["query_id", "user", "auth_date", "hash"];

/// Errors raised while parsing a redirect URL.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InitDataError {
    #[error("Redirect URL has no tgWebAppData payload")]
    MissingPayload,

    #[error("Payload is not valid percent-encoding: {0}")]
    Malformed(String),

    #[error("Payload is missing the \"{0}\" field")]
    MissingField(&'static str),
}

/// Signed init-data string sent with every game request.
///
/// This is the whole session: it lives in memory for one run and is
/// never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct InitData(String);

impl InitData {
    /// Wraps an already assembled init-data string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Parses init-data out of a web-view redirect URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL has no `tgWebAppData` payload or the
    /// payload lacks one of the signed fields.
    pub fn from_redirect_url(auth_url: &str) -> Result<Self, InitDataError> {
        let (_, rest) = auth_url
            .split_once(WEB_APP_DATA_MARKER)
            .ok_or(InitDataError::MissingPayload)?;

        // The payload is fully encoded, so the first raw '&' ends it.
        let encoded = rest.split('&').next().unwrap_or_default();
        if encoded.is_empty() {
            return Err(InitDataError::MissingPayload);
        }

        let payload = decode(encoded)?;

        let mut fields: Vec<(&str, String)> = Vec::with_capacity(SIGNED_FIELDS.len());
        for pair in payload.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let Some(name) = SIGNED_FIELDS.iter().find(|f| **f == key) else {
                continue;
            };
            let value = decode(value)?;
            fields.push((*name, value));
        }

        if !fields.iter().any(|(name, _)| *name == "hash") {
            return Err(InitDataError::MissingField("hash"));
        }

        let assembled = SIGNED_FIELDS
            .iter()
            .filter_map(|name| fields.iter().find(|(field, _)| field == name))
            .map(|(name, value)| {
                if *name == "user" {
                    format!("{name}={}", quote_user(value))
                } else {
                    format!("{name}={value}")
                }
            })
            .collect::<Vec<_>>()
            .join("&");

        Ok(Self(assembled))
    }

    /// Returns the raw header value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn decode(s: &str) -> Result<String, InitDataError> {
    urlencoding::decode(s)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| InitDataError::Malformed(e.to_string()))
}

/// Percent-encodes the user JSON, leaving `/` as-is like the mini-app does.
fn quote_user(value: &str) -> String {
    urlencoding::encode(value).replace("%2F", "/")
}

impl fmt::Debug for InitData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The hash authenticates the account, keep it out of logs.
        f.debug_tuple("InitData")
            .field(&format_args!("{} bytes", self.0.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_signed_fields_in_order() {
        let url = "https://zavod.mdaowallet.com/#tgWebAppData=query_id%3D123%26user%3D%257B%2522id%2522%253A42%252C%2522first_name%2522%253A%2522Ann%2522%257D%26auth_date%3D456%26hash%3Dabc%26tgWebAppVersion=6.0";

        let data = InitData::from_redirect_url(url).unwrap();
        assert_eq!(
            data.as_str(),
            "query_id=123&user=%7B%22id%22%3A42%2C%22first_name%22%3A%22Ann%22%7D&auth_date=456&hash=abc"
        );
    }

    #[test]
    fn test_drops_extra_fields_and_trailing_params() {
        let url = "https://x/#tgWebAppData=query_id%3D1%26chat_type%3Dsender%26auth_date%3D2%26hash%3Dh&tgWebAppVersion=7.0&tgWebAppPlatform=android";

        let data = InitData::from_redirect_url(url).unwrap();
        assert_eq!(data.as_str(), "query_id=1&auth_date=2&hash=h");
        assert!(!data.as_str().ends_with('&'));
    }

    #[test]
    fn test_reorders_fields() {
        let url = "https://x/#tgWebAppData=hash%3Dh%26auth_date%3D2%26query_id%3D1";

        let data = InitData::from_redirect_url(url).unwrap();
        assert_eq!(data.as_str(), "query_id=1&auth_date=2&hash=h");
    }

    #[test]
    fn test_user_keeps_slashes() {
        let url = "https://x/#tgWebAppData=user%3D%257B%2522photo_url%2522%253A%2522https%253A%255C%252F%255C%252Ft.me%2522%257D%26hash%3Dh";

        let data = InitData::from_redirect_url(url).unwrap();
        assert!(data.as_str().starts_with("user=%7B%22photo_url%22"));
        assert!(!data.as_str().contains("%2F"));
    }

    #[test]
    fn test_missing_marker() {
        assert_eq!(
            InitData::from_redirect_url("https://x/#tgWebAppVersion=6.0"),
            Err(InitDataError::MissingPayload)
        );
    }

    #[test]
    fn test_missing_hash() {
        assert_eq!(
            InitData::from_redirect_url("https://x/#tgWebAppData=query_id%3D1"),
            Err(InitDataError::MissingField("hash"))
        );
    }

    #[test]
    fn test_debug_does_not_leak() {
        let data = InitData::new("query_id=1&hash=secret");
        assert!(!format!("{data:?}").contains("secret"));
    }
}
