//! OAuth credential handling for the Gmail client.
//!
//! The initial authorization is managed outside this tool: the user runs
//! Google's consent flow once and drops the resulting authorized-user
//! file next to the OAuth client file. This module only loads those two
//! files and refreshes the access token in place when it has expired.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GmailError;

const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the recorded expiry, to absorb clock skew.
const EXPIRY_SKEW_SECS: i64 = 60;

/// OAuth client file (Desktop app), as downloaded from the Cloud Console.
#[derive(Debug, Deserialize)]
struct ClientSecrets {
    #[serde(default)]
    installed: Option<ClientSecret>,
    #[serde(default)]
    web: Option<ClientSecret>,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    client_id: String,
    client_secret: SecretString,
}

/// Stored authorized-user token, in the layout Google's tooling writes.
///
/// Unknown fields are carried through `extra` so a rewrite after refresh
/// does not drop anything the authorization step put there.
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl StoredToken {
    fn expiry_utc(&self) -> Option<DateTime<Utc>> {
        self.expiry.as_deref().and_then(parse_expiry)
    }

    /// Whether the access token needs a refresh before use. A token
    /// without a recorded expiry is treated as expired.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry_utc() {
            Some(expiry) => expiry <= now + ChronoDuration::seconds(EXPIRY_SKEW_SECS),
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Loads the OAuth files and keeps the access token fresh.
pub struct Authenticator {
    credentials_path: PathBuf,
    token_path: PathBuf,
    client: reqwest::Client,
}

impl Authenticator {
    pub fn new(
        credentials_path: PathBuf,
        token_path: PathBuf,
        client: reqwest::Client,
    ) -> Self {
        Self {
            credentials_path,
            token_path,
            client,
        }
    }

    /// A valid access token, refreshed and persisted first if the stored
    /// one has expired.
    pub async fn access_token(&self) -> Result<String, GmailError> {
        let mut token = load_token(&self.token_path)?;

        if !token.is_expired(Utc::now()) {
            debug!("Stored access token still valid");
            return Ok(token.token.clone());
        }

        let secret = load_client_secret(&self.credentials_path)?;
        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or_else(|| GmailError::TokenRefresh {
                reason: "stored token has no refresh_token".into(),
            })?;

        info!("Access token expired, refreshing");
        let params = [
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.expose_secret()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = self
            .client
            .post(TOKEN_URI)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let reason = match response.json::<RefreshErrorResponse>().await {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{} ({})", err.error, desc),
                    None => err.error,
                },
                Err(_) => "unrecognized error response from the token endpoint".into(),
            };
            return Err(GmailError::TokenRefresh { reason });
        }

        let refreshed: RefreshResponse =
            response
                .json()
                .await
                .map_err(|e| GmailError::TokenRefresh {
                    reason: format!("could not parse token response: {e}"),
                })?;

        token.token = refreshed.access_token;
        let lifetime = refreshed.expires_in.unwrap_or(3600);
        token.expiry = Some((Utc::now() + ChronoDuration::seconds(lifetime as i64)).to_rfc3339());
        if let Some(new_refresh) = refreshed.refresh_token {
            token.refresh_token = Some(new_refresh);
        }

        persist_token(&self.token_path, &token)?;
        Ok(token.token)
    }
}

fn load_client_secret(path: &Path) -> Result<ClientSecret, GmailError> {
    if !path.exists() {
        return Err(GmailError::MissingCredentials {
            path: path.to_path_buf(),
        });
    }
    let raw = std::fs::read_to_string(path).map_err(|e| GmailError::InvalidCredentials {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let secrets: ClientSecrets =
        serde_json::from_str(&raw).map_err(|e| GmailError::InvalidCredentials {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    secrets
        .installed
        .or(secrets.web)
        .ok_or_else(|| GmailError::InvalidCredentials {
            path: path.to_path_buf(),
            reason: "expected an \"installed\" or \"web\" client section".into(),
        })
}

fn load_token(path: &Path) -> Result<StoredToken, GmailError> {
    if !path.exists() {
        return Err(GmailError::MissingToken {
            path: path.to_path_buf(),
        });
    }
    let raw = std::fs::read_to_string(path).map_err(|e| GmailError::InvalidCredentials {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| GmailError::InvalidCredentials {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn persist_token(path: &Path, token: &StoredToken) -> Result<(), GmailError> {
    let raw = serde_json::to_string_pretty(token).map_err(|e| GmailError::TokenRefresh {
        reason: format!("could not serialize refreshed token: {e}"),
    })?;
    std::fs::write(path, raw).map_err(|e| GmailError::TokenRefresh {
        reason: format!("could not persist refreshed token: {e}"),
    })?;
    debug!(path = %path.display(), "Refreshed token persisted");
    Ok(())
}

/// Parse the expiry formats Google's tooling writes: RFC 3339, or a
/// naive UTC timestamp without an offset.
fn parse_expiry(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .ok()
        })
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn token_json(expiry: Option<&str>) -> String {
        let expiry_field = expiry
            .map(|e| format!("\"expiry\": \"{e}\","))
            .unwrap_or_default();
        format!(
            r#"{{
                "token": "ya29.stored",
                "refresh_token": "1//refresh",
                {expiry_field}
                "client_id": "abc.apps.googleusercontent.com",
                "scopes": ["https://www.googleapis.com/auth/gmail.send"]
            }}"#
        )
    }

    #[test]
    fn missing_token_file_is_a_distinct_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_token(&tmp.path().join("token.json")).unwrap_err();
        assert!(matches!(err, GmailError::MissingToken { .. }));
    }

    #[test]
    fn missing_credentials_file_is_a_distinct_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load_client_secret(&tmp.path().join("credentials.json")).unwrap_err();
        assert!(matches!(err, GmailError::MissingCredentials { .. }));
    }

    #[test]
    fn malformed_credentials_file_reports_reason() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("credentials.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_client_secret(&path).unwrap_err();
        assert!(matches!(err, GmailError::InvalidCredentials { .. }));
    }

    #[test]
    fn credentials_need_installed_or_web_section() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("credentials.json");
        std::fs::write(&path, r#"{"other": {}}"#).unwrap();
        let err = load_client_secret(&path).unwrap_err();
        assert!(matches!(err, GmailError::InvalidCredentials { .. }));

        std::fs::write(
            &path,
            r#"{"installed": {"client_id": "id", "client_secret": "s"}}"#,
        )
        .unwrap();
        let secret = load_client_secret(&path).unwrap();
        assert_eq!(secret.client_id, "id");
    }

    #[test]
    fn token_round_trips_unknown_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("token.json");
        std::fs::write(&path, token_json(Some("2024-01-01T10:00:00Z"))).unwrap();

        let mut token = load_token(&path).unwrap();
        token.token = "ya29.new".into();
        persist_token(&path, &token).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["token"], "ya29.new");
        // Fields this tool does not model survive the rewrite.
        assert_eq!(value["client_id"], "abc.apps.googleusercontent.com");
        assert!(value["scopes"].is_array());
    }

    #[test]
    fn expired_token_is_detected() {
        let token: StoredToken =
            serde_json::from_str(&token_json(Some("2024-01-01T10:00:00Z"))).unwrap();
        let before = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();
        assert!(!token.is_expired(before));
        assert!(token.is_expired(after));
    }

    #[test]
    fn expiry_inside_skew_window_counts_as_expired() {
        let token: StoredToken =
            serde_json::from_str(&token_json(Some("2024-01-01T10:00:00Z"))).unwrap();
        let thirty_secs_before = Utc.with_ymd_and_hms(2024, 1, 1, 9, 59, 30).unwrap();
        assert!(token.is_expired(thirty_secs_before));
    }

    #[test]
    fn token_without_expiry_counts_as_expired() {
        let token: StoredToken = serde_json::from_str(&token_json(None)).unwrap();
        assert!(token.is_expired(Utc::now()));
    }

    #[test]
    fn parses_both_expiry_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_expiry("2024-01-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_expiry("2024-01-01T10:00:00"), Some(expected));
        assert_eq!(
            parse_expiry("2024-01-01T10:00:00.000123"),
            Some(expected + ChronoDuration::microseconds(123))
        );
        assert_eq!(parse_expiry("yesterday"), None);
    }
}
