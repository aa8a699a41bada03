//! Server configuration, read from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_LITELLM_ENDPOINT: &str = "http://localhost:4141";
pub const DEFAULT_DATABASE_PATH: &str = "data/chat2anyllm.db";
pub const DEFAULT_JWT_SECRET: &str = "chat2anyllm-default-secret-key-change-in-production";
pub const DEFAULT_JWT_EXPIRES_IN: &str = "24h";
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:5173"];

/// Which browser origins may call the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorsPolicy {
    /// Any origin, credentials disabled.
    AllowAll,
    /// Lowercased origins plus their hostnames for port-agnostic matching.
    Allowlist {
        origins: Vec<String>,
        hostnames: Vec<String>,
    },
}

impl CorsPolicy {
    pub fn allowlist<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let origins: Vec<String> = origins
            .into_iter()
            .map(|o| o.as_ref().trim().to_lowercase())
            .filter(|o| !o.is_empty())
            .collect();
        if origins.iter().any(|o| o == "*") {
            return Self::AllowAll;
        }
        let hostnames = origins.iter().map(|o| configured_hostname(o)).collect();
        Self::Allowlist { origins, hostnames }
    }

    /// Exact origin match first, then the same hostname on any port.
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            Self::AllowAll => true,
            Self::Allowlist { origins, hostnames } => {
                let origin = origin.to_lowercase();
                if origins.iter().any(|o| *o == origin) {
                    return true;
                }
                match parse_hostname(&origin) {
                    Some(host) => hostnames.iter().any(|h| *h == host),
                    None => false,
                }
            }
        }
    }

    pub fn allows_credentials(&self) -> bool {
        !matches!(self, Self::AllowAll)
    }
}

/// `http://Host:3000/path` -> `host`.
fn parse_hostname(origin: &str) -> Option<String> {
    Url::parse(origin)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
}

/// Hostname of a configured origin. Entries that are not URLs fall back to
/// stripping the scheme and port by hand.
fn configured_hostname(origin: &str) -> String {
    parse_hostname(origin).unwrap_or_else(|| {
        let rest = origin.split_once("://").map_or(origin, |(_, r)| r);
        rest.split(':').next().unwrap_or(rest).to_lowercase()
    })
}

/// Top-level chat2anyllm configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server port.
    pub port: u16,
    /// Base URL of the LiteLLM aggregator, without trailing slash.
    pub litellm_endpoint: String,
    /// Key sent to the aggregator; may be empty.
    pub litellm_api_key: String,
    /// SQLite database file. `None` disables persistence.
    pub database_path: Option<PathBuf>,
    /// HMAC secret used to sign bearer tokens.
    pub jwt_secret: String,
    /// Bearer token lifetime.
    pub jwt_expires_in: Duration,
    pub cors: CorsPolicy,
}

impl ServerConfig {
    /// Create configuration from process environment (and `.env` when present).
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenv::dotenv() {
            if !e.not_found() {
                warn!("Failed to load .env file: {}", e);
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(p) => p
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid PORT: {}", p)))?,
            None => DEFAULT_PORT,
        };

        let litellm_endpoint = lookup("LITELLM_ENDPOINT")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LITELLM_ENDPOINT.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();

        let litellm_api_key = lookup("LITELLM_API_KEY").unwrap_or_default();

        let database_path = match lookup("DATABASE_PATH") {
            Some(p) if p.trim().is_empty() => None,
            Some(p) => Some(PathBuf::from(p.trim())),
            None => Some(PathBuf::from(DEFAULT_DATABASE_PATH)),
        };

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string());

        let expires_raw =
            lookup("JWT_EXPIRES_IN").unwrap_or_else(|| DEFAULT_JWT_EXPIRES_IN.to_string());
        let jwt_expires_in = parse_duration(&expires_raw)?;

        let allow_all = lookup("CORS_ALLOW_ALL")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let cors = if allow_all {
            CorsPolicy::AllowAll
        } else {
            match lookup("ALLOWED_ORIGINS") {
                Some(list) => CorsPolicy::allowlist(list.split(',')),
                None => CorsPolicy::allowlist(DEFAULT_ALLOWED_ORIGINS.iter()),
            }
        };

        Ok(Self {
            port,
            litellm_endpoint,
            litellm_api_key,
            database_path,
            jwt_secret,
            jwt_expires_in,
            cors,
        })
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

/// Parse `"3600"`, `"90s"`, `"30m"`, `"24h"` or `"7d"`.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let invalid = || Error::Config(format!("invalid duration: {:?}", raw));
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    let multiplier = match unit.trim() {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(invalid()),
    };
    if value == 0 {
        return Err(invalid());
    }
    // Token expiry is stored as a signed unix timestamp.
    let secs = value
        .checked_mul(multiplier)
        .filter(|secs| i64::try_from(*secs).is_ok())
        .ok_or_else(invalid)?;
    Ok(Duration::from_secs(secs))
}
