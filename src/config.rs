//! Runtime configuration shared by the api gateway and the socket client

use std::time::Duration;

use serde::Deserialize;
use snafu::prelude::*;

use crate::ws::ReconnectConfig;

/// Env var holding api base url
pub const ENV_API_BASE_URL: &str = "AURAFLUX_NEXUS_URL";
/// Env var holding notification websocket url
pub const ENV_WS_URL: &str = "AURAFLUX_WS_URL";
/// Env var overriding token refresh path
pub const ENV_REFRESH_PATH: &str = "AURAFLUX_REFRESH_PATH";
/// Env var holding max reconnect attempts
pub const ENV_WS_MAX_RECONNECT_ATTEMPTS: &str = "WS_MAX_RECONNECT_ATTEMPTS";
/// Env var holding initial reconnect backoff in milliseconds
pub const ENV_WS_INITIAL_BACKOFF_TIME_MS: &str = "WS_INITIAL_BACKOFF_TIME_MS";
/// Env var holding max reconnect backoff in milliseconds
pub const ENV_WS_MAX_BACKOFF_TIME_MS: &str = "WS_MAX_BACKOFF_TIME_MS";

const DEFAULT_REFRESH_PATH: &str = "/users/token/refresh/";
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1000;
const DEFAULT_MAX_BACKOFF_MS: u64 = 30000;

/// Invalid or missing configuration value
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum Error {
    /// required env var not set
    #[snafu(display("env var {name} is not set"))]
    MissingVar {
        /// var name
        name: String,
    },

    /// env var is not an unsigned number
    #[snafu(display("env var {name} has invalid number {value:?}: {source}"))]
    InvalidNumber {
        /// var name
        name: String,
        /// received value
        value: String,
        /// source error
        source: std::num::ParseIntError,
    },

    /// the str is not a valid url
    #[snafu(display("{url} is an invalid url: {source}"))]
    InvalidURL {
        /// the url
        url: String,
        /// source error
        source: url::ParseError,
    },

    /// url schema not allowed for this endpoint
    #[snafu(display("the url {url} has invalid schema {schema}, only {expected} is ok"))]
    InvalidSchema {
        /// the url
        url: String,
        /// invalid schema
        schema: String,
        /// accepted schemas
        expected: &'static str,
    },

    /// the parsed url has no host
    #[snafu(display("the url {url} has no host"))]
    NoHost {
        /// the url
        url: String,
    },

    /// initial backoff is larger than max backoff
    #[snafu(display("initial backoff {initial_ms}ms exceeds max backoff {max_ms}ms"))]
    BackoffRange {
        /// initial backoff
        initial_ms: u64,
        /// max backoff
        max_ms: u64,
    },
}

/// Config result type
pub type Result<T> = std::result::Result<T, Error>;

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    DEFAULT_MAX_RECONNECT_ATTEMPTS
}

fn default_initial_backoff_ms() -> u64 {
    DEFAULT_INITIAL_BACKOFF_MS
}

fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// base url of the backend api, request paths are appended to it
    pub api_base_url: String,
    /// notification websocket url
    pub ws_url: String,
    /// path of the access token refresh endpoint
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// reconnect attempts before the socket client gives up
    #[serde(default = "default_max_reconnect_attempts")]
    pub ws_max_reconnect_attempts: u32,
    /// delay before the first reconnect attempt
    #[serde(default = "default_initial_backoff_ms")]
    pub ws_initial_backoff_ms: u64,
    /// upper bound of any reconnect delay
    #[serde(default = "default_max_backoff_ms")]
    pub ws_max_backoff_ms: u64,
}

impl Config {
    /// config with given urls and default tuning
    pub fn new<A: Into<String>, W: Into<String>>(api_base_url: A, ws_url: W) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ws_url: ws_url.into(),
            refresh_path: default_refresh_path(),
            ws_max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            ws_initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            ws_max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }

    /// Load config from process env vars, see the `ENV_*` constants for names.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| error::MissingVar { name })
        };

        let mut config = Self::new(required(ENV_API_BASE_URL)?, required(ENV_WS_URL)?);

        if let Some(path) = lookup(ENV_REFRESH_PATH) {
            config.refresh_path = path;
        }
        if let Some(v) = lookup(ENV_WS_MAX_RECONNECT_ATTEMPTS) {
            config.ws_max_reconnect_attempts = parse_number(ENV_WS_MAX_RECONNECT_ATTEMPTS, v)?;
        }
        if let Some(v) = lookup(ENV_WS_INITIAL_BACKOFF_TIME_MS) {
            config.ws_initial_backoff_ms = parse_number(ENV_WS_INITIAL_BACKOFF_TIME_MS, v)?;
        }
        if let Some(v) = lookup(ENV_WS_MAX_BACKOFF_TIME_MS) {
            config.ws_max_backoff_ms = parse_number(ENV_WS_MAX_BACKOFF_TIME_MS, v)?;
        }

        config.validate()?;

        log::debug!("Loaded config from env: {:?}", config);

        Ok(config)
    }

    /// check urls and backoff range
    pub fn validate(&self) -> Result<()> {
        check_url(&self.api_base_url, &["http", "https"], "http or https")?;
        check_url(&self.ws_url, &["ws", "wss"], "ws or wss")?;

        ensure!(
            self.ws_initial_backoff_ms <= self.ws_max_backoff_ms,
            error::BackoffRange {
                initial_ms: self.ws_initial_backoff_ms,
                max_ms: self.ws_max_backoff_ms,
            }
        );

        Ok(())
    }

    /// reconnect tuning for the socket client
    pub fn reconnect(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_backoff: Duration::from_millis(self.ws_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.ws_max_backoff_ms),
            max_attempts: self.ws_max_reconnect_attempts,
        }
    }
}

fn parse_number<N>(name: &str, value: String) -> Result<N>
where
    N: std::str::FromStr<Err = std::num::ParseIntError>,
{
    value
        .trim()
        .parse()
        .with_context(|_| error::InvalidNumber { name, value })
}

fn check_url(s: &str, schemas: &[&str], expected: &'static str) -> Result<()> {
    let url = url::Url::parse(s).with_context(|_| error::InvalidURL { url: s })?;

    ensure!(
        schemas.contains(&url.scheme()),
        error::InvalidSchema {
            url: s,
            schema: url.scheme(),
            expected,
        }
    );

    ensure!(url.host().is_some(), error::NoHost { url: s });

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn loads_env_with_defaults() {
        let config = Config::from_lookup(env(&[
            (ENV_API_BASE_URL, "https://nexus.auraflux.io/api"),
            (ENV_WS_URL, "wss://nexus.auraflux.io/ws/notifications/"),
        ]))
        .unwrap();

        assert_eq!(config.refresh_path, "/users/token/refresh/");
        assert_eq!(config.ws_max_reconnect_attempts, 5);

        let reconnect = config.reconnect();
        assert_eq!(reconnect.initial_backoff, Duration::from_secs(1));
        assert_eq!(reconnect.max_backoff, Duration::from_secs(30));
    }

    #[test]
    fn env_overrides_tuning() {
        let config = Config::from_lookup(env(&[
            (ENV_API_BASE_URL, "http://localhost:8000"),
            (ENV_WS_URL, "ws://localhost:8000/ws/"),
            (ENV_WS_MAX_RECONNECT_ATTEMPTS, "10"),
            (ENV_WS_INITIAL_BACKOFF_TIME_MS, " 250 "),
            (ENV_WS_MAX_BACKOFF_TIME_MS, "8000"),
        ]))
        .unwrap();

        assert_eq!(config.ws_max_reconnect_attempts, 10);
        assert_eq!(config.ws_initial_backoff_ms, 250);
        assert_eq!(config.ws_max_backoff_ms, 8000);
    }

    #[test]
    fn missing_ws_url() {
        let err = Config::from_lookup(env(&[(ENV_API_BASE_URL, "http://localhost")])).unwrap_err();
        assert!(matches!(err, Error::MissingVar { ref name } if name == ENV_WS_URL));
    }

    #[test]
    fn invalid_number() {
        let err = Config::from_lookup(env(&[
            (ENV_API_BASE_URL, "http://localhost"),
            (ENV_WS_URL, "ws://localhost"),
            (ENV_WS_MAX_BACKOFF_TIME_MS, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidNumber { .. }));
    }

    #[test]
    fn rejects_wrong_schema() {
        let err = Config::new("http://localhost", "http://localhost/ws")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { ref schema, .. } if schema == "http"));

        let err = Config::new("ftp://localhost", "ws://localhost")
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }

    #[test]
    fn rejects_inverted_backoff() {
        let mut config = Config::new("http://localhost", "ws://localhost");
        config.ws_initial_backoff_ms = 60_000;
        assert!(matches!(
            config.validate().unwrap_err(),
            Error::BackoffRange { .. }
        ));
    }

    #[test]
    fn deserialize_json() {
        let config: Config = serde_json::from_str(
            r#"{"api_base_url": "http://localhost", "ws_url": "ws://localhost", "ws_max_reconnect_attempts": 3}"#,
        )
        .unwrap();

        assert_eq!(config.ws_max_reconnect_attempts, 3);
        assert_eq!(config.ws_max_backoff_ms, 30000);
        config.validate().unwrap();
    }
}
