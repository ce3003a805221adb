//! Client configuration from environment variables.

use std::time::Duration;

use livetable_shared::{InsertPolicy, ReducerConfig, RemoveMatch};
use url::Url;

use crate::error::ConfigError;

pub const ENV_WS_URL: &str = "LIVETABLE_WS_URL";
pub const ENV_API_URL: &str = "LIVETABLE_API_URL";
pub const ENV_RECONNECT_DELAY_MS: &str = "LIVETABLE_RECONNECT_DELAY_MS";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "LIVETABLE_CONNECT_TIMEOUT_MS";
pub const ENV_TOKEN: &str = "LIVETABLE_TOKEN";
pub const ENV_IDENTITY: &str = "LIVETABLE_IDENTITY";
pub const ENV_INSERT_POLICY: &str = "LIVETABLE_INSERT_POLICY";
pub const ENV_REMOVE_MATCH: &str = "LIVETABLE_REMOVE_MATCH";

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CREDENTIAL_PARAM: &str = "token";

/// Settings for the streaming transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Endpoint to connect to (`ws://` or `wss://`).
    pub url: String,
    /// Fixed delay before every reconnection attempt.
    pub reconnect_delay: Duration,
    /// How long a single attempt may take to open.
    pub connect_timeout: Duration,
    /// Query parameter that carries the credential, when one is configured.
    pub credential_param: String,
    /// Extra query parameters added to the endpoint.
    pub query: Vec<(String, String)>,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            credential_param: DEFAULT_CREDENTIAL_PARAM.to_string(),
            query: Vec::new(),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_credential_param(mut self, param: impl Into<String>) -> Self {
        self.credential_param = param.into();
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Parse the endpoint, rejecting anything that is not a WebSocket URL.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.url).map_err(|e| ConfigError::Url {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "ws" | "wss" => Ok(self.with_query(url)),
            other => Err(ConfigError::Url {
                url: self.url.clone(),
                reason: format!("unsupported scheme {other}"),
            }),
        }
    }

    fn with_query(&self, mut url: Url) -> Url {
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        url
    }

    /// Read the transport settings from the environment.
    ///
    /// - `LIVETABLE_WS_URL` (required)
    /// - `LIVETABLE_RECONNECT_DELAY_MS` (default 3000)
    /// - `LIVETABLE_CONNECT_TIMEOUT_MS` (default 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup(ENV_WS_URL).ok_or(ConfigError::Missing(ENV_WS_URL))?;
        let mut config = Self::new(url);
        if let Some(ms) = lookup(ENV_RECONNECT_DELAY_MS) {
            config.reconnect_delay = parse_millis(ENV_RECONNECT_DELAY_MS, &ms)?;
        }
        if let Some(ms) = lookup(ENV_CONNECT_TIMEOUT_MS) {
            config.connect_timeout = parse_millis(ENV_CONNECT_TIMEOUT_MS, &ms)?;
        }
        config.endpoint()?;
        Ok(config)
    }
}

/// Settings for seeding and folding a sync session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Base URL of the snapshot API, if any.
    pub api_url: Option<String>,
    /// Identity the snapshot is fetched for.
    pub identity: String,
    pub reducer: ReducerConfig,
}

impl SessionConfig {
    /// Read the session settings from the environment.
    ///
    /// - `LIVETABLE_API_URL` (optional; without it the session starts empty)
    /// - `LIVETABLE_IDENTITY` (default empty)
    /// - `LIVETABLE_INSERT_POLICY`: `append` | `upsert` (default `append`)
    /// - `LIVETABLE_REMOVE_MATCH`: `keys` | `project-user` (default `keys`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let insert = match lookup(ENV_INSERT_POLICY) {
            None => InsertPolicy::default(),
            Some(value) => value.parse::<InsertPolicy>().map_err(|_| ConfigError::Invalid {
                name: ENV_INSERT_POLICY,
                value,
            })?,
        };
        let remove = match lookup(ENV_REMOVE_MATCH) {
            None => RemoveMatch::default(),
            Some(value) => value.parse::<RemoveMatch>().map_err(|_| ConfigError::Invalid {
                name: ENV_REMOVE_MATCH,
                value,
            })?,
        };

        Ok(Self {
            api_url: lookup(ENV_API_URL).filter(|url| !url.trim().is_empty()),
            identity: lookup(ENV_IDENTITY).unwrap_or_default(),
            reducer: ReducerConfig { insert, remove },
        })
    }
}

fn parse_millis(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
}
