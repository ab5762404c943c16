//! Configuration.
//!
//! [`PayKitConfig`] carries everything that varies between integrations:
//! the client id, which API environment to talk to, and timing knobs. It can
//! be built in code or loaded from `PAYKIT_*` environment variables.

use paykit_runtime::RetryPolicy;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// API environment requests are routed to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Endpoint {
    /// Live environment
    #[default]
    Production,
    /// Sandbox for integration testing
    Sandbox,
    /// Internal staging environment
    Staging,
    /// Any other base URL, e.g. a local mock server
    Custom(Url),
}

impl Endpoint {
    /// Base URL all API paths are resolved against
    ///
    /// # Errors
    ///
    /// Returns a parse error only if a built-in base URL were malformed.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        match self {
            Self::Production => Url::parse("https://api.cash.app/"),
            Self::Sandbox => Url::parse("https://sandbox.api.cash.app/"),
            Self::Staging => Url::parse("https://api.cashstaging.app/"),
            Self::Custom(url) => Ok(url.clone()),
        }
    }

    /// Environment name reported in analytics
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Sandbox => "sandbox",
            Self::Staging => "staging",
            Self::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(url) => write!(f, "{url}"),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for Endpoint {
    type Err = ConfigError;

    /// Accepts `production`, `sandbox`, `staging` (any case) or an absolute URL
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "sandbox" => Ok(Self::Sandbox),
            "staging" => Ok(Self::Staging),
            _ => Url::parse(value)
                .map(Self::Custom)
                .map_err(|_| ConfigError::InvalidEndpoint(value.to_string())),
        }
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    /// The endpoint is neither a known environment nor a URL
    #[error("invalid endpoint {0:?}: expected production, sandbox, staging, or a URL")]
    InvalidEndpoint(String),

    /// A numeric variable did not parse
    #[error("invalid value {value:?} for {var}: expected a positive integer")]
    InvalidNumber {
        /// Variable name
        var: &'static str,
        /// Offending value
        value: String,
    },
}

/// Client configuration
///
/// # Default Values
///
/// - endpoint: production
/// - `poll_interval`: 1 second
/// - `request_timeout`: 5 seconds
/// - `max_attempts`: 5
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayKitConfig {
    /// Client id issued by the payment provider
    pub client_id: String,
    /// API environment
    pub endpoint: Endpoint,
    /// Time between status polls while waiting for the customer
    pub poll_interval: Duration,
    /// Per-attempt HTTP timeout
    pub request_timeout: Duration,
    /// Attempts per request, including the first one
    pub max_attempts: u32,
}

impl PayKitConfig {
    /// Variable holding the client id (required)
    pub const CLIENT_ID_VAR: &'static str = "PAYKIT_CLIENT_ID";
    /// Variable holding the endpoint
    pub const ENDPOINT_VAR: &'static str = "PAYKIT_ENDPOINT";
    /// Variable holding the poll interval in milliseconds
    pub const POLL_INTERVAL_VAR: &'static str = "PAYKIT_POLL_INTERVAL_MS";
    /// Variable holding the request timeout in milliseconds
    pub const REQUEST_TIMEOUT_VAR: &'static str = "PAYKIT_REQUEST_TIMEOUT_MS";

    /// Configuration for `client_id` against production with default timings
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            endpoint: Endpoint::Production,
            poll_interval: Duration::from_secs(1),
            request_timeout: Duration::from_secs(5),
            max_attempts: 5,
        }
    }

    /// Set the endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the number of attempts per request
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Default retry policy for API requests
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.max_attempts)
    }

    /// Load from the process environment
    ///
    /// # Errors
    ///
    /// See [`PayKitConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup
    ///
    /// Unset optional variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] without a client id, and
    /// [`ConfigError::InvalidEndpoint`] / [`ConfigError::InvalidNumber`] for
    /// malformed values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_id = lookup(Self::CLIENT_ID_VAR)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingVar(Self::CLIENT_ID_VAR))?;

        let mut config = Self::new(client_id);

        if let Some(endpoint) = lookup(Self::ENDPOINT_VAR) {
            config.endpoint = endpoint.parse()?;
        }
        if let Some(millis) = lookup(Self::POLL_INTERVAL_VAR) {
            config.poll_interval = parse_millis(Self::POLL_INTERVAL_VAR, &millis)?;
        }
        if let Some(millis) = lookup(Self::REQUEST_TIMEOUT_VAR) {
            config.request_timeout = parse_millis(Self::REQUEST_TIMEOUT_VAR, &millis)?;
        }

        tracing::debug!(endpoint = %config.endpoint, "Loaded configuration");
        Ok(config)
    }
}

fn parse_millis(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
        .ok_or_else(|| ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        })
}
