//! Transport configuration and its normalisation.
//!
//! ```ron
//! #![enable(implicit_some)]
//! (
//!     region: "eu-west-1",
//!     rate_limit: 14.0,
//!     max_connections: 4,
//!     source: "bounces@example.com",
//! )
//! ```
//!
//! The legacy option spellings (`rateLimit`, `maxConnections`, `accessKeyId`,
//! `AWSAccessKeyID`, `ServiceUrl`, ...) are accepted as aliases.

use std::{
    num::NonZeroUsize,
    sync::LazyLock,
    time::Duration,
};

use regex::{Regex, RegexBuilder};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::ConfigError;

/// Region used when neither `region` nor a recognisable `service_url` is set.
pub const DEFAULT_REGION: &str = "us-east-1";

#[allow(clippy::expect_used, reason = "The pattern is a constant")]
static SERVICE_URL_REGION: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"(.*)email(.*)\.(.*).amazonaws.com")
        .case_insensitive(true)
        .build()
        .expect("service url pattern compiles")
});

const fn default_timeout() -> u64 {
    30
}

const fn default_connect_timeout() -> u64 {
    10
}

/// Options for the HTTP connection to the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HttpOptions {
    /// Total time allowed for one submission request
    ///
    /// Default: 30 seconds
    #[serde(default = "default_timeout", alias = "timeout")]
    pub timeout_secs: u64,

    /// Time allowed to establish the connection
    ///
    /// Default: 10 seconds
    #[serde(default = "default_connect_timeout", alias = "connectTimeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Options recognised by [`SesTransport`](crate::SesTransport).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransportConfig {
    /// Region to submit through; overrides anything derived from `service_url`
    #[serde(default)]
    pub region: Option<String>,

    /// Explicit endpoint, e.g. `https://email.eu-west-1.amazonaws.com`
    #[serde(default, alias = "ServiceUrl", alias = "serviceUrl")]
    pub service_url: Option<String>,

    /// Maximum sends per second; `0` disables pacing
    #[serde(default, alias = "rateLimit")]
    pub rate_limit: Option<f64>,

    /// Maximum number of submissions awaiting the remote API at once
    #[serde(default, alias = "maxConnections")]
    pub max_connections: Option<NonZeroUsize>,

    #[serde(default, alias = "accessKeyId", alias = "AWSAccessKeyID")]
    pub access_key_id: Option<String>,

    #[serde(
        default,
        alias = "secretAccessKey",
        alias = "AWSSecretKey",
        deserialize_with = "secret"
    )]
    pub secret_access_key: Option<SecretString>,

    #[serde(
        default,
        alias = "sessionToken",
        alias = "AWSSecurityToken",
        deserialize_with = "secret"
    )]
    pub session_token: Option<SecretString>,

    /// Sender passed to the remote call, overriding the message's own
    #[serde(default)]
    pub source: Option<String>,

    #[serde(default, alias = "httpOptions")]
    pub http: HttpOptions,
}

fn secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// The settings a transport actually runs with, after defaults and derivation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub region: String,
    /// Explicit endpoint; the SDK resolves the regional one when unset
    pub endpoint: Option<Url>,
    pub source: Option<String>,
    pub policy: ThrottlePolicy,
    pub http: HttpOptions,
}

/// Static credentials used to sign requests to the remote API.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
}

impl TransportConfig {
    /// Resolve defaults and derived values.
    ///
    /// # Errors
    ///
    /// If the rate limit is negative, not finite or too small, or the endpoint
    /// is not a valid URL.
    pub fn normalize(&self) -> Result<Settings, ConfigError> {
        let endpoint = self
            .service_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|err| ConfigError::InvalidConfiguration {
                field: "service_url",
                reason: err.to_string(),
            })?;

        Ok(Settings {
            region: self.region(),
            endpoint,
            source: self.source.clone(),
            policy: ThrottlePolicy::new(self.rate_limit, self.max_connections)?,
            http: self.http,
        })
    }

    /// The configured region, else the one embedded in `service_url`, else [`DEFAULT_REGION`].
    #[must_use]
    pub fn region(&self) -> String {
        self.region
            .clone()
            .filter(|region| !region.is_empty())
            .or_else(|| self.service_url.as_deref().and_then(region_from_service_url))
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// Explicit credentials, if configured. Without them the default AWS
    /// provider chain (environment, profile, instance metadata) applies.
    ///
    /// # Errors
    ///
    /// If only one of the access key id and secret is set.
    pub fn credentials(&self) -> Result<Option<Credentials>, ConfigError> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Ok(Some(Credentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: self.session_token.clone(),
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::InvalidConfiguration {
                field: "secret_access_key",
                reason: "required alongside access_key_id".to_string(),
            }),
            (None, Some(_)) => Err(ConfigError::InvalidConfiguration {
                field: "access_key_id",
                reason: "required alongside secret_access_key".to_string(),
            }),
        }
    }
}

fn region_from_service_url(url: &str) -> Option<String> {
    SERVICE_URL_REGION
        .captures(url)
        .and_then(|captures| captures.get(3))
        .map(|region| region.as_str().to_string())
        .filter(|region| !region.is_empty())
}

/// Longest accepted spacing between sends; slower rates are rejected.
pub const MAX_SEND_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// When sends may start.
///
/// Throttling is active when either limit is present; with neither, sends go
/// straight to the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThrottlePolicy {
    rate_limit: Option<f64>,
    min_interval: Option<Duration>,
    max_concurrent: Option<NonZeroUsize>,
}

impl ThrottlePolicy {
    /// # Errors
    ///
    /// If `rate_limit` is negative, NaN or infinite, or so small that the
    /// spacing between sends exceeds [`MAX_SEND_INTERVAL`]. A rate of zero
    /// means unlimited.
    pub fn new(
        rate_limit: Option<f64>,
        max_concurrent: Option<NonZeroUsize>,
    ) -> Result<Self, ConfigError> {
        let rate_limit = match rate_limit {
            Some(rate) if !rate.is_finite() || rate < 0.0 => {
                return Err(ConfigError::InvalidConfiguration {
                    field: "rate_limit",
                    reason: format!("{rate} is not a finite, non-negative number"),
                });
            }
            Some(rate) if rate <= 0.0 => None,
            other => other,
        };

        let min_interval = rate_limit.map(send_interval).transpose()?;

        Ok(Self {
            rate_limit,
            min_interval,
            max_concurrent,
        })
    }

    /// No pacing and no concurrency cap.
    #[must_use]
    pub const fn unthrottled() -> Self {
        Self {
            rate_limit: None,
            min_interval: None,
            max_concurrent: None,
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.rate_limit.is_some() || self.max_concurrent.is_some()
    }

    #[must_use]
    pub const fn rate_limit(&self) -> Option<f64> {
        self.rate_limit
    }

    #[must_use]
    pub const fn max_concurrent(&self) -> Option<NonZeroUsize> {
        self.max_concurrent
    }

    /// Minimum spacing between the starts of two consecutive sends.
    #[must_use]
    pub const fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }
}

fn send_interval(rate: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(rate.recip())
        .ok()
        .filter(|interval| *interval <= MAX_SEND_INTERVAL)
        .ok_or_else(|| ConfigError::InvalidConfiguration {
            field: "rate_limit",
            reason: format!("{rate} sends per second is below one send per year"),
        })
}
