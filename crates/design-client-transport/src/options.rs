//! Client options.

use std::time::Duration;

use design_client_core::DEFAULT_API_PREFIX;
use design_client_session::pump::DEFAULT_RETRY_INTERVAL;
use serde::{Deserialize, Serialize};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection and polling settings of a design client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DesignClientOptions {
    /// Base address of the design server.
    pub server: Option<String>,
    /// Route prefix shared by all endpoints.
    pub api_prefix: String,
    /// Delay between empty polls of a stay-alive session.
    #[serde(rename = "retryTimeoutMs", with = "millis")]
    pub retry_interval: Duration,
    #[serde(rename = "requestTimeoutMs", with = "millis")]
    pub request_timeout: Duration,
}

impl Default for DesignClientOptions {
    fn default() -> Self {
        Self {
            server: None,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
