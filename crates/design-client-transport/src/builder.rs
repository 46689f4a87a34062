//! Design client builder.

use std::time::Duration;

use design_client_core::{ChannelError, EndpointRegistry, OperationExecutor};
use design_client_session::DesignClient;
use reqwest::Url;
use thiserror::Error;

use crate::{DesignClientOptions, HttpChannel};

/// Builder error.
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("Invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("No design server configured")]
    MissingServer,
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Builds a [`DesignClient`] talking to a design server over HTTP.
#[derive(Debug, Default, Clone)]
pub struct DesignClientBuilder {
    options: DesignClientOptions,
    endpoints: Option<EndpointRegistry>,
}

impl DesignClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_options(options: DesignClientOptions) -> Self {
        Self {
            options,
            endpoints: None,
        }
    }

    /// Set the design server address.
    ///
    /// # Errors
    /// `InvalidUrl` unless `url` is an absolute http(s) address.
    pub fn with_design_server(mut self, url: &str) -> Result<Self, BuilderError> {
        parse_server(url)?;
        self.options.server = Some(url.to_string());
        Ok(self)
    }

    #[must_use]
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.api_prefix = prefix.into();
        self
    }

    #[must_use]
    pub const fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.options.retry_interval = retry_interval;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = timeout;
        self
    }

    /// Replace the endpoint table derived from the API prefix.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: EndpointRegistry) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    #[must_use]
    pub const fn options(&self) -> &DesignClientOptions {
        &self.options
    }

    /// Build the HTTP channel alone.
    ///
    /// # Errors
    /// `MissingServer` or `InvalidUrl` for a bad server address, or a
    /// channel error if the HTTP client cannot be created.
    pub fn build_channel(&self) -> Result<HttpChannel, BuilderError> {
        let server = self
            .options
            .server
            .as_deref()
            .ok_or(BuilderError::MissingServer)?;
        let endpoints = self
            .endpoints
            .clone()
            .unwrap_or_else(|| EndpointRegistry::design_protocol(&self.options.api_prefix));
        Ok(HttpChannel::new(
            parse_server(server)?,
            endpoints,
            self.options.request_timeout,
        )?)
    }

    /// Build a client that runs operations with `executor`.
    ///
    /// # Errors
    /// See [`build_channel`](Self::build_channel).
    pub fn build<E>(self, executor: E) -> Result<DesignClient<HttpChannel, E>, BuilderError>
    where
        E: OperationExecutor + 'static,
    {
        let channel = self.build_channel()?;
        tracing::debug!(server = %channel.base_url(), "Design client configured");
        Ok(DesignClient::new(channel, executor).with_retry_interval(self.options.retry_interval))
    }
}

fn parse_server(url: &str) -> Result<Url, BuilderError> {
    let invalid = |reason: String| BuilderError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use design_client_core::{DesignOperation, OperationResult};
    use tokio_util::sync::CancellationToken;

    use super::*;

    struct NoopExecutor;

    #[async_trait]
    impl OperationExecutor for NoopExecutor {
        async fn execute(
            &self,
            operation: &DesignOperation,
            _cancel: &CancellationToken,
        ) -> OperationResult {
            OperationResult::success(operation.id, Default::default())
        }
    }

    #[test]
    fn rejects_invalid_servers() {
        for url in ["not a url", "/relative/path", "ftp://files.example.com/"] {
            let err = DesignClientBuilder::new().with_design_server(url).unwrap_err();
            assert!(matches!(err, BuilderError::InvalidUrl { .. }), "{url}");
        }
    }

    #[test]
    fn server_is_required() {
        assert!(matches!(
            DesignClientBuilder::new().build_channel(),
            Err(BuilderError::MissingServer)
        ));
    }

    #[test]
    fn api_prefix_shapes_the_endpoint_table() {
        let channel = DesignClientBuilder::new()
            .with_design_server("http://localhost:5000/")
            .unwrap()
            .with_api_prefix("/design/v1")
            .build_channel()
            .unwrap();

        let settings = channel
            .endpoints()
            .read_endpoint::<design_client_core::SessionSettings>()
            .unwrap();
        assert_eq!(settings.path, "/design/v1/settings");
        assert_eq!(channel.base_url().as_str(), "http://localhost:5000/");
    }

    #[tokio::test]
    async fn builds_an_idle_client() {
        let client = DesignClientBuilder::new()
            .with_design_server("https://design.example.com")
            .unwrap()
            .with_retry_interval(Duration::from_millis(250))
            .build(NoopExecutor)
            .unwrap();

        assert!(!client.finished());
        assert!(client.error().is_none());
        assert_eq!(client.retry_interval(), Duration::from_millis(250));
    }
}
