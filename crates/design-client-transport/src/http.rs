//! `CommunicationChannel` over HTTP + JSON.

use std::{any::TypeId, time::Duration};

use async_trait::async_trait;
use design_client_core::{ChannelError, CommunicationChannel, Endpoint, EndpointRegistry, Verb};
use reqwest::{
    Client, Method, RequestBuilder, Response, Url,
    header::{ACCEPT, HeaderMap, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

fn transport(err: impl std::error::Error + Send + Sync + 'static) -> ChannelError {
    ChannelError::Transport(Box::new(err))
}

const fn method(verb: Verb) -> Method {
    match verb {
        Verb::Read => Method::GET,
        Verb::Create => Method::POST,
        Verb::Update => Method::PUT,
    }
}

/// Talks to the design server over HTTP.
///
/// Endpoint paths resolve against the base address the way relative links
/// do, so a leading `/` is rooted at the host.
#[derive(Debug, Clone)]
pub struct HttpChannel {
    http: Client,
    base_url: Url,
    endpoints: EndpointRegistry,
}

impl HttpChannel {
    /// Create a channel with a JSON `Accept` header and a per-request timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: Url,
        endpoints: EndpointRegistry,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(transport)?;
        Ok(Self {
            http,
            base_url,
            endpoints,
        })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub const fn endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    fn request(&self, endpoint: &Endpoint) -> Result<RequestBuilder, ChannelError> {
        let url = self.base_url.join(&endpoint.path).map_err(transport)?;
        tracing::debug!(method = %method(endpoint.verb), %url, "Design server request");
        Ok(self.http.request(method(endpoint.verb), url))
    }

    async fn send(
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Response, ChannelError> {
        if cancel.is_cancelled() {
            return Err(ChannelError::Cancelled);
        }
        tokio::select! {
            () = cancel.cancelled() => Err(ChannelError::Cancelled),
            response = request.send() => response.map_err(transport),
        }
    }

    async fn body(response: Response, cancel: &CancellationToken) -> Result<Vec<u8>, ChannelError> {
        tokio::select! {
            () = cancel.cancelled() => Err(ChannelError::Cancelled),
            body = response.bytes() => body.map(|b| b.to_vec()).map_err(transport),
        }
    }

    async fn ensure_success(
        response: Response,
        cancel: &CancellationToken,
    ) -> Result<Response, ChannelError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = match Self::body(response, cancel).await {
            Ok(body) => body,
            Err(ChannelError::Cancelled) => return Err(ChannelError::Cancelled),
            Err(e) => {
                tracing::debug!(%status, "Could not read error body: {e}");
                Vec::new()
            }
        };
        Err(ChannelError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    async fn write<T>(
        &self,
        endpoint: &Endpoint,
        value: &T,
        cancel: &CancellationToken,
    ) -> Result<Response, ChannelError>
    where
        T: Serialize + Sync,
    {
        let request = self.request(endpoint)?.json(value);
        Self::send(request, cancel).await
    }
}

#[async_trait]
impl CommunicationChannel for HttpChannel {
    async fn fetch<T>(&self, cancel: &CancellationToken) -> Result<Option<T>, ChannelError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let endpoint = self.endpoints.read_endpoint::<T>()?;
        let response = Self::send(self.request(endpoint)?, cancel).await?;
        let response = Self::ensure_success(response, cancel).await?;
        let body = Self::body(response, cancel).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(serde_json::from_slice::<Option<T>>(&body)?)
    }

    async fn submit<T>(&self, value: &T, cancel: &CancellationToken) -> Result<(), ChannelError>
    where
        T: Serialize + Sync + 'static,
    {
        let endpoint = self.endpoints.write_endpoint::<T>()?;
        let response = self.write(endpoint, value, cancel).await?;
        Self::ensure_success(response, cancel).await?;
        Ok(())
    }

    async fn submit_for<T, R>(&self, value: &T, cancel: &CancellationToken) -> Result<R, ChannelError>
    where
        T: Serialize + Sync + 'static,
        R: DeserializeOwned + Send + 'static,
    {
        let endpoint = self.endpoints.write_endpoint_for::<T, R>()?;
        let response = self.write(endpoint, value, cancel).await?;

        if TypeId::of::<R>() == TypeId::of::<bool>() {
            let ok = response.status().is_success();
            return Ok(serde_json::from_value(Value::Bool(ok))?);
        }

        let response = Self::ensure_success(response, cancel).await?;
        let body = Self::body(response, cancel).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
