use std::future::Future;
use std::time::Duration;

use reqwest::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT,
};
use reqwest::{Client, Method, Proxy};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::debug;

use super::error::GatewayError;
use super::retry::{RetryDecision, RetryPolicy, TransportFailure};
use super::types::{
    JsonObject, LinkNodeRequest, NodeRequest, RefreshRequest, RewardEstimate, TokenPair,
};
use crate::config::GlobalSettings;
use crate::sequencer::LogSender;

/// The rewards API operations an account worker needs.
pub trait RewardsApi: Send + Sync + 'static {
    fn link_node(
        &self,
        node_id: &str,
        access_token: &str,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn start_reward(
        &self,
        node_id: &str,
        access_token: &str,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn claim_reward(
        &self,
        node_id: &str,
        access_token: &str,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn estimate_reward(
        &self,
        node_id: &str,
        access_token: &str,
    ) -> impl Future<Output = Result<f64, GatewayError>> + Send;

    fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<TokenPair, GatewayError>> + Send;
}

/// HTTP client for the rewards API.
///
/// Holds an immutable set of base headers; every call builds its own header
/// map from those plus the caller's overlay.
pub struct Gateway {
    client: Client,
    base_url: String,
    base_headers: HeaderMap,
    retry: RetryPolicy,
    log: Option<LogSender>,
}

impl Gateway {
    /// Build a gateway from the global settings. Fails on an unusable proxy
    /// URL or user agent.
    pub fn new(settings: &GlobalSettings, log: Option<LogSender>) -> Result<Self, GatewayError> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .pool_max_idle_per_host(100)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .danger_accept_invalid_certs(settings.accept_invalid_certs);

        if let Some(proxy_url) = settings.proxy() {
            let proxy = Proxy::all(proxy_url).map_err(|source| GatewayError::InvalidProxy {
                url: proxy_url.to_string(),
                source,
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(GatewayError::ClientBuild)?;

        let mut base_headers = HeaderMap::new();
        base_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let agent = HeaderValue::from_str(&settings.user_agent).map_err(|source| {
            GatewayError::InvalidHeader {
                name: "user-agent",
                source,
            }
        })?;
        base_headers.insert(USER_AGENT, agent);

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            base_headers,
            retry: RetryPolicy::default(),
            log,
        })
    }

    /// Replace the retry policy.
    #[allow(dead_code)]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send `payload` as JSON to `path` and decode the response object.
    ///
    /// Timeouts are retried according to the retry policy; every other
    /// transport failure is returned at once. A body that is not a JSON object
    /// is a [`GatewayError::Decode`] whatever the status; otherwise a status
    /// >= 400 is a [`GatewayError::Api`].
    pub async fn call<P: Serialize + ?Sized>(
        &self,
        path: &str,
        method: Method,
        payload: &P,
        headers: &HeaderMap,
    ) -> Result<JsonObject, GatewayError> {
        let url = format!("{}/{}", self.base_url, path);
        let body = serde_json::to_vec(payload).map_err(GatewayError::Encode)?;

        let mut request_headers = self.base_headers.clone();
        for (name, value) in headers {
            request_headers.insert(name.clone(), value.clone());
        }
        request_headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

        let mut attempt = 1;
        let response = loop {
            debug!(%method, %url, attempt, "sending request");
            let sent = self
                .client
                .request(method.clone(), &url)
                .headers(request_headers.clone())
                .body(body.clone())
                .send()
                .await;

            match sent {
                Ok(response) => break response,
                Err(err) => match self.retry.decide(attempt, TransportFailure::classify(&err)) {
                    RetryDecision::Retry { delay } => {
                        self.note(format!(
                            "request to {path} timed out (attempt {attempt}/{}), retrying",
                            self.retry.max_attempts
                        ))
                        .await;
                        sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::GiveUp if err.is_timeout() => {
                        return Err(GatewayError::Timeout { attempts: attempt });
                    }
                    RetryDecision::GiveUp => return Err(GatewayError::Transport(err)),
                },
            }
        };

        let status = response.status();
        let bytes = response.bytes().await.map_err(GatewayError::Transport)?;
        let object: JsonObject = serde_json::from_slice(&bytes).map_err(GatewayError::Decode)?;

        if status.as_u16() >= 400 {
            return Err(GatewayError::Api {
                status: status.as_u16(),
            });
        }
        Ok(object)
    }

    async fn post_authenticated<P: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &P,
        access_token: &str,
    ) -> Result<JsonObject, GatewayError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|source| GatewayError::InvalidHeader {
                name: "authorization",
                source,
            })?;
        headers.insert(AUTHORIZATION, bearer);
        self.call(path, Method::POST, payload, &headers).await
    }

    async fn note(&self, line: String) {
        match &self.log {
            Some(log) => log.send(line).await,
            None => tracing::warn!("{line}"),
        }
    }
}

/// Narrow a decoded response into a typed struct.
fn extract<T: DeserializeOwned>(object: JsonObject, what: &str) -> Result<T, GatewayError> {
    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| GatewayError::UnexpectedResponse(format!("{what}: {e}")))
}

impl RewardsApi for Gateway {
    async fn link_node(&self, node_id: &str, access_token: &str) -> Result<(), GatewayError> {
        let payload = LinkNodeRequest::browser_extension(node_id);
        self.post_authenticated("nodes/link", &payload, access_token)
            .await
            .map(|_| ())
    }

    async fn start_reward(&self, node_id: &str, access_token: &str) -> Result<(), GatewayError> {
        let payload = NodeRequest { unique_id: node_id };
        self.post_authenticated("rewards/start", &payload, access_token)
            .await
            .map(|_| ())
    }

    async fn claim_reward(&self, node_id: &str, access_token: &str) -> Result<(), GatewayError> {
        let payload = NodeRequest { unique_id: node_id };
        self.post_authenticated("rewards/claim", &payload, access_token)
            .await
            .map(|_| ())
    }

    async fn estimate_reward(&self, node_id: &str, access_token: &str) -> Result<f64, GatewayError> {
        let payload = NodeRequest { unique_id: node_id };
        let object = self
            .post_authenticated("rewards/estimate", &payload, access_token)
            .await?;
        let estimate: RewardEstimate = extract(object, "estimate response")?;
        Ok(estimate.value)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, GatewayError> {
        let payload = RefreshRequest { refresh_token };
        let object = self
            .call("auth/refresh-token", Method::POST, &payload, &HeaderMap::new())
            .await?;
        extract(object, "refresh response")
    }
}
