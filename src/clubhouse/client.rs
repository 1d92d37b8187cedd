use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::errors::ClubhouseError;
use super::types::{Epic, EpicId, EpicWorkflow, StateId};
use crate::config::ClubhouseConfig;

/// Resources the handler reads and writes under `/api/v2/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    EpicWorkflow,
    Epics,
    Epic(EpicId),
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::EpicWorkflow => f.write_str("epic-workflow"),
            ResourceKey::Epics => f.write_str("epics"),
            ResourceKey::Epic(id) => write!(f, "epics/{id}"),
        }
    }
}

/// Raw access to Clubhouse resources.
///
/// Implementations do no retries and no caching: every call is one request.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Authenticated read of a resource.
    async fn fetch(&self, key: &ResourceKey) -> Result<Value, ClubhouseError>;

    /// Authenticated partial write of a resource.
    async fn update(&self, key: &ResourceKey, payload: Value) -> Result<Value, ClubhouseError>;
}

/// Deserialize a fetched resource into its typed form.
pub fn decode<T: DeserializeOwned>(key: &ResourceKey, value: Value) -> Result<T, ClubhouseError> {
    serde_json::from_value(value).map_err(|source| ClubhouseError::Parse {
        resource: key.to_string(),
        source,
    })
}

pub async fn fetch_epic_workflow<C>(client: &C) -> Result<EpicWorkflow, ClubhouseError>
where
    C: ResourceClient + ?Sized,
{
    let key = ResourceKey::EpicWorkflow;
    decode(&key, client.fetch(&key).await?)
}

pub async fn fetch_epics<C>(client: &C) -> Result<Vec<Epic>, ClubhouseError>
where
    C: ResourceClient + ?Sized,
{
    let key = ResourceKey::Epics;
    decode(&key, client.fetch(&key).await?)
}

pub async fn fetch_epic<C>(client: &C, epic_id: EpicId) -> Result<Epic, ClubhouseError>
where
    C: ResourceClient + ?Sized,
{
    let key = ResourceKey::Epic(epic_id);
    decode(&key, client.fetch(&key).await?)
}

pub async fn set_epic_state<C>(
    client: &C,
    epic_id: EpicId,
    state_id: StateId,
) -> Result<Value, ClubhouseError>
where
    C: ResourceClient + ?Sized,
{
    client
        .update(&ResourceKey::Epic(epic_id), json!({ "epic_state_id": state_id }))
        .await
}

/// reqwest-backed client for the Clubhouse v2 REST API, throttled client-side.
pub struct ClubhouseClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl ClubhouseClient {
    pub fn new(settings: &ClubhouseConfig, token: String) -> Result<Self, reqwest::Error> {
        let per_minute = NonZeroU32::new(settings.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        let mut builder = reqwest::Client::builder();
        if settings.request_timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(settings.request_timeout_seconds));
        }

        Ok(Self {
            http: builder.build()?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token,
            rate_limiter,
        })
    }

    fn url(&self, key: &ResourceKey) -> String {
        format!("{}/api/v2/{}", self.base_url, key)
    }

    async fn send(&self, key: &ResourceKey, request: RequestBuilder) -> Result<Value, ClubhouseError> {
        self.rate_limiter.until_ready().await;

        // The token travels in the query string, so keep URLs out of errors.
        let transport = |source: reqwest::Error| ClubhouseError::Transport {
            resource: key.to_string(),
            source: source.without_url(),
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        debug!(resource = %key, status = status.as_u16(), "Clubhouse responded");

        if !status.is_success() {
            return Err(ClubhouseError::UnexpectedStatus {
                resource: key.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| ClubhouseError::Parse {
            resource: key.to_string(),
            source,
        })
    }
}

impl fmt::Debug for ClubhouseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClubhouseClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ResourceClient for ClubhouseClient {
    async fn fetch(&self, key: &ResourceKey) -> Result<Value, ClubhouseError> {
        debug!(resource = %key, "GET");
        let request = self
            .http
            .get(self.url(key))
            .query(&[("token", self.token.as_str())])
            .header(CONTENT_TYPE, "application/json");
        self.send(key, request).await
    }

    async fn update(&self, key: &ResourceKey, payload: Value) -> Result<Value, ClubhouseError> {
        debug!(resource = %key, "PUT");
        let body = payload.to_string();
        let request = self
            .http
            .put(self.url(key))
            .query(&[("token", self.token.as_str())])
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, body.len())
            .body(body);
        self.send(key, request).await
    }
}
