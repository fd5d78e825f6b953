use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{kind}: {reason}")]
    Response {
        status: u16,
        kind: String,
        reason: String,
    },
    #[error("cluster request failed: {0}")]
    Transport(String),
}

impl ClusterError {
    pub fn is_index_not_found(&self) -> bool {
        matches!(self, Self::Response { kind, .. } if kind == "index_not_found_exception")
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }
}

/// Sequence-number guard sent with conditional policy writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteCondition {
    pub seq_no: i64,
    pub primary_term: i64,
}

/// The slice of the search-engine REST API the policy routes need.
#[async_trait]
pub trait SearchCluster: Send + Sync {
    async fn search(&self, index: &str, body: Value) -> Result<Value, ClusterError>;
    async fn get_policy(&self, policy_id: &str) -> Result<Value, ClusterError>;
    async fn put_policy(
        &self,
        policy_id: &str,
        condition: Option<WriteCondition>,
        body: Value,
    ) -> Result<Value, ClusterError>;
    async fn delete_policy(&self, policy_id: &str) -> Result<Value, ClusterError>;
}

#[derive(Debug, Clone)]
pub struct ClusterCredentials {
    pub username: String,
    pub password: String,
}

pub struct HttpCluster {
    http: Client,
    base_url: Url,
    credentials: Option<ClusterCredentials>,
}

impl HttpCluster {
    pub fn new(
        base_url: &str,
        credentials: Option<ClusterCredentials>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid cluster url '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("cluster url '{base_url}' cannot carry a path");
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build cluster http client")?;
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.credentials {
            Some(creds) => builder.basic_auth(&creds.username, Some(&creds.password)),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value, ClusterError> {
        let response = builder
            .send()
            .await
            .map_err(|err| ClusterError::Transport(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ClusterError::Transport(err.to_string()))?;
        if status.is_success() {
            return serde_json::from_str(&text).map_err(|err| {
                ClusterError::Transport(format!("cluster returned invalid json: {err}"))
            });
        }
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        let err = response_error(status, &body);
        warn!(status = status.as_u16(), error = %err, "cluster rejected request");
        Err(err)
    }

    fn policy_url(&self, policy_id: &str) -> Url {
        self.endpoint(&["_opendistro", "_ism", "policies", policy_id])
    }
}

fn response_error(status: StatusCode, body: &Value) -> ClusterError {
    let kind = body
        .pointer("/error/type")
        .and_then(Value::as_str)
        .or_else(|| body.get("result").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("http_{}", status.as_u16()));
    let reason = body
        .pointer("/error/reason")
        .and_then(Value::as_str)
        .or_else(|| body.get("error").and_then(Value::as_str))
        .or_else(|| body.as_str().filter(|text| !text.trim().is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    ClusterError::Response {
        status: status.as_u16(),
        kind,
        reason,
    }
}

#[async_trait]
impl SearchCluster for HttpCluster {
    async fn search(&self, index: &str, body: Value) -> Result<Value, ClusterError> {
        debug!(index, "cluster: search");
        let url = self.endpoint(&[index, "_search"]);
        self.send(self.request(Method::POST, url).json(&body)).await
    }

    async fn get_policy(&self, policy_id: &str) -> Result<Value, ClusterError> {
        let url = self.policy_url(policy_id);
        self.send(self.request(Method::GET, url)).await
    }

    async fn put_policy(
        &self,
        policy_id: &str,
        condition: Option<WriteCondition>,
        body: Value,
    ) -> Result<Value, ClusterError> {
        let mut url = self.policy_url(policy_id);
        if let Some(condition) = condition {
            url.query_pairs_mut()
                .append_pair("if_seq_no", &condition.seq_no.to_string())
                .append_pair("if_primary_term", &condition.primary_term.to_string());
        }
        self.send(self.request(Method::PUT, url).json(&body)).await
    }

    async fn delete_policy(&self, policy_id: &str) -> Result<Value, ClusterError> {
        let url = self.policy_url(policy_id);
        self.send(self.request(Method::DELETE, url)).await
    }
}
