//! REST client for the `/api/ism/policies` routes.

use async_trait::async_trait;
use ism_shared::{
    domain::{ListQuery, ListResult, PolicyItem},
    protocol::{PutPolicyParams, ServerResponse, POLICIES_PATH},
};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{DataSourceError, PolicyDataSource};

pub struct HttpPolicyService {
    http: Client,
    server_url: Url,
}

impl HttpPolicyService {
    pub fn new(server_url: &str) -> Result<Self, DataSourceError> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self, DataSourceError> {
        let server_url = Url::parse(server_url).map_err(|err| {
            DataSourceError::Transport(format!("invalid server url '{server_url}': {err}"))
        })?;
        if server_url.cannot_be_a_base() {
            return Err(DataSourceError::Transport(format!(
                "server url '{server_url}' cannot carry a path"
            )));
        }
        Ok(Self { http, server_url })
    }

    fn policies_url(&self, policy_id: Option<&str>) -> Url {
        let mut url = self.server_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(POLICIES_PATH.split('/').filter(|segment| !segment.is_empty()));
            if let Some(policy_id) = policy_id {
                path.push(policy_id);
            }
        }
        url
    }

    pub async fn get_policy(&self, policy_id: &str) -> Result<PolicyItem, DataSourceError> {
        let envelope: ServerResponse<PolicyItem> = self
            .http
            .get(self.policies_url(Some(policy_id)))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        envelope.into_result().map_err(DataSourceError::Rejected)
    }

    pub async fn put_policy(
        &self,
        policy_id: &str,
        params: PutPolicyParams,
        policy: &Value,
    ) -> Result<PolicyItem, DataSourceError> {
        let envelope: ServerResponse<PolicyItem> = self
            .http
            .put(self.policies_url(Some(policy_id)))
            .query(&params)
            .json(policy)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        envelope.into_result().map_err(DataSourceError::Rejected)
    }
}

#[async_trait]
impl PolicyDataSource for HttpPolicyService {
    async fn list_policies(&self, query: &ListQuery) -> Result<ListResult, DataSourceError> {
        let mut url = self.policies_url(None);
        url.set_query(Some(&query.to_query_string()));
        debug!(%url, "policies: listing");
        let envelope: ServerResponse<ListResult> = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        envelope.into_result().map_err(DataSourceError::Rejected)
    }

    async fn delete_policy(&self, policy_id: &str) -> Result<(), DataSourceError> {
        let envelope: ServerResponse<bool> = self
            .http
            .delete(self.policies_url(Some(policy_id)))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        envelope
            .into_result()
            .map(|_| ())
            .map_err(DataSourceError::Rejected)
    }
}
