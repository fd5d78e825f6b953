use std::sync::Arc;

use ism_shared::{
    domain::{ListQuery, ListResult, PolicyItem, SortField},
    error::{ApiError, ErrorCode},
    protocol::PutPolicyParams,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

pub mod cluster;

pub use cluster::{ClusterCredentials, ClusterError, HttpCluster, SearchCluster, WriteCondition};

pub const ISM_CONFIG_INDEX: &str = ".opendistro-ism-config";
const POLICY_ID_FIELD: &str = "policy.policy_id";

#[derive(Clone)]
pub struct ApiContext {
    pub cluster: Arc<dyn SearchCluster>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    total: TotalHits,
    #[serde(default)]
    hits: Vec<SearchHit>,
}

/// Older clusters report a bare number, newer ones `{ "value": n, "relation": .. }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(u64),
    Detailed { value: u64 },
}

impl TotalHits {
    fn value(&self) -> u64 {
        match self {
            Self::Count(value) | Self::Detailed { value } => *value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_seq_no", default)]
    seq_no: Option<i64>,
    #[serde(rename = "_primary_term", default)]
    primary_term: Option<i64>,
    #[serde(rename = "_source", default)]
    source: Value,
}

#[derive(Debug, Deserialize)]
struct PolicyDocumentResponse {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_seq_no", default)]
    seq_no: Option<i64>,
    #[serde(rename = "_primary_term", default)]
    primary_term: Option<i64>,
    #[serde(default)]
    policy: Value,
}

impl From<PolicyDocumentResponse> for PolicyItem {
    fn from(doc: PolicyDocumentResponse) -> Self {
        // Write responses nest the document one level deeper than reads.
        let policy = match doc.policy.get("policy") {
            Some(_) => doc.policy,
            None => json!({ "policy": doc.policy }),
        };
        Self {
            id: doc.id,
            seq_no: doc.seq_no,
            primary_term: doc.primary_term,
            policy,
        }
    }
}

fn sort_key(field: SortField) -> &'static str {
    match field {
        SortField::Id => "policy.policy_id.keyword",
        SortField::Description => "policy.description.keyword",
        SortField::LastUpdatedTime => "policy.last_updated_time",
    }
}

/// Wildcard query over whitespace-separated terms, or `match_all` when blank.
pub fn must_query(field: &str, search: &str) -> Value {
    let search = search.trim();
    if search.is_empty() {
        return json!({ "match_all": {} });
    }
    let terms = search
        .split_whitespace()
        .map(|term| format!("*{term}*"))
        .collect::<Vec<_>>()
        .join(" ");
    json!({
        "query_string": {
            "default_field": field,
            "default_operator": "AND",
            "query": terms,
        }
    })
}

pub fn search_body(query: &ListQuery) -> Value {
    json!({
        "seq_no_primary_term": true,
        "from": query.offset,
        "size": query.page_size,
        "sort": [{ sort_key(query.sort_field): query.sort_direction.as_param() }],
        "query": {
            "bool": {
                "filter": [{ "exists": { "field": "policy" } }],
                "must": must_query(POLICY_ID_FIELD, &query.search),
            }
        }
    })
}

pub async fn get_policies(ctx: &ApiContext, query: &ListQuery) -> Result<ListResult, ApiError> {
    let response = match ctx
        .cluster
        .search(ISM_CONFIG_INDEX, search_body(query))
        .await
    {
        Ok(response) => response,
        Err(err) if err.is_index_not_found() => {
            debug!("policies: config index missing, reporting empty listing");
            return Ok(ListResult::default());
        }
        Err(err) => return Err(cluster_error(err)),
    };

    let response: SearchResponse = serde_json::from_value(response).map_err(|err| {
        ApiError::new(
            ErrorCode::Internal,
            format!("unexpected search response: {err}"),
        )
    })?;
    let total_count = response.hits.total.value();
    let items = response
        .hits
        .hits
        .into_iter()
        .map(|hit| PolicyItem {
            id: hit.id,
            seq_no: hit.seq_no,
            primary_term: hit.primary_term,
            policy: hit.source,
        })
        .collect();
    Ok(ListResult { items, total_count })
}

pub async fn get_policy(ctx: &ApiContext, policy_id: &str) -> Result<PolicyItem, ApiError> {
    validate_policy_id(policy_id)?;
    let response = ctx
        .cluster
        .get_policy(policy_id)
        .await
        .map_err(cluster_error)?;
    parse_document(response)
}

/// Creates the policy, or updates it when both sequence number and primary term are given.
pub async fn put_policy(
    ctx: &ApiContext,
    policy_id: &str,
    params: PutPolicyParams,
    body: Value,
) -> Result<PolicyItem, ApiError> {
    validate_policy_id(policy_id)?;
    if !body.is_object() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "policy body must be a JSON object",
        ));
    }
    let condition = match (params.seq_no, params.primary_term) {
        (Some(seq_no), Some(primary_term)) => Some(WriteCondition {
            seq_no,
            primary_term,
        }),
        (None, None) => None,
        _ => {
            return Err(ApiError::new(
                ErrorCode::Validation,
                "seqNo and primaryTerm must be provided together",
            ))
        }
    };
    let response = ctx
        .cluster
        .put_policy(policy_id, condition, body)
        .await
        .map_err(cluster_error)?;
    info!(policy_id, updated = condition.is_some(), "policies: policy stored");
    parse_document(response)
}

/// Returns `true` only when the cluster reports the policy as deleted.
pub async fn delete_policy(ctx: &ApiContext, policy_id: &str) -> Result<bool, ApiError> {
    validate_policy_id(policy_id)?;
    let response = ctx
        .cluster
        .delete_policy(policy_id)
        .await
        .map_err(cluster_error)?;
    let deleted = response.get("result").and_then(Value::as_str) == Some("deleted");
    info!(policy_id, deleted, "policies: delete requested");
    Ok(deleted)
}

fn parse_document(response: Value) -> Result<PolicyItem, ApiError> {
    serde_json::from_value::<PolicyDocumentResponse>(response)
        .map(PolicyItem::from)
        .map_err(|err| {
            ApiError::new(
                ErrorCode::Internal,
                format!("unexpected policy response: {err}"),
            )
        })
}

fn validate_policy_id(policy_id: &str) -> Result<(), ApiError> {
    if policy_id.trim().is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "policy id cannot be empty",
        ));
    }
    Ok(())
}

fn cluster_error(err: ClusterError) -> ApiError {
    let code = match err.status() {
        Some(404) => ErrorCode::NotFound,
        Some(409) => ErrorCode::Conflict,
        Some(400) => ErrorCode::Validation,
        Some(_) => ErrorCode::Internal,
        None => ErrorCode::Unavailable,
    };
    let message = match &err {
        ClusterError::Response { reason, .. } => reason.clone(),
        ClusterError::Transport(_) => err.to_string(),
    };
    ApiError::new(code, message)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
