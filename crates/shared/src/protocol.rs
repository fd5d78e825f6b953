use serde::{Deserialize, Serialize};

pub const POLICIES_PATH: &str = "/api/ism/policies";

/// Envelope every policy route answers with. Failures are reported in-band with
/// `ok: false` rather than through the HTTP status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ServerResponse<T> {
    pub fn success(response: T) -> Self {
        Self {
            ok: true,
            response: Some(response),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            response: None,
            error: Some(error.into()),
        }
    }

    /// Collapses the envelope; a successful envelope without a payload is a failure.
    pub fn into_result(self) -> Result<T, String> {
        match (self.ok, self.response) {
            (true, Some(response)) => Ok(response),
            (true, None) => Err("server response was empty".to_string()),
            (false, _) => Err(self
                .error
                .unwrap_or_else(|| "request was rejected".to_string())),
        }
    }
}

/// Optimistic-concurrency guard for policy updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutPolicyParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_term: Option<i64>,
}
