use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const PAGE_SIZE_OPTIONS: [u32; 4] = [5, 10, 20, 50];

/// Columns the policy table can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    Id,
    Description,
    LastUpdatedTime,
}

impl SortField {
    /// Token used in the URL; these are the table column field paths.
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Description => "policy.policy.description",
            Self::LastUpdatedTime => "policy.policy.last_updated_time",
        }
    }

    pub fn from_param(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(Self::Id),
            "policy.policy.description" | "description" => Some(Self::Description),
            "policy.policy.last_updated_time" | "lastUpdatedTime" => Some(Self::LastUpdatedTime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn from_param(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Filter, sort and pagination parameters driving one policy listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListQuery {
    pub offset: u64,
    pub page_size: u32,
    pub search: String,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            page_size: DEFAULT_PAGE_SIZE,
            search: String::new(),
            sort_field: SortField::default(),
            sort_direction: SortDirection::default(),
        }
    }
}

impl ListQuery {
    pub fn page_index(&self) -> u64 {
        self.offset / u64::from(self.page_size.max(1))
    }

    pub fn filter_applied(&self) -> bool {
        !self.search.is_empty()
    }
}

/// Number of pages needed for `total_count` items; an empty listing still has one page.
pub fn page_count(total_count: u64, page_size: u32) -> u64 {
    total_count.div_ceil(u64::from(page_size.max(1))).max(1)
}

/// One ISM policy document as stored in the config index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq_no: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_term: Option<i64>,
    /// Source document, shaped `{"policy": {...}}`.
    #[serde(default)]
    pub policy: Value,
}

impl PolicyItem {
    pub fn new(id: impl Into<String>, policy: Value) -> Self {
        Self {
            id: id.into(),
            seq_no: None,
            primary_term: None,
            policy,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.policy
            .pointer("/policy/description")
            .and_then(Value::as_str)
    }

    pub fn last_updated_time(&self) -> Option<DateTime<Utc>> {
        let millis = self
            .policy
            .pointer("/policy/last_updated_time")
            .and_then(Value::as_i64)?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

/// One page of policies plus the filtered total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResult {
    #[serde(rename = "policies")]
    pub items: Vec<PolicyItem>,
    #[serde(rename = "totalPolicies")]
    pub total_count: u64,
}
