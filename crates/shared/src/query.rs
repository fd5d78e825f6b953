//! URL query-string form of [`ListQuery`].
//!
//! Keys are `from`, `search`, `size`, `sortDirection` and `sortField`, emitted in
//! that sorted order. Absent or unparseable values fall back to the default for
//! that key alone.

use url::form_urlencoded;

use crate::domain::{ListQuery, SortDirection, SortField};

pub const FROM_KEY: &str = "from";
pub const SIZE_KEY: &str = "size";
pub const SEARCH_KEY: &str = "search";
pub const SORT_FIELD_KEY: &str = "sortField";
pub const SORT_DIRECTION_KEY: &str = "sortDirection";

/// A query parameter that was present but could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedParam {
    pub key: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub query: ListQuery,
    pub malformed: Vec<MalformedParam>,
}

impl ListQuery {
    /// Parses a query string, with or without the leading `?`.
    pub fn parse(raw: &str) -> ParsedQuery {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let mut query = ListQuery::default();
        let mut malformed = Vec::new();

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                FROM_KEY => match value.trim().parse::<u64>() {
                    Ok(offset) => query.offset = offset,
                    Err(_) => malformed.push(MalformedParam {
                        key: FROM_KEY,
                        value: value.into_owned(),
                    }),
                },
                SIZE_KEY => match value.trim().parse::<u32>() {
                    Ok(size) if size > 0 => query.page_size = size,
                    _ => malformed.push(MalformedParam {
                        key: SIZE_KEY,
                        value: value.into_owned(),
                    }),
                },
                SEARCH_KEY => query.search = value.into_owned(),
                SORT_FIELD_KEY => match SortField::from_param(&value) {
                    Some(field) => query.sort_field = field,
                    None => malformed.push(MalformedParam {
                        key: SORT_FIELD_KEY,
                        value: value.into_owned(),
                    }),
                },
                SORT_DIRECTION_KEY => match SortDirection::from_param(&value) {
                    Some(direction) => query.sort_direction = direction,
                    None => malformed.push(MalformedParam {
                        key: SORT_DIRECTION_KEY,
                        value: value.into_owned(),
                    }),
                },
                _ => {}
            }
        }

        ParsedQuery { query, malformed }
    }

    pub fn from_query_string(raw: &str) -> Self {
        Self::parse(raw).query
    }

    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair(FROM_KEY, &self.offset.to_string())
            .append_pair(SEARCH_KEY, &self.search)
            .append_pair(SIZE_KEY, &self.page_size.to_string())
            .append_pair(SORT_DIRECTION_KEY, self.sort_direction.as_param())
            .append_pair(SORT_FIELD_KEY, self.sort_field.as_param())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;
