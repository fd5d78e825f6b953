use async_trait::async_trait;
use ism_shared::domain::{ListQuery, ListResult};

pub mod debounce;
pub mod error;
pub mod list_view;
pub mod transport;

pub use debounce::{Debounce, Edge};
pub use error::DataSourceError;
pub use list_view::{EmptyPrompt, ListView, ListViewController, QueryPatch};
pub use transport::HttpPolicyService;

/// Backend the policy table reads from and deletes through.
#[async_trait]
pub trait PolicyDataSource: Send + Sync {
    async fn list_policies(&self, query: &ListQuery) -> Result<ListResult, DataSourceError>;
    async fn delete_policy(&self, policy_id: &str) -> Result<(), DataSourceError>;
}

/// User-visible toasts. Fire-and-forget.
pub trait Notifier: Send + Sync {
    fn add_success(&self, message: &str);
    fn add_danger(&self, message: &str);
}

pub trait Navigator: Send + Sync {
    /// Moves to another screen, e.g. the policy editor.
    fn push(&self, path: &str);
    /// Rewrites the current location's query string in place.
    fn replace_search(&self, search: &str);
}

/// Notifier that only logs; for headless use.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn add_success(&self, message: &str) {
        tracing::info!(message, "notification");
    }

    fn add_danger(&self, message: &str) {
        tracing::warn!(message, "notification");
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
