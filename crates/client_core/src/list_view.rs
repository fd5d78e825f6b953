//! State behind the policy table.
//!
//! [`ListViewController`] owns the list query, mirrors it into the location's query
//! string, and fetches pages from a [`PolicyDataSource`]. Refreshes go through a
//! [`Debounce`]; every dispatched fetch carries a generation and the query it was
//! issued for, and a response is applied only while that query is still current and
//! nothing newer has been applied.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;
use ism_shared::domain::{page_count, ListQuery, PolicyItem, SortDirection, SortField};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    debounce::{Debounce, Edge},
    DataSourceError, Navigator, Notifier, PolicyDataSource,
};

pub const REFRESH_DEBOUNCE: Duration = Duration::from_millis(500);
pub const EDIT_POLICY_ROUTE: &str = "/edit-policy";
pub const CREATE_POLICY_ROUTE: &str = "/create-policy";

const LOAD_FAILED: &str = "There was a problem loading the policies";
const DELETE_FAILED: &str = "There was a problem deleting the policy";

/// Fields to overwrite in the current [`ListQuery`]; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPatch {
    pub offset: Option<u64>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
    pub sort_field: Option<SortField>,
    pub sort_direction: Option<SortDirection>,
}

impl QueryPatch {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ..Self::default()
        }
    }

    pub fn offset(offset: u64) -> Self {
        Self {
            offset: Some(offset),
            ..Self::default()
        }
    }

    /// A new search term always sends the view back to the first page.
    pub fn apply(self, query: &mut ListQuery) {
        if let Some(offset) = self.offset {
            query.offset = offset;
        }
        if let Some(page_size) = self.page_size.filter(|size| *size > 0) {
            query.page_size = page_size;
        }
        if let Some(sort_field) = self.sort_field {
            query.sort_field = sort_field;
        }
        if let Some(sort_direction) = self.sort_direction {
            query.sort_direction = sort_direction;
        }
        if let Some(search) = self.search {
            query.search = search;
            query.offset = 0;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyPrompt {
    Loading,
    NoMatches,
    NoPolicies,
}

impl EmptyPrompt {
    pub fn message(self) -> &'static str {
        match self {
            Self::Loading => "Loading policies...",
            Self::NoMatches => "There are no policies matching your applied filters. Reset your filters to view your policies.",
            Self::NoPolicies => "There are no existing policies. Create a policy to apply to your indices.",
        }
    }
}

/// Render-ready snapshot of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    pub query: ListQuery,
    pub items: Vec<PolicyItem>,
    pub total_count: u64,
    pub selection: Vec<PolicyItem>,
    pub loading: bool,
    pub page_index: u64,
    pub page_count: u64,
    pub filter_applied: bool,
}

impl ListView {
    pub fn delete_enabled(&self) -> bool {
        !self.selection.is_empty()
    }

    pub fn edit_enabled(&self) -> bool {
        self.selection.len() == 1
    }

    /// Title for the delete confirmation, e.g. `Delete hot_warm` or `Delete 3 policies`.
    pub fn delete_confirmation_title(&self) -> Option<String> {
        match self.selection.as_slice() {
            [] => None,
            [only] => Some(format!("Delete {}", only.id)),
            many => Some(format!("Delete {} policies", many.len())),
        }
    }

    pub fn empty_prompt(&self) -> Option<EmptyPrompt> {
        if !self.items.is_empty() {
            return None;
        }
        Some(if self.loading {
            EmptyPrompt::Loading
        } else if self.filter_applied {
            EmptyPrompt::NoMatches
        } else {
            EmptyPrompt::NoPolicies
        })
    }
}

struct ListViewState {
    query: ListQuery,
    items: Vec<PolicyItem>,
    total_count: u64,
    selection: Vec<PolicyItem>,
    in_flight: usize,
    /// False until the first fetch settles; the table starts out loading.
    settled: bool,
    last_dispatched: Option<ListQuery>,
    /// Set after a mutation so a coalesced refresh still refetches an unchanged query.
    invalidated: bool,
    issued_generation: u64,
    applied_generation: u64,
}

pub struct ListViewController {
    source: Arc<dyn PolicyDataSource>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    debounce: Debounce,
    state: Mutex<ListViewState>,
}

impl ListViewController {
    /// Builds a controller from the location's query string; malformed parameters
    /// fall back to their defaults.
    pub fn new(
        source: Arc<dyn PolicyDataSource>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        location_search: &str,
    ) -> Arc<Self> {
        Self::with_debounce(source, notifier, navigator, location_search, REFRESH_DEBOUNCE)
    }

    pub fn with_debounce(
        source: Arc<dyn PolicyDataSource>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        location_search: &str,
        window: Duration,
    ) -> Arc<Self> {
        let parsed = ListQuery::parse(location_search);
        for param in &parsed.malformed {
            warn!(key = param.key, value = %param.value, "list view: malformed url parameter replaced by default");
        }
        Arc::new(Self {
            source,
            notifier,
            navigator,
            debounce: Debounce::new(window),
            state: Mutex::new(ListViewState {
                query: parsed.query,
                items: Vec::new(),
                total_count: 0,
                selection: Vec::new(),
                in_flight: 0,
                settled: false,
                last_dispatched: None,
                invalidated: false,
                issued_generation: 0,
                applied_generation: 0,
            }),
        })
    }

    /// Initial load: canonicalizes the location and fetches the first page.
    pub async fn mount(self: &Arc<Self>) {
        let search = self.state.lock().await.query.to_query_string();
        self.navigator.replace_search(&search);
        self.refresh().await;
    }

    pub async fn query(&self) -> ListQuery {
        self.state.lock().await.query.clone()
    }

    pub async fn view(&self) -> ListView {
        let state = self.state.lock().await;
        ListView {
            query: state.query.clone(),
            items: state.items.clone(),
            total_count: state.total_count,
            selection: state.selection.clone(),
            loading: state.in_flight > 0 || !state.settled,
            page_index: state.query.page_index(),
            page_count: page_count(state.total_count, state.query.page_size),
            filter_applied: state.query.filter_applied(),
        }
    }

    /// Merges `patch` into the query and rewrites the location. Refetches only when the
    /// resulting query differs from the last one sent to the data source.
    pub async fn set_query(self: &Arc<Self>, patch: QueryPatch) {
        let (search, changed) = {
            let mut state = self.state.lock().await;
            patch.apply(&mut state.query);
            let changed = state.last_dispatched.as_ref() != Some(&state.query);
            (state.query.to_query_string(), changed)
        };
        self.navigator.replace_search(&search);
        if changed {
            self.refresh().await;
        }
    }

    /// Fetches the current query. Resolves once a leading-edge fetch completes; a call
    /// folded into a trailing run returns straight away.
    pub async fn refresh(self: &Arc<Self>) {
        let controller = Arc::clone(self);
        let leading = self
            .debounce
            .trigger(move |edge| async move { controller.fetch(edge).await })
            .await;
        if let Some(handle) = leading {
            if let Err(err) = handle.await {
                warn!(error = %err, "list view: fetch task failed");
            }
        }
    }

    async fn fetch(self: Arc<Self>, edge: Edge) {
        let (generation, query) = {
            let mut state = self.state.lock().await;
            if edge == Edge::Trailing
                && !state.invalidated
                && state.last_dispatched.as_ref() == Some(&state.query)
            {
                debug!("list view: trailing refresh skipped, query unchanged");
                return;
            }
            state.issued_generation += 1;
            state.in_flight += 1;
            state.invalidated = false;
            state.last_dispatched = Some(state.query.clone());
            (state.issued_generation, state.query.clone())
        };

        debug!(generation, ?edge, search = %query.search, offset = query.offset, "list view: fetching policies");
        let outcome = self.source.list_policies(&query).await;

        let failure = {
            let mut state = self.state.lock().await;
            state.in_flight -= 1;
            state.settled = true;
            let stale = query != state.query || generation <= state.applied_generation;
            match outcome {
                Ok(_) if stale => {
                    debug!(generation, "list view: discarding stale response");
                    None
                }
                Err(err) if stale => {
                    debug!(generation, error = %err, "list view: ignoring failure of a superseded fetch");
                    None
                }
                Ok(result) => {
                    state.applied_generation = generation;
                    state.items = result.items;
                    state.total_count = result.total_count;
                    state.selection.clear();
                    None
                }
                Err(err) => Some(err),
            }
        };

        if let Some(err) = failure {
            warn!(generation, error = %err, "list view: failed to load policies");
            let message = match &err {
                DataSourceError::Rejected(message) => message.as_str(),
                DataSourceError::Transport(_) => err.message_or(LOAD_FAILED),
            };
            self.notifier.add_danger(message);
        }
    }

    pub async fn delete_one(&self, policy_id: &str) -> bool {
        match self.source.delete_policy(policy_id).await {
            Ok(()) => {
                info!(policy_id, "list view: policy deleted");
                self.notifier
                    .add_success(&format!("Deleted the policy: {policy_id}"));
                true
            }
            Err(DataSourceError::Rejected(message)) => {
                warn!(policy_id, error = %message, "list view: delete rejected");
                self.notifier
                    .add_danger(&format!("Failed to delete the policy, {message}"));
                false
            }
            Err(err) => {
                warn!(policy_id, error = %err, "list view: delete failed");
                self.notifier.add_danger(err.message_or(DELETE_FAILED));
                false
            }
        }
    }

    /// Deletes all `ids` concurrently; refreshes only if every delete succeeded.
    pub async fn bulk_delete(self: &Arc<Self>, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        let results = join_all(ids.iter().map(|id| self.delete_one(id))).await;
        let deleted = results.iter().all(|ok| *ok);
        info!(requested = ids.len(), deleted, "list view: bulk delete finished");
        if deleted {
            self.state.lock().await.invalidated = true;
            self.refresh().await;
        }
    }

    pub async fn set_selection(&self, items: Vec<PolicyItem>) {
        self.state.lock().await.selection = items;
    }

    pub async fn on_table_change(
        self: &Arc<Self>,
        page_index: u64,
        page_size: u32,
        sort_field: SortField,
        sort_direction: SortDirection,
    ) {
        self.set_query(QueryPatch {
            offset: Some(page_index.saturating_mul(u64::from(page_size))),
            page_size: Some(page_size),
            search: None,
            sort_field: Some(sort_field),
            sort_direction: Some(sort_direction),
        })
        .await;
    }

    pub async fn on_search_change(self: &Arc<Self>, term: &str) {
        self.set_query(QueryPatch::search(term)).await;
    }

    pub async fn on_page_click(self: &Arc<Self>, page: u64) {
        let page_size = self.state.lock().await.query.page_size;
        self.set_query(QueryPatch::offset(page.saturating_mul(u64::from(page_size))))
            .await;
    }

    pub async fn reset_filters(self: &Arc<Self>) {
        self.set_query(QueryPatch::search(ListQuery::default().search))
            .await;
    }

    pub async fn on_click_edit(&self) {
        let selected = match self.state.lock().await.selection.as_slice() {
            [only] => Some(only.id.clone()),
            _ => None,
        };
        if let Some(id) = selected.filter(|id| !id.is_empty()) {
            self.navigator.push(&edit_route(&id));
        }
    }

    pub fn on_click_create(&self) {
        self.navigator.push(CREATE_POLICY_ROUTE);
    }

    pub async fn on_click_delete(self: &Arc<Self>) {
        let ids: Vec<String> = self
            .state
            .lock()
            .await
            .selection
            .iter()
            .map(|item| item.id.clone())
            .collect();
        self.bulk_delete(&ids).await;
    }

    /// Edit button inside the policy detail modal.
    pub fn on_click_modal_edit(&self, item: &PolicyItem) {
        if item.id.is_empty() {
            return;
        }
        self.navigator.push(&edit_route(&item.id));
    }
}

fn edit_route(policy_id: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(policy_id.as_bytes()).collect();
    format!("{EDIT_POLICY_ROUTE}?id={encoded}")
}

#[cfg(test)]
#[path = "tests/list_view_tests.rs"]
mod tests;
