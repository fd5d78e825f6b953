use super::*;
use async_trait::async_trait;
use ism_shared::domain::ListResult;
use serde_json::json;
use std::{collections::HashMap, sync::Mutex as StdMutex};
use tokio::sync::{mpsc, oneshot};

#[derive(Default)]
struct RecordingNotifier {
    successes: StdMutex<Vec<String>>,
    dangers: StdMutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn add_success(&self, message: &str) {
        self.successes.lock().expect("lock").push(message.to_string());
    }

    fn add_danger(&self, message: &str) {
        self.dangers.lock().expect("lock").push(message.to_string());
    }
}

#[derive(Default)]
struct RecordingNavigator {
    pushes: StdMutex<Vec<String>>,
    searches: StdMutex<Vec<String>>,
}

impl RecordingNavigator {
    fn last_search(&self) -> Option<String> {
        self.searches.lock().expect("lock").last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn push(&self, path: &str) {
        self.pushes.lock().expect("lock").push(path.to_string());
    }

    fn replace_search(&self, search: &str) {
        self.searches.lock().expect("lock").push(search.to_string());
    }
}

#[derive(Default)]
struct FakeSource {
    listing: StdMutex<ListResult>,
    list_error: StdMutex<Option<DataSourceError>>,
    delete_errors: HashMap<String, DataSourceError>,
    list_calls: StdMutex<Vec<ListQuery>>,
    delete_calls: StdMutex<Vec<String>>,
}

impl FakeSource {
    fn with_items(ids: &[&str]) -> Self {
        let source = Self::default();
        *source.listing.lock().expect("lock") = listing(ids);
        source
    }

    fn list_calls(&self) -> Vec<ListQuery> {
        self.list_calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl PolicyDataSource for FakeSource {
    async fn list_policies(&self, query: &ListQuery) -> Result<ListResult, DataSourceError> {
        self.list_calls.lock().expect("lock").push(query.clone());
        if let Some(err) = self.list_error.lock().expect("lock").clone() {
            return Err(err);
        }
        Ok(self.listing.lock().expect("lock").clone())
    }

    async fn delete_policy(&self, policy_id: &str) -> Result<(), DataSourceError> {
        self.delete_calls
            .lock()
            .expect("lock")
            .push(policy_id.to_string());
        match self.delete_errors.get(policy_id) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

type Reply = oneshot::Sender<Result<ListResult, DataSourceError>>;

/// Hands every listing request to the test, which answers it whenever it likes.
struct GatedSource {
    requests: mpsc::UnboundedSender<(ListQuery, Reply)>,
}

#[async_trait]
impl PolicyDataSource for GatedSource {
    async fn list_policies(&self, query: &ListQuery) -> Result<ListResult, DataSourceError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send((query.clone(), tx))
            .map_err(|_| DataSourceError::Transport("test harness gone".into()))?;
        rx.await
            .map_err(|_| DataSourceError::Transport("reply dropped".into()))?
    }

    async fn delete_policy(&self, _policy_id: &str) -> Result<(), DataSourceError> {
        Ok(())
    }
}

fn item(id: &str) -> PolicyItem {
    PolicyItem::new(id, json!({ "policy": { "description": format!("{id} policy") } }))
}

fn listing(ids: &[&str]) -> ListResult {
    ListResult {
        items: ids.iter().map(|id| item(id)).collect(),
        total_count: ids.len() as u64,
    }
}

struct Harness {
    controller: Arc<ListViewController>,
    source: Arc<FakeSource>,
    notifier: Arc<RecordingNotifier>,
    navigator: Arc<RecordingNavigator>,
}

fn harness(source: FakeSource, location: &str) -> Harness {
    let source = Arc::new(source);
    let notifier = Arc::new(RecordingNotifier::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let controller = ListViewController::new(
        source.clone(),
        notifier.clone(),
        navigator.clone(),
        location,
    );
    Harness {
        controller,
        source,
        notifier,
        navigator,
    }
}

fn ids(items: &[PolicyItem]) -> Vec<&str> {
    items.iter().map(|item| item.id.as_str()).collect()
}

#[tokio::test]
async fn mount_without_params_requests_defaults_and_shows_empty_prompt() {
    let h = harness(FakeSource::default(), "");
    h.controller.mount().await;

    assert_eq!(h.source.list_calls(), vec![ListQuery::default()]);
    assert_eq!(
        h.navigator.last_search().as_deref(),
        Some("from=0&search=&size=20&sortDirection=asc&sortField=id")
    );

    let view = h.controller.view().await;
    assert!(view.items.is_empty());
    assert_eq!(view.total_count, 0);
    assert_eq!(view.page_index, 0);
    assert_eq!(view.page_count, 1);
    assert!(!view.loading);
    assert!(!view.filter_applied);
    assert_eq!(view.empty_prompt(), Some(EmptyPrompt::NoPolicies));
}

#[tokio::test]
async fn malformed_location_params_fall_back_individually() {
    let h = harness(
        FakeSource::default(),
        "?from=abc&size=10&search=hot&sortDirection=up&sortField=policy.policy.description",
    );
    let query = h.controller.query().await;
    assert_eq!(query.offset, 0);
    assert_eq!(query.page_size, 10);
    assert_eq!(query.search, "hot");
    assert_eq!(query.sort_direction, SortDirection::Asc);
    assert_eq!(query.sort_field, SortField::Description);
}

#[tokio::test(start_paused = true)]
async fn new_search_resets_offset_and_rewrites_location() {
    let h = harness(FakeSource::default(), "from=40&size=20");
    h.controller.mount().await;
    assert_eq!(h.source.list_calls()[0].offset, 40);

    h.controller.on_search_change("x").await;
    let query = h.controller.query().await;
    assert_eq!(query.offset, 0);
    assert_eq!(query.search, "x");
    assert_eq!(
        h.navigator.last_search().as_deref(),
        Some("from=0&search=x&size=20&sortDirection=asc&sortField=id")
    );

    tokio::time::sleep(REFRESH_DEBOUNCE + Duration::from_millis(100)).await;
    let calls = h.source.list_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].search, "x");
    assert_eq!(calls[1].offset, 0);
}

#[tokio::test]
async fn page_navigation_keeps_search_and_sort() {
    let h = harness(
        FakeSource::default(),
        "search=hot&sortField=lastUpdatedTime&sortDirection=desc",
    );
    h.controller.on_page_click(2).await;

    let query = h.controller.query().await;
    assert_eq!(query.offset, 40);
    assert_eq!(query.search, "hot");
    assert_eq!(query.sort_field, SortField::LastUpdatedTime);
    assert_eq!(query.sort_direction, SortDirection::Desc);
    assert_eq!(query.page_index(), 2);
}

#[tokio::test]
async fn table_change_sets_offset_from_page_and_size() {
    let h = harness(FakeSource::default(), "search=hot");
    h.controller
        .on_table_change(3, 10, SortField::Description, SortDirection::Desc)
        .await;

    let query = h.controller.query().await;
    assert_eq!(query.offset, 30);
    assert_eq!(query.page_size, 10);
    assert_eq!(query.search, "hot");
    assert_eq!(h.source.list_calls(), vec![query]);
}

#[tokio::test(start_paused = true)]
async fn refreshes_inside_the_window_coalesce() {
    let h = harness(FakeSource::with_items(&["a"]), "");
    h.controller.mount().await;
    for _ in 0..5 {
        h.controller.refresh().await;
    }
    tokio::time::sleep(REFRESH_DEBOUNCE + Duration::from_millis(100)).await;
    assert_eq!(h.source.list_calls().len(), 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    for term in ["a", "ab", "abc"] {
        h.controller.on_search_change(term).await;
    }
    tokio::time::sleep(REFRESH_DEBOUNCE + Duration::from_millis(100)).await;

    let searches: Vec<String> = h
        .source
        .list_calls()
        .into_iter()
        .map(|query| query.search)
        .collect();
    assert_eq!(searches, vec!["", "a", "abc"]);
}

#[tokio::test]
async fn unchanged_query_does_not_refetch() {
    let h = harness(FakeSource::default(), "search=hot");
    h.controller.mount().await;
    h.controller.on_search_change("hot").await;
    assert_eq!(h.source.list_calls().len(), 1);
    assert_eq!(h.navigator.searches.lock().expect("lock").len(), 2);
}

#[tokio::test]
async fn stale_response_does_not_overwrite_newer_one() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let controller = ListViewController::with_debounce(
        Arc::new(GatedSource { requests: tx }),
        Arc::new(RecordingNotifier::default()),
        Arc::new(RecordingNavigator::default()),
        "",
        Duration::ZERO,
    );

    let first = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.mount().await })
    };
    let (q1, reply1) = rx.recv().await.expect("first request");
    assert_eq!(q1, ListQuery::default());

    let second = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.on_search_change("warm").await })
    };
    let (q2, reply2) = rx.recv().await.expect("second request");
    assert_eq!(q2.search, "warm");

    reply2.send(Ok(listing(&["warm_delete"]))).expect("reply");
    second.await.expect("join");
    assert!(controller.view().await.loading);

    reply1.send(Ok(listing(&["stale_one", "stale_two"]))).expect("reply");
    first.await.expect("join");

    let view = controller.view().await;
    assert_eq!(ids(&view.items), vec!["warm_delete"]);
    assert_eq!(view.total_count, 1);
    assert!(!view.loading);
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_keeps_last_items_and_notifies() {
    let h = harness(FakeSource::with_items(&["a", "b"]), "");
    h.controller.mount().await;

    *h.source.list_error.lock().expect("lock") = Some(DataSourceError::Transport(String::new()));
    tokio::time::sleep(REFRESH_DEBOUNCE * 2).await;
    h.controller.refresh().await;

    let view = h.controller.view().await;
    assert_eq!(ids(&view.items), vec!["a", "b"]);
    assert!(!view.loading);
    assert_eq!(
        *h.notifier.dangers.lock().expect("lock"),
        vec!["There was a problem loading the policies".to_string()]
    );

    *h.source.list_error.lock().expect("lock") =
        Some(DataSourceError::Rejected("index is closed".into()));
    tokio::time::sleep(REFRESH_DEBOUNCE * 2).await;
    h.controller.refresh().await;
    assert_eq!(
        h.notifier.dangers.lock().expect("lock").last().map(String::as_str),
        Some("index is closed")
    );
    assert_eq!(h.source.list_calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn bulk_delete_with_a_failure_does_not_refresh() {
    let mut source = FakeSource::with_items(&["a", "b", "c"]);
    source.delete_errors.insert(
        "b".into(),
        DataSourceError::Rejected("b is attached to indices".into()),
    );
    let h = harness(source, "");
    h.controller.mount().await;

    h.controller
        .bulk_delete(&["a".into(), "b".into(), "c".into()])
        .await;
    tokio::time::sleep(REFRESH_DEBOUNCE * 2).await;

    let mut deleted = h.source.delete_calls.lock().expect("lock").clone();
    deleted.sort();
    assert_eq!(deleted, vec!["a", "b", "c"]);
    assert_eq!(h.source.list_calls().len(), 1);
    assert_eq!(h.notifier.successes.lock().expect("lock").len(), 2);
    assert_eq!(
        *h.notifier.dangers.lock().expect("lock"),
        vec!["Failed to delete the policy, b is attached to indices".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn bulk_delete_success_refreshes_exactly_once() {
    let h = harness(FakeSource::with_items(&["a", "b", "c"]), "");
    h.controller.mount().await;

    h.controller
        .bulk_delete(&["a".into(), "b".into(), "c".into()])
        .await;
    tokio::time::sleep(REFRESH_DEBOUNCE * 2).await;

    assert_eq!(h.source.list_calls().len(), 2);
    assert_eq!(
        *h.notifier.successes.lock().expect("lock"),
        vec![
            "Deleted the policy: a".to_string(),
            "Deleted the policy: b".to_string(),
            "Deleted the policy: c".to_string()
        ]
    );
}

#[tokio::test]
async fn empty_bulk_delete_is_a_noop() {
    let h = harness(FakeSource::default(), "");
    h.controller.bulk_delete(&[]).await;
    assert!(h.source.delete_calls.lock().expect("lock").is_empty());
    assert!(h.source.list_calls().is_empty());
}

#[tokio::test]
async fn transport_failure_on_delete_uses_generic_message() {
    let mut source = FakeSource::default();
    source
        .delete_errors
        .insert("a".into(), DataSourceError::Transport("  ".into()));
    let h = harness(source, "");

    assert!(!h.controller.delete_one("a").await);
    assert!(h.controller.delete_one("b").await);
    assert_eq!(
        *h.notifier.dangers.lock().expect("lock"),
        vec!["There was a problem deleting the policy".to_string()]
    );
}

#[tokio::test]
async fn selection_drives_actions_and_clears_on_refetch() {
    let h = harness(FakeSource::with_items(&["a", "b"]), "");
    h.controller.set_selection(vec![item("a")]).await;

    let view = h.controller.view().await;
    assert!(view.delete_enabled());
    assert!(view.edit_enabled());
    assert_eq!(view.delete_confirmation_title().as_deref(), Some("Delete a"));

    h.controller.on_click_edit().await;
    h.controller.on_click_create();
    h.controller.on_click_modal_edit(&item("b"));
    h.controller.on_click_modal_edit(&item(""));
    assert_eq!(
        *h.navigator.pushes.lock().expect("lock"),
        vec!["/edit-policy?id=a", "/create-policy", "/edit-policy?id=b"]
    );

    h.controller.set_selection(vec![item("a"), item("b")]).await;
    let view = h.controller.view().await;
    assert!(!view.edit_enabled());
    assert_eq!(
        view.delete_confirmation_title().as_deref(),
        Some("Delete 2 policies")
    );

    h.controller.mount().await;
    let view = h.controller.view().await;
    assert!(view.selection.is_empty());
    assert!(!view.delete_enabled());
    assert_eq!(view.delete_confirmation_title(), None);
}

#[tokio::test]
async fn delete_button_removes_selected_policies() {
    let h = harness(FakeSource::with_items(&["a", "b"]), "");
    h.controller.set_selection(vec![item("b")]).await;
    h.controller.on_click_delete().await;

    assert_eq!(*h.source.delete_calls.lock().expect("lock"), vec!["b"]);
    assert_eq!(h.source.list_calls().len(), 1);
}

#[tokio::test]
async fn filtered_empty_listing_offers_reset() {
    let h = harness(FakeSource::default(), "search=nothing&from=20");
    h.controller.mount().await;

    let view = h.controller.view().await;
    assert!(view.filter_applied);
    assert_eq!(view.empty_prompt(), Some(EmptyPrompt::NoMatches));

    h.controller.reset_filters().await;
    let query = h.controller.query().await;
    assert_eq!(query.search, "");
    assert_eq!(query.offset, 0);
}

#[tokio::test]
async fn table_reports_loading_until_first_fetch_settles() {
    let h = harness(FakeSource::default(), "");
    let view = h.controller.view().await;
    assert!(view.loading);
    assert_eq!(view.empty_prompt(), Some(EmptyPrompt::Loading));

    h.controller.mount().await;
    let view = h.controller.view().await;
    assert!(!view.loading);
    assert_eq!(view.empty_prompt(), Some(EmptyPrompt::NoPolicies));
}

#[tokio::test]
async fn first_fetch_failure_also_ends_loading() {
    let h = harness(FakeSource::default(), "");
    *h.source.list_error.lock().expect("lock") = Some(DataSourceError::Transport(String::new()));
    h.controller.mount().await;

    let view = h.controller.view().await;
    assert!(!view.loading);
    assert_eq!(h.notifier.dangers.lock().expect("lock").len(), 1);
}

#[tokio::test]
async fn huge_page_numbers_clamp_the_offset() {
    let h = harness(FakeSource::default(), "size=20");
    h.controller.on_page_click(u64::MAX / 10).await;
    assert_eq!(h.controller.query().await.offset, u64::MAX);

    h.controller
        .on_table_change(u64::MAX, 50, SortField::Id, SortDirection::Asc)
        .await;
    let view = h.controller.view().await;
    assert_eq!(view.query.offset, u64::MAX);
    assert_eq!(view.page_index, u64::MAX / 50);
}

#[tokio::test]
async fn failure_of_a_superseded_fetch_stays_quiet() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let notifier = Arc::new(RecordingNotifier::default());
    let controller = ListViewController::with_debounce(
        Arc::new(GatedSource { requests: tx }),
        notifier.clone(),
        Arc::new(RecordingNavigator::default()),
        "",
        Duration::ZERO,
    );

    let first = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.mount().await })
    };
    let (_, reply1) = rx.recv().await.expect("first request");

    let second = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.on_search_change("warm").await })
    };
    let (_, reply2) = rx.recv().await.expect("second request");

    reply2.send(Ok(listing(&["warm_delete"]))).expect("reply");
    second.await.expect("join");
    reply1
        .send(Err(DataSourceError::Transport("connection reset".into())))
        .expect("reply");
    first.await.expect("join");

    let view = controller.view().await;
    assert_eq!(ids(&view.items), vec!["warm_delete"]);
    assert!(!view.loading);
    assert!(notifier.dangers.lock().expect("lock").is_empty());
}
