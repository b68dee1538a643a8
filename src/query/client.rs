//! The query cache store and the fetch orchestration around it.

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::error::QueryError;
use super::key::{QueryFilter, QueryKey};
use super::observer::QueryObserver;
use super::state::{QueryOptions, QueryStatus, StaleTime};
use crate::api::ApiError;
use crate::session::{AuthContext, Session};

pub(crate) type Payload = Arc<dyn Any + Send + Sync>;

type ErasedFetcher =
  Arc<dyn Fn() -> BoxFuture<'static, Result<Payload, QueryError>> + Send + Sync>;

/// Client-wide cache tuning.
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
  /// Stale time for queries that don't set their own
  pub stale_time: StaleTime,
  /// How long an unobserved entry is retained before it can be collected
  pub gc_time: Duration,
}

impl Default for CacheOptions {
  fn default() -> Self {
    Self {
      stale_time: StaleTime::After(Duration::from_secs(60)),
      gc_time: Duration::from_secs(5 * 60),
    }
  }
}

struct InFlight {
  id: u64,
  handle: JoinHandle<()>,
}

struct Entry {
  data: Option<Payload>,
  error: Option<QueryError>,
  status: QueryStatus,
  updated_at: Option<Instant>,
  stale_time: StaleTime,
  invalidated: bool,
  /// Latest fetch function registered by an observer of this key
  fetcher: Option<ErasedFetcher>,
  in_flight: Option<InFlight>,
  observers: usize,
  enabled_observers: usize,
  unobserved_since: Option<Instant>,
  version: watch::Sender<u64>,
}

impl Entry {
  fn new(stale_time: StaleTime) -> Self {
    let (version, _) = watch::channel(0);
    Self {
      data: None,
      error: None,
      status: QueryStatus::Idle,
      updated_at: None,
      stale_time,
      invalidated: false,
      fetcher: None,
      in_flight: None,
      observers: 0,
      enabled_observers: 0,
      unobserved_since: None,
      version,
    }
  }

  fn is_stale(&self, now: Instant) -> bool {
    if self.invalidated {
      return true;
    }
    match self.updated_at {
      Some(fetched_at) => self.stale_time.is_elapsed(fetched_at, now),
      None => true,
    }
  }

  fn needs_fetch(&self, now: Instant) -> bool {
    self.in_flight.is_none() && (self.data.is_none() || self.is_stale(now))
  }

  fn notify(&self) {
    self.version.send_modify(|version| *version += 1);
  }

  /// Drop everything fetched so far and abort the running fetch.
  fn reset(&mut self) {
    if let Some(in_flight) = self.in_flight.take() {
      in_flight.handle.abort();
    }
    self.data = None;
    self.error = None;
    self.status = QueryStatus::Idle;
    self.updated_at = None;
    self.invalidated = false;
    self.notify();
  }

  fn snapshot(&self, now: Instant) -> Snapshot {
    Snapshot {
      data: self.data.clone(),
      error: self.error.clone(),
      status: self.status,
      is_fetching: self.in_flight.is_some(),
      is_stale: self.is_stale(now),
      updated_at: self.updated_at,
    }
  }
}

/// Type-erased copy of an entry's state, turned into a `QueryResult` by the observer.
pub(crate) struct Snapshot {
  pub data: Option<Payload>,
  pub error: Option<QueryError>,
  pub status: QueryStatus,
  pub is_fetching: bool,
  pub is_stale: bool,
  pub updated_at: Option<Instant>,
}

#[derive(Default)]
struct Store {
  entries: HashMap<QueryKey, Entry>,
  /// Bumped whenever a session ends; results tagged with an older epoch are dropped
  epoch: u64,
  next_fetch_id: u64,
}

impl Store {
  fn collect_garbage(&mut self, now: Instant, gc_time: Duration) -> usize {
    let before = self.entries.len();
    self.entries.retain(|key, entry| {
      let keep = entry.observers > 0
        || entry.in_flight.is_some()
        || entry
          .unobserved_since
          .map_or(true, |since| now.saturating_duration_since(since) < gc_time);
      if !keep {
        trace!(key = %key, "collecting unobserved query");
      }
      keep
    });
    before - self.entries.len()
  }
}

struct ClientInner {
  store: Mutex<Store>,
  session: Session,
  options: CacheOptions,
}

/// Handle to one session's query cache.
///
/// Cheap to clone; every clone shares the same store. Construct one per
/// application session and hand it to whatever needs to read server state.
/// Fetches are spawned on the ambient tokio runtime.
#[derive(Clone)]
pub struct QueryClient {
  inner: Arc<ClientInner>,
}

impl QueryClient {
  /// Create an empty cache for an unauthenticated session.
  pub fn new(options: CacheOptions) -> Self {
    Self::with_session(options, Session::default())
  }

  pub fn with_session(options: CacheOptions, session: Session) -> Self {
    Self {
      inner: Arc::new(ClientInner {
        store: Mutex::new(Store::default()),
        session,
        options,
      }),
    }
  }

  /// The session handle fetchers read their credential from.
  pub fn session(&self) -> Session {
    self.inner.session.clone()
  }

  /// Number of entries currently held.
  pub fn len(&self) -> usize {
    self.inner.store.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn contains(&self, key: &QueryKey) -> bool {
    self.inner.store.lock().entries.contains_key(key)
  }

  /// Mount an observer for `key`.
  ///
  /// Starts a fetch when the query is enabled, the session is authenticated,
  /// no fetch for the key is already running, and the entry has no data or
  /// stale data. Otherwise the observer just joins the existing entry.
  pub fn use_query<T, F, Fut>(
    &self,
    key: QueryKey,
    fetch_fn: F,
    options: QueryOptions,
  ) -> QueryObserver<T>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let fetcher: ErasedFetcher = Arc::new(move || {
      let fetch = fetch_fn();
      async move {
        fetch
          .await
          .map(|data| Arc::new(data) as Payload)
          .map_err(QueryError::from)
      }
      .boxed()
    });
    let stale_time = options.stale_time.unwrap_or(self.inner.options.stale_time);
    let now = Instant::now();

    let mut store = self.inner.store.lock();
    store.collect_garbage(now, self.inner.options.gc_time);

    let entry = store
      .entries
      .entry(key.clone())
      .or_insert_with(|| Entry::new(stale_time));
    entry.fetcher = Some(fetcher);
    entry.stale_time = stale_time;
    entry.observers += 1;
    if options.enabled {
      entry.enabled_observers += 1;
    }
    entry.unobserved_since = None;
    let receiver = entry.version.subscribe();

    if options.enabled && self.inner.session.is_authenticated() && entry.needs_fetch(now) {
      self.start_fetch(&mut store, &key);
    }
    drop(store);

    QueryObserver::new(self.clone(), key, options.enabled, receiver)
  }

  /// Read through the cache once: fresh data is returned as is, otherwise
  /// the fetch runs (or joins the running one) and its outcome is returned.
  pub async fn fetch_query<T, F, Fut>(
    &self,
    key: QueryKey,
    fetch_fn: F,
    options: QueryOptions,
  ) -> Result<Arc<T>, QueryError>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let mut observer = self.use_query(key.clone(), fetch_fn, options);
    let result = observer.settled().await;
    match (result.data, result.error) {
      (Some(data), None) => Ok(data),
      (_, Some(error)) => Err(error),
      (None, None) => Err(QueryError::Disabled {
        key: key.to_string(),
      }),
    }
  }

  /// Cached payload for `key`, without fetching.
  pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
    let store = self.inner.store.lock();
    let payload = store.entries.get(key)?.data.clone()?;
    payload.downcast::<T>().ok()
  }

  /// Mark every matching entry stale.
  ///
  /// Entries with a mounted, enabled observer refetch in the background;
  /// the rest refetch on their next read. Returns how many entries matched.
  pub fn invalidate_queries(&self, filter: &QueryFilter) -> usize {
    let authenticated = self.inner.session.is_authenticated();
    let mut store = self.inner.store.lock();

    let mut marked = 0;
    let mut refetch = Vec::new();
    for (key, entry) in store.entries.iter_mut() {
      if !filter.matches(key) {
        continue;
      }
      entry.invalidated = true;
      entry.notify();
      marked += 1;
      if authenticated && entry.enabled_observers > 0 {
        refetch.push(key.clone());
      }
    }

    for key in &refetch {
      self.start_fetch(&mut store, key);
    }

    debug!(filter = ?filter, marked, refetching = refetch.len(), "invalidated queries");
    marked
  }

  /// Run a mutation and invalidate `invalidates` once it succeeds.
  ///
  /// A failed mutation wrote nothing, so caches stay untouched. The
  /// invalidation only schedules refetches and never delays the outcome.
  pub async fn mutate<T, Fut>(&self, mutation: Fut, invalidates: &[QueryFilter]) -> Result<T, ApiError>
  where
    Fut: Future<Output = Result<T, ApiError>>,
  {
    let outcome = mutation.await;
    match &outcome {
      Ok(_) => {
        for filter in invalidates {
          self.invalidate_queries(filter);
        }
      }
      Err(error) => debug!(error = %error, "mutation failed, caches left untouched"),
    }
    outcome
  }

  /// Switch the session's auth state.
  ///
  /// Leaving an authenticated session (or switching credentials) aborts all
  /// fetches, discards any result still on its way, and clears every entry.
  /// Becoming authenticated fetches each mounted, enabled query once.
  pub fn set_auth(&self, context: AuthContext) {
    let now = Instant::now();
    let mut store = self.inner.store.lock();
    let previous = self.inner.session.replace(context.clone());

    let ended = previous.is_authenticated()
      && (!context.is_authenticated() || previous.bearer() != context.bearer());
    if ended {
      store.epoch += 1;
      for entry in store.entries.values_mut() {
        entry.reset();
      }
      store.entries.retain(|_, entry| entry.observers > 0);
      info!(status = ?context.status(), "session ended, query cache cleared");
    }

    if context.is_authenticated() && (ended || !previous.is_authenticated()) {
      let started = self.fetch_mounted(&mut store, now);
      debug!(queries = started, "session authenticated, fetching mounted queries");
    }
  }

  /// Drop unobserved entries whose retention window has elapsed.
  ///
  /// Also runs on every mount, so there is no background timer to leak.
  pub fn collect_garbage(&self) -> usize {
    let mut store = self.inner.store.lock();
    store.collect_garbage(Instant::now(), self.inner.options.gc_time)
  }

  /// Abort every fetch and forget every payload.
  ///
  /// Entries with mounted observers stay registered so their observer counts
  /// remain true; enabled ones refetch if the session is signed in.
  pub fn clear(&self) {
    let now = Instant::now();
    let mut store = self.inner.store.lock();
    store.epoch += 1;
    for entry in store.entries.values_mut() {
      entry.reset();
    }
    store.entries.retain(|_, entry| entry.observers > 0);
    debug!(mounted = store.entries.len(), "query cache cleared");

    if self.inner.session.is_authenticated() {
      self.fetch_mounted(&mut store, now);
    }
  }

  /// Start a fetch for every entry an enabled observer is waiting on.
  fn fetch_mounted(&self, store: &mut Store, now: Instant) -> usize {
    let pending: Vec<QueryKey> = store
      .entries
      .iter()
      .filter(|(_, entry)| entry.enabled_observers > 0 && entry.needs_fetch(now))
      .map(|(key, _)| key.clone())
      .collect();
    for key in &pending {
      self.start_fetch(store, key);
    }
    pending.len()
  }

  pub(crate) fn snapshot(&self, key: &QueryKey) -> Option<Snapshot> {
    let store = self.inner.store.lock();
    store.entries.get(key).map(|entry| entry.snapshot(Instant::now()))
  }

  pub(crate) fn unmount(&self, key: &QueryKey, enabled: bool) {
    let mut store = self.inner.store.lock();
    if let Some(entry) = store.entries.get_mut(key) {
      entry.observers = entry.observers.saturating_sub(1);
      if enabled {
        entry.enabled_observers = entry.enabled_observers.saturating_sub(1);
      }
      if entry.observers == 0 {
        entry.unobserved_since = Some(Instant::now());
      }
    }
  }

  pub(crate) fn set_observer_enabled(&self, key: &QueryKey, was: bool, enabled: bool) {
    if was == enabled {
      return;
    }
    let mut store = self.inner.store.lock();
    let Some(entry) = store.entries.get_mut(key) else {
      return;
    };
    if enabled {
      entry.enabled_observers += 1;
    } else {
      entry.enabled_observers = entry.enabled_observers.saturating_sub(1);
    }
    let should_fetch =
      enabled && self.inner.session.is_authenticated() && entry.needs_fetch(Instant::now());
    if should_fetch {
      self.start_fetch(&mut store, key);
    }
  }

  /// Force a new fetch for `key`, superseding any running one.
  pub(crate) fn refetch(&self, key: &QueryKey) -> bool {
    if !self.inner.session.is_authenticated() {
      return false;
    }
    let mut store = self.inner.store.lock();
    self.start_fetch(&mut store, key)
  }

  /// Spawn the entry's fetcher. Any fetch already running for the key is
  /// aborted and can no longer write the entry.
  fn start_fetch(&self, store: &mut Store, key: &QueryKey) -> bool {
    let id = store.next_fetch_id;
    store.next_fetch_id += 1;
    let epoch = store.epoch;

    let Some(entry) = store.entries.get_mut(key) else {
      return false;
    };
    let Some(fetcher) = entry.fetcher.clone() else {
      return false;
    };
    if let Some(previous) = entry.in_flight.take() {
      debug!(key = %key, superseded = previous.id, fetch = id, "superseding running fetch");
      previous.handle.abort();
    }
    if entry.data.is_none() {
      entry.status = QueryStatus::Loading;
    }

    debug!(key = %key, fingerprint = %key.fingerprint(), fetch = id, "fetching");
    let client = Arc::downgrade(&self.inner);
    let task_key = key.clone();
    let handle = tokio::spawn(async move {
      let result = fetcher().await;
      // The client may be gone by now; nothing to write into then
      if let Some(inner) = client.upgrade() {
        QueryClient { inner }.complete_fetch(&task_key, id, epoch, result);
      }
    });

    entry.in_flight = Some(InFlight { id, handle });
    entry.notify();
    true
  }

  fn complete_fetch(
    &self,
    key: &QueryKey,
    id: u64,
    epoch: u64,
    result: Result<Payload, QueryError>,
  ) {
    let mut store = self.inner.store.lock();
    if store.epoch != epoch {
      debug!(key = %key, fetch = id, "discarding result from an ended session");
      return;
    }
    let Some(entry) = store.entries.get_mut(key) else {
      return;
    };
    if entry.in_flight.as_ref().map(|f| f.id) != Some(id) {
      debug!(key = %key, fetch = id, "discarding superseded result");
      return;
    }
    entry.in_flight = None;

    match result {
      Ok(data) => {
        debug!(key = %key, fetch = id, "fetched");
        entry.data = Some(data);
        entry.error = None;
        entry.status = QueryStatus::Success;
        entry.updated_at = Some(Instant::now());
        entry.invalidated = false;
      }
      Err(error) => {
        warn!(key = %key, fetch = id, error = %error, "fetch failed");
        entry.error = Some(error);
        entry.status = QueryStatus::Error;
      }
    }
    entry.notify();
  }
}

impl std::fmt::Debug for QueryClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryClient")
      .field("session", &self.inner.session)
      .field("options", &self.inner.options)
      .field("entries", &self.len())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::future::{ready, Ready};
  use std::sync::atomic::{AtomicU32, Ordering};

  fn authed_client() -> QueryClient {
    QueryClient::with_session(
      CacheOptions::default(),
      Session::new(AuthContext::authenticated("token")),
    )
  }

  fn counted<T>(
    calls: &Arc<AtomicU32>,
    value: T,
  ) -> impl Fn() -> Ready<Result<T, ApiError>> + Clone + Send + Sync + 'static
  where
    T: Clone + Send + Sync + 'static,
  {
    let calls = calls.clone();
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      ready(Ok(value.clone()))
    }
  }

  fn failing(calls: &Arc<AtomicU32>) -> impl Fn() -> Ready<Result<u32, ApiError>> + Send + Sync {
    let calls = calls.clone();
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      ready(Err(ApiError::Status {
        status: 500,
        message: Some("boom".to_string()),
      }))
    }
  }

  fn key(page: u32) -> QueryKey {
    QueryKey::new("collections").with(page)
  }

  #[tokio::test]
  async fn test_concurrent_mounts_share_one_fetch() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));
    let fetch = counted(&calls, vec![1, 2, 3]);

    let mut first = client.use_query(key(1), fetch.clone(), QueryOptions::default());
    let mut second = client.use_query(key(1), fetch, QueryOptions::default());
    assert!(first.result().is_loading);

    let a = first.settled().await;
    let b = second.settled().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.data(), Some(&vec![1, 2, 3]));
    assert_eq!(b.data(), Some(&vec![1, 2, 3]));
    assert!(Arc::ptr_eq(a.data.as_ref().unwrap(), b.data.as_ref().unwrap()));
  }

  #[tokio::test]
  async fn test_fresh_data_is_not_refetched() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));

    let mut first = client.use_query(key(1), counted(&calls, 1u32), QueryOptions::default());
    first.settled().await;
    drop(first);

    let mut again = client.use_query(key(1), counted(&calls, 1u32), QueryOptions::default());
    let result = again.result();
    assert!(!result.is_fetching);
    assert_eq!(result.data(), Some(&1));
    again.settled().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_stale_data_refetches_on_mount() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));
    let options = QueryOptions::default().stale_time(StaleTime::After(Duration::ZERO));

    let mut first = client.use_query(key(1), counted(&calls, 1u32), options);
    first.settled().await;

    let mut second = client.use_query(key(1), counted(&calls, 2u32), options);
    let during = second.result();
    // Background refetch: stale data stays visible, not a loading state
    assert!(during.is_fetching);
    assert!(!during.is_loading);
    assert_eq!(during.data(), Some(&1));

    let after = second.settled().await;
    assert_eq!(after.data(), Some(&2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_infinite_stale_time_fetches_once() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));

    for _ in 0..3 {
      let mut observer =
        client.use_query(QueryKey::new("tagsSidebar"), counted(&calls, 7u32), QueryOptions::infinite());
      observer.settled().await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_disabled_query_stays_idle() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));

    let mut observer = client.use_query(
      key(1),
      counted(&calls, 1u32),
      QueryOptions::default().enabled(false),
    );
    let result = observer.settled().await;
    assert_eq!(result.status, QueryStatus::Idle);
    assert!(!result.is_loading);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    observer.set_enabled(true);
    let result = observer.settled().await;
    assert_eq!(result.data(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_no_fetch_until_authenticated() {
    let client = QueryClient::new(CacheOptions::default());
    let calls = Arc::new(AtomicU32::new(0));

    let mut enabled_a = client.use_query(key(1), counted(&calls, 1u32), QueryOptions::default());
    let mut enabled_b = client.use_query(key(2), counted(&calls, 2u32), QueryOptions::default());
    let mut disabled = client.use_query(
      key(3),
      counted(&calls, 3u32),
      QueryOptions::default().enabled(false),
    );
    assert_eq!(enabled_a.settled().await.status, QueryStatus::Idle);

    client.set_auth(AuthContext::loading());
    let result = enabled_a.settled().await;
    assert_eq!(result.status, QueryStatus::Idle);
    assert!(result.error.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    client.set_auth(AuthContext::authenticated("token"));
    assert_eq!(enabled_a.settled().await.data(), Some(&1));
    assert_eq!(enabled_b.settled().await.data(), Some(&2));
    assert_eq!(disabled.settled().await.status, QueryStatus::Idle);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_refetch_supersedes_running_fetch() {
    let client = authed_client();
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut observer = client.use_query(
      key(1),
      move || {
        let counter = counter_clone.clone();
        async move {
          let call = counter.fetch_add(1, Ordering::SeqCst);
          // The first fetch is the slow one
          let delay = if call == 0 { 50 } else { 10 };
          tokio::time::sleep(Duration::from_millis(delay)).await;
          Ok::<_, ApiError>(call)
        }
      },
      QueryOptions::default(),
    );

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(observer.refetch());

    let result = observer.settled().await;
    assert_eq!(result.data(), Some(&1));

    // Give the first fetch time to finish if it were still running
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(observer.result().data(), Some(&1));
  }

  #[tokio::test]
  async fn test_pages_are_independent_entries() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));

    let mut page_one = client.use_query(key(1), counted(&calls, "one"), QueryOptions::default());
    page_one.settled().await;

    let mut page_two = client.use_query(key(2), counted(&calls, "two"), QueryOptions::default());
    page_two.settled().await;

    assert_eq!(page_one.result().data(), Some(&"one"));
    assert_eq!(page_two.result().data(), Some(&"two"));
    assert_eq!(client.get_query_data::<&str>(&key(1)).as_deref(), Some(&"one"));
  }

  #[tokio::test]
  async fn test_invalidation_refetches_on_next_read() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));

    client
      .fetch_query(key(1), counted(&calls, 1u32), QueryOptions::default())
      .await
      .unwrap();
    client
      .fetch_query(QueryKey::new("tagsAll"), counted(&calls, 1u32), QueryOptions::default())
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert_eq!(client.invalidate_queries(&QueryFilter::Kind("collections")), 1);

    client
      .fetch_query(key(1), counted(&calls, 1u32), QueryOptions::default())
      .await
      .unwrap();
    client
      .fetch_query(QueryKey::new("tagsAll"), counted(&calls, 1u32), QueryOptions::default())
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_invalidation_refetches_mounted_queries() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));

    let mut observer = client.use_query(key(1), counted(&calls, 1u32), QueryOptions::infinite());
    observer.settled().await;

    client.invalidate_queries(&QueryFilter::Kind("collections"));
    assert!(observer.result().is_fetching);
    observer.settled().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!observer.result().is_stale);
  }

  #[tokio::test]
  async fn test_error_without_data() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));

    let mut observer = client.use_query(key(1), failing(&calls), QueryOptions::default());
    let result = observer.settled().await;
    assert_eq!(result.status, QueryStatus::Error);
    assert!(result.is_error);
    assert!(result.data.is_none());
    assert!(matches!(
      result.error.as_ref().and_then(|e| e.api()),
      Some(ApiError::Status { status: 500, .. })
    ));
  }

  #[tokio::test]
  async fn test_error_keeps_stale_data() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));

    let mut observer = client.use_query(key(1), counted(&calls, 5u32), QueryOptions::default());
    observer.settled().await;
    drop(observer);

    client.invalidate_queries(&QueryFilter::Exact(key(1)));
    let mut observer = client.use_query(key(1), failing(&calls), QueryOptions::default());
    let result = observer.settled().await;
    assert_eq!(result.status, QueryStatus::Error);
    assert_eq!(result.data(), Some(&5));
    assert!(result.error.is_some());
    assert!(!result.is_error);
  }

  #[tokio::test]
  async fn test_logout_clears_and_discards_late_results() {
    let client = authed_client();

    let mut observer = client.use_query(
      key(1),
      || async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok::<_, ApiError>(1u32)
      },
      QueryOptions::default(),
    );
    assert!(observer.result().is_loading);

    client.set_auth(AuthContext::unauthenticated());
    tokio::time::sleep(Duration::from_millis(60)).await;

    let result = observer.result();
    assert_eq!(result.status, QueryStatus::Idle);
    assert!(result.data.is_none());
    assert!(!result.is_fetching);
    assert!(client.get_query_data::<u32>(&key(1)).is_none());
  }

  #[tokio::test]
  async fn test_logout_drops_unobserved_entries() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));

    client
      .fetch_query(key(1), counted(&calls, 1u32), QueryOptions::default())
      .await
      .unwrap();
    assert!(client.contains(&key(1)));

    client.set_auth(AuthContext::unauthenticated());
    assert!(client.is_empty());
  }

  #[tokio::test]
  async fn test_garbage_collection_after_retention_window() {
    let client = QueryClient::with_session(
      CacheOptions {
        gc_time: Duration::ZERO,
        ..CacheOptions::default()
      },
      Session::new(AuthContext::authenticated("token")),
    );
    let calls = Arc::new(AtomicU32::new(0));

    let mut observer = client.use_query(key(1), counted(&calls, 1u32), QueryOptions::default());
    observer.settled().await;
    assert_eq!(client.collect_garbage(), 0);

    drop(observer);
    assert_eq!(client.collect_garbage(), 1);
    assert!(!client.contains(&key(1)));
  }

  #[tokio::test]
  async fn test_type_mismatch_is_reported() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));

    client
      .fetch_query(key(1), counted(&calls, 1u32), QueryOptions::default())
      .await
      .unwrap();
    let mut observer = client.use_query(key(1), counted(&calls, "x"), QueryOptions::default());
    let result = observer.settled().await;
    assert!(result.is_error);
    assert!(matches!(result.error, Some(QueryError::TypeMismatch { .. })));
  }

  #[tokio::test]
  async fn test_fetch_query_when_signed_out() {
    let client = QueryClient::new(CacheOptions::default());
    let calls = Arc::new(AtomicU32::new(0));

    let outcome = client
      .fetch_query(key(1), counted(&calls, 1u32), QueryOptions::default())
      .await;
    assert!(matches!(outcome, Err(QueryError::Disabled { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_failed_mutation_does_not_invalidate() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));

    client
      .fetch_query(key(1), counted(&calls, 1u32), QueryOptions::default())
      .await
      .unwrap();

    let outcome: Result<(), ApiError> = client
      .mutate(
        async {
          Err(ApiError::Conflict {
            message: Some("taken".to_string()),
          })
        },
        &[QueryFilter::Kind("collections")],
      )
      .await;
    assert!(outcome.is_err());

    client
      .fetch_query(key(1), counted(&calls, 1u32), QueryOptions::default())
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_clear_keeps_mounted_entries_accounted() {
    let client = QueryClient::with_session(
      CacheOptions {
        gc_time: Duration::ZERO,
        ..CacheOptions::default()
      },
      Session::new(AuthContext::authenticated("token")),
    );
    let calls = Arc::new(AtomicU32::new(0));

    let mut first = client.use_query(key(1), counted(&calls, 1u32), QueryOptions::default());
    first.settled().await;
    client.clear();
    assert!(first.result().data.is_none());

    let mut second = client.use_query(key(1), counted(&calls, 1u32), QueryOptions::default());
    assert_eq!(second.settled().await.data(), Some(&1));
    drop(first);

    assert_eq!(client.collect_garbage(), 0);
    assert!(client.contains(&key(1)));
    assert_eq!(second.result().data(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_clear_drops_unobserved_entries() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));

    client
      .fetch_query(key(1), counted(&calls, 1u32), QueryOptions::default())
      .await
      .unwrap();
    client.clear();
    assert!(client.is_empty());
  }

  #[tokio::test]
  async fn test_token_switch_starts_a_new_session() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));

    let mut mounted = client.use_query(key(1), counted(&calls, 1u32), QueryOptions::default());
    mounted.settled().await;
    client
      .fetch_query(key(2), counted(&calls, 2u32), QueryOptions::default())
      .await
      .unwrap();

    client.set_auth(AuthContext::authenticated("other-token"));
    assert!(client.get_query_data::<u32>(&key(1)).is_none());
    assert!(!client.contains(&key(2)));
    assert_eq!(client.session().bearer().as_deref(), Some("other-token"));

    let result = mounted.settled().await;
    assert_eq!(result.data(), Some(&1));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_same_token_keeps_the_cache() {
    let client = authed_client();
    let calls = Arc::new(AtomicU32::new(0));

    client
      .fetch_query(key(1), counted(&calls, 1u32), QueryOptions::default())
      .await
      .unwrap();
    client.set_auth(AuthContext::authenticated("token"));
    assert_eq!(client.get_query_data::<u32>(&key(1)).as_deref(), Some(&1));
  }
}
