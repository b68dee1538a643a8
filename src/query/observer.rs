use std::marker::PhantomData;
use tokio::sync::watch;

use super::client::QueryClient;
use super::key::QueryKey;
use super::state::QueryResult;

/// A mounted subscription to one cache entry.
///
/// Holding the observer keeps the entry alive and lets invalidations and
/// auth transitions refetch it. Dropping it unmounts; a fetch still running
/// is allowed to finish and the entry is then retained until garbage
/// collection.
pub struct QueryObserver<T> {
  client: QueryClient,
  key: QueryKey,
  enabled: bool,
  receiver: watch::Receiver<u64>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
  pub(crate) fn new(
    client: QueryClient,
    key: QueryKey,
    enabled: bool,
    receiver: watch::Receiver<u64>,
  ) -> Self {
    Self {
      client,
      key,
      enabled,
      receiver,
      _marker: PhantomData,
    }
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  /// Current state of the entry.
  pub fn result(&self) -> QueryResult<T> {
    match self.client.snapshot(&self.key) {
      Some(snapshot) => QueryResult::from_snapshot(&self.key, snapshot),
      None => QueryResult::idle(),
    }
  }

  /// Wait for the next change to the entry.
  ///
  /// Returns `false` once the entry is gone (the cache was cleared).
  pub async fn changed(&mut self) -> bool {
    self.receiver.changed().await.is_ok()
  }

  /// Wait until no fetch is running for the entry, then return its state.
  pub async fn settled(&mut self) -> QueryResult<T> {
    loop {
      let result = self.result();
      if !result.is_fetching {
        return result;
      }
      if self.receiver.changed().await.is_err() {
        return self.result();
      }
    }
  }

  /// Force a fetch now, superseding a running one.
  ///
  /// No-op (returns `false`) while disabled or signed out.
  pub fn refetch(&self) -> bool {
    self.enabled && self.client.refetch(&self.key)
  }

  /// Flip the caller-intent half of the enablement gate.
  pub fn set_enabled(&mut self, enabled: bool) {
    self.client.set_observer_enabled(&self.key, self.enabled, enabled);
    self.enabled = enabled;
  }
}

impl<T> Drop for QueryObserver<T> {
  fn drop(&mut self) {
    self.client.unmount(&self.key, self.enabled);
  }
}

impl<T> std::fmt::Debug for QueryObserver<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryObserver")
      .field("key", &self.key)
      .field("enabled", &self.enabled)
      .finish_non_exhaustive()
  }
}
