//! Query options and the state observers read back.

use std::any::type_name;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::client::Snapshot;
use super::error::QueryError;
use super::key::QueryKey;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// Nothing fetched yet (disabled, not signed in, or freshly cleared)
  Idle,
  /// First fetch in flight, no data yet
  Loading,
  /// Last fetch succeeded
  Success,
  /// Last fetch failed
  Error,
}

/// How long a successful payload stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleTime {
  After(Duration),
  /// Never stale for the rest of the session (reference data)
  Infinite,
}

impl StaleTime {
  pub fn is_elapsed(&self, fetched_at: Instant, now: Instant) -> bool {
    match self {
      Self::After(duration) => now.saturating_duration_since(fetched_at) >= *duration,
      Self::Infinite => false,
    }
  }
}

/// Per-observer options.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
  /// Caller intent; combined with the auth gate
  pub enabled: bool,
  /// Falls back to the client default when `None`
  pub stale_time: Option<StaleTime>,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      enabled: true,
      stale_time: None,
    }
  }
}

impl QueryOptions {
  pub fn enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  pub fn stale_time(mut self, stale_time: StaleTime) -> Self {
    self.stale_time = Some(stale_time);
    self
  }

  /// Shortcut for reference data that is fetched once per session.
  pub fn infinite() -> Self {
    Self::default().stale_time(StaleTime::Infinite)
  }
}

/// What an observer sees of its entry at one point in time.
#[derive(Debug)]
pub struct QueryResult<T> {
  pub status: QueryStatus,
  /// Most recent successful payload for this exact key
  pub data: Option<Arc<T>>,
  /// Latest failure, kept alongside stale data
  pub error: Option<QueryError>,
  /// No data yet and a fetch is in flight
  pub is_loading: bool,
  /// Any fetch in flight, including background refetches
  pub is_fetching: bool,
  /// A fetch failed and there is no data to fall back on
  pub is_error: bool,
  pub is_stale: bool,
  pub updated_at: Option<Instant>,
}

impl<T> Clone for QueryResult<T> {
  fn clone(&self) -> Self {
    Self {
      status: self.status,
      data: self.data.clone(),
      error: self.error.clone(),
      is_loading: self.is_loading,
      is_fetching: self.is_fetching,
      is_error: self.is_error,
      is_stale: self.is_stale,
      updated_at: self.updated_at,
    }
  }
}

impl<T: Send + Sync + 'static> QueryResult<T> {
  pub(crate) fn idle() -> Self {
    Self {
      status: QueryStatus::Idle,
      data: None,
      error: None,
      is_loading: false,
      is_fetching: false,
      is_error: false,
      is_stale: false,
      updated_at: None,
    }
  }

  pub(crate) fn from_snapshot(key: &QueryKey, snapshot: Snapshot) -> Self {
    let (data, mismatch) = match snapshot.data {
      Some(payload) => match payload.downcast::<T>() {
        Ok(data) => (Some(data), None),
        Err(_) => (
          None,
          Some(QueryError::TypeMismatch {
            key: key.to_string(),
            expected: type_name::<T>(),
          }),
        ),
      },
      None => (None, None),
    };
    let error = mismatch.or(snapshot.error);
    let is_error = error.is_some() && data.is_none();

    Self {
      status: snapshot.status,
      is_loading: data.is_none() && snapshot.is_fetching,
      is_fetching: snapshot.is_fetching,
      is_stale: data.is_some() && snapshot.is_stale,
      updated_at: snapshot.updated_at,
      is_error,
      data,
      error,
    }
  }
}

impl<T> QueryResult<T> {
  pub fn is_success(&self) -> bool {
    self.status == QueryStatus::Success
  }

  pub fn data(&self) -> Option<&T> {
    self.data.as_deref()
  }

  pub fn error(&self) -> Option<&QueryError> {
    self.error.as_ref()
  }
}
