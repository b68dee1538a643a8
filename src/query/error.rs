use std::sync::Arc;
use thiserror::Error;

use crate::api::ApiError;

/// Failure recorded on a cache entry.
///
/// Entries hand the same error to every observer, so the transport error is
/// shared behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
  #[error(transparent)]
  Api(Arc<ApiError>),

  /// The entry holds a payload of another type than the observer asked for
  #[error("cached data for {key} is not a {expected}")]
  TypeMismatch { key: String, expected: &'static str },

  /// Nothing ran: the query is disabled or the session is not authenticated
  #[error("query {key} did not run (disabled or not signed in)")]
  Disabled { key: String },
}

impl QueryError {
  pub fn api(&self) -> Option<&ApiError> {
    match self {
      Self::Api(error) => Some(error.as_ref()),
      _ => None,
    }
  }

  pub fn is_conflict(&self) -> bool {
    matches!(self.api(), Some(ApiError::Conflict { .. }))
  }
}

impl From<ApiError> for QueryError {
  fn from(error: ApiError) -> Self {
    Self::Api(Arc::new(error))
  }
}
