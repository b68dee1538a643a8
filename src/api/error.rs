use thiserror::Error;

/// Normalized failure of a call to the catalogue API.
#[derive(Debug, Error)]
pub enum ApiError {
  /// The request never produced a response
  #[error("HTTP request failed: {0}")]
  Network(#[from] reqwest::Error),

  /// Non-2xx response other than a conflict
  #[error("API returned status {status}{}", detail(.message))]
  Status { status: u16, message: Option<String> },

  /// 409: the write clashes with existing data (e.g. a duplicate name)
  #[error("conflict{}", detail(.message))]
  Conflict { message: Option<String> },

  /// The response did not have the shape expected for the resource
  #[error("failed to decode {resource} response: {source}")]
  Decode {
    resource: &'static str,
    #[source]
    source: serde_json::Error,
  },

  /// A write was attempted without an authenticated session
  #[error("not signed in")]
  Unauthenticated,

  #[error("invalid request URL: {0}")]
  InvalidUrl(#[from] url::ParseError),
}

fn detail(message: &Option<String>) -> String {
  message
    .as_deref()
    .map(|m| format!(": {}", m))
    .unwrap_or_default()
}

impl ApiError {
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Status { status, .. } => Some(*status),
      Self::Conflict { .. } => Some(409),
      Self::Network(error) => error.status().map(|s| s.as_u16()),
      _ => None,
    }
  }

  /// Server-provided message, if any.
  pub fn message(&self) -> Option<&str> {
    match self {
      Self::Status { message, .. } | Self::Conflict { message } => message.as_deref(),
      _ => None,
    }
  }

  pub fn is_unauthorized(&self) -> bool {
    matches!(self, Self::Unauthenticated) || matches!(self.status(), Some(401))
  }
}
