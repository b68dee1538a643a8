//! Authentication state shared between the query cache and the transport.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthStatus {
  #[default]
  Unauthenticated,
  /// Session is being resolved; nothing runs and nothing fails meanwhile
  Loading,
  Authenticated,
}

/// Session status plus the opaque bearer credential.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
  status: AuthStatus,
  token: Option<String>,
}

impl AuthContext {
  pub fn unauthenticated() -> Self {
    Self::default()
  }

  pub fn loading() -> Self {
    Self {
      status: AuthStatus::Loading,
      token: None,
    }
  }

  pub fn authenticated(token: impl Into<String>) -> Self {
    Self {
      status: AuthStatus::Authenticated,
      token: Some(token.into()),
    }
  }

  pub fn status(&self) -> AuthStatus {
    self.status
  }

  pub fn is_authenticated(&self) -> bool {
    self.status == AuthStatus::Authenticated
  }

  /// The bearer credential, only while authenticated.
  pub fn bearer(&self) -> Option<&str> {
    match self.status {
      AuthStatus::Authenticated => self.token.as_deref(),
      _ => None,
    }
  }
}

impl fmt::Debug for AuthContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AuthContext")
      .field("status", &self.status)
      .field("token", &self.token.as_ref().map(|_| "<redacted>"))
      .finish()
  }
}

/// Shared handle to the current [`AuthContext`].
///
/// The query client owns the transitions; the transport only reads the bearer
/// at request time, so a fetch started in one session never borrows another
/// session's credential.
#[derive(Clone, Default)]
pub struct Session {
  inner: Arc<RwLock<AuthContext>>,
}

impl Session {
  pub fn new(context: AuthContext) -> Self {
    Self {
      inner: Arc::new(RwLock::new(context)),
    }
  }

  /// Snapshot of the current context.
  pub fn context(&self) -> AuthContext {
    self.inner.read().clone()
  }

  pub fn status(&self) -> AuthStatus {
    self.inner.read().status
  }

  pub fn is_authenticated(&self) -> bool {
    self.inner.read().is_authenticated()
  }

  pub fn bearer(&self) -> Option<String> {
    self.inner.read().bearer().map(String::from)
  }

  /// Swap in a new context, returning the previous one.
  pub(crate) fn replace(&self, context: AuthContext) -> AuthContext {
    std::mem::replace(&mut *self.inner.write(), context)
  }
}

impl fmt::Debug for Session {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Session").field(&*self.inner.read()).finish()
  }
}
