//! In-memory transport for tests.

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

use super::error::ApiError;
use super::transport::{ApiRequest, Transport};

type Responder = Box<dyn Fn(&ApiRequest) -> Result<Value, ApiError> + Send + Sync>;

pub(crate) struct MockTransport {
  requests: Mutex<Vec<ApiRequest>>,
  respond: Responder,
}

impl MockTransport {
  pub fn new<F>(respond: F) -> Arc<Self>
  where
    F: Fn(&ApiRequest) -> Result<Value, ApiError> + Send + Sync + 'static,
  {
    Arc::new(Self {
      requests: Mutex::new(Vec::new()),
      respond: Box::new(respond),
    })
  }

  pub fn requests(&self) -> Vec<ApiRequest> {
    self.requests.lock().clone()
  }

  /// Requests whose path equals `path`.
  pub fn count(&self, path: &str) -> usize {
    self.requests.lock().iter().filter(|r| r.path == path).count()
  }
}

impl Transport for MockTransport {
  fn request(&self, request: ApiRequest) -> BoxFuture<'_, Result<Value, ApiError>> {
    let response = (self.respond)(&request);
    self.requests.lock().push(request);
    async move {
      tokio::task::yield_now().await;
      response
    }
    .boxed()
  }
}

/// Single-page listing body around `items`.
pub(crate) fn page_json(items: Value) -> Value {
  json!({
    "data": items,
    "links": {},
    "meta": { "current_page": 1, "last_page": 1 }
  })
}
