//! Authenticated HTTP calls to the catalogue API.

use futures::future::{BoxFuture, FutureExt};
use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use super::error::ApiError;
use crate::session::Session;

/// Request body variants the API accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
  Form(Vec<(String, String)>),
  Json(Value),
}

/// A call relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
  pub method: Method,
  pub path: String,
  pub query: Vec<(String, String)>,
  pub body: Option<RequestBody>,
}

impl ApiRequest {
  pub fn new(method: Method, path: impl Into<String>) -> Self {
    Self {
      method,
      path: path.into(),
      query: Vec::new(),
      body: None,
    }
  }

  pub fn get(path: impl Into<String>) -> Self {
    Self::new(Method::GET, path)
  }

  pub fn put(path: impl Into<String>) -> Self {
    Self::new(Method::PUT, path)
  }

  pub fn patch(path: impl Into<String>) -> Self {
    Self::new(Method::PATCH, path)
  }

  pub fn delete(path: impl Into<String>) -> Self {
    Self::new(Method::DELETE, path)
  }

  pub fn with_query(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
    self.query.extend(pairs);
    self
  }

  pub fn with_form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
  where
    K: Into<String>,
    V: Into<String>,
  {
    let fields = fields
      .into_iter()
      .map(|(k, v)| (k.into(), v.into()))
      .collect();
    self.body = Some(RequestBody::Form(fields));
    self
  }

  /// Path plus encoded query string, as it would appear after the base URL.
  pub fn target(&self) -> String {
    if self.query.is_empty() {
      return self.path.clone();
    }
    let query = url::form_urlencoded::Serializer::new(String::new())
      .extend_pairs(&self.query)
      .finish();
    format!("{}?{}", self.path, query)
  }
}

/// Capability to perform API calls.
///
/// The cache layer treats this as opaque: no retries, no cancellation
/// primitive required.
pub trait Transport: Send + Sync {
  fn request(&self, request: ApiRequest) -> BoxFuture<'_, Result<Value, ApiError>>;
}

/// Decode a response document into the shape expected for `resource`.
pub fn decode<T: DeserializeOwned>(resource: &'static str, value: Value) -> Result<T, ApiError> {
  serde_json::from_value(value).map_err(|source| ApiError::Decode { resource, source })
}

#[derive(Deserialize)]
struct ErrorBody {
  message: Option<String>,
}

fn error_message(body: &str) -> Option<String> {
  serde_json::from_str::<ErrorBody>(body)
    .ok()
    .and_then(|b| b.message)
    .filter(|m| !m.is_empty())
}

/// reqwest-backed transport that attaches the session's bearer credential.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: Url,
  session: Session,
}

impl HttpTransport {
  pub fn new(base_url: &str, session: Session, timeout: Duration) -> Result<Self, ApiError> {
    let mut base_url = Url::parse(base_url)?;
    // Url::join drops the last segment unless the base ends with a slash
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("propcat/", env!("CARGO_PKG_VERSION")))
      .build()?;

    Ok(Self {
      client,
      base_url,
      session,
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
    let url = self.base_url.join(request.path.trim_start_matches('/'))?;
    debug!(method = %request.method, target = %request.target(), "api request");

    let mut builder = self
      .client
      .request(request.method.clone(), url)
      .header(ACCEPT, "application/json");
    if !request.query.is_empty() {
      builder = builder.query(&request.query);
    }
    if let Some(token) = self.session.bearer() {
      builder = builder.bearer_auth(token);
    }
    builder = match request.body {
      Some(RequestBody::Form(fields)) => builder.form(&fields),
      Some(RequestBody::Json(value)) => builder.json(&value),
      None => builder,
    };

    let response = builder.send().await?;
    let status = response.status();
    let body = response.text().await?;
    trace!(status = status.as_u16(), bytes = body.len(), "api response");

    if status == StatusCode::CONFLICT {
      return Err(ApiError::Conflict {
        message: error_message(&body),
      });
    }
    if !status.is_success() {
      return Err(ApiError::Status {
        status: status.as_u16(),
        message: error_message(&body),
      });
    }

    if body.trim().is_empty() {
      return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|source| ApiError::Decode {
      resource: "response",
      source,
    })
  }
}

impl Transport for HttpTransport {
  fn request(&self, request: ApiRequest) -> BoxFuture<'_, Result<Value, ApiError>> {
    self.send(request).boxed()
  }
}
