//! Writes against the catalogue API and the cache entries each one
//! invalidates.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use super::catalogue::Catalogue;
use super::error::ApiError;
use super::keys::ResourceKind;
use super::transport::ApiRequest;
use crate::query::QueryFilter;

const TITLE_MAX_CHARS: usize = 100;
const DESCRIPTION_MAX_CHARS: usize = 5000;

pub const DUPLICATE_COLLECTION_MESSAGE: &str = "A collection with that name already exists";

/// A form field that failed local checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
  pub field: &'static str,
  pub message: String,
}

impl ValidationError {
  fn new(field: &'static str, message: &str) -> Self {
    Self {
      field,
      message: message.to_string(),
    }
  }
}

#[derive(Debug, Error)]
pub enum MutationError {
  /// Rejected before any request was made
  #[error(transparent)]
  Validation(#[from] ValidationError),

  /// The server refused the write because it clashes with existing data
  #[error("{field}: {message}")]
  Conflict { field: &'static str, message: String },

  #[error(transparent)]
  Api(#[from] ApiError),
}

impl MutationError {
  /// Form field the error belongs to, if it belongs to one.
  pub fn field(&self) -> Option<&'static str> {
    match self {
      Self::Validation(error) => Some(error.field),
      Self::Conflict { field, .. } => Some(*field),
      Self::Api(_) => None,
    }
  }
}

/// Fields of the edit-collection form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionForm {
  pub title: String,
  pub description: String,
}

impl CollectionForm {
  pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      description: description.into(),
    }
  }

  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.title.trim().is_empty() {
      return Err(ValidationError::new(
        "title",
        "Title must be at least 1 character long",
      ));
    }
    if self.title.chars().count() > TITLE_MAX_CHARS {
      return Err(ValidationError::new(
        "title",
        "Title must be at most 100 characters long",
      ));
    }
    if self.description.chars().count() > DESCRIPTION_MAX_CHARS {
      return Err(ValidationError::new(
        "description",
        "Description must be at most 5000 characters long",
      ));
    }
    Ok(())
  }
}

#[derive(Deserialize)]
struct Ack {
  message: Option<String>,
}

/// Server confirmation message of a write, when it sends one.
fn acknowledgement(body: Value) -> Option<String> {
  serde_json::from_value::<Ack>(body).ok().and_then(|ack| ack.message)
}

fn filters(kinds: &[ResourceKind]) -> Vec<QueryFilter> {
  kinds.iter().copied().map(QueryFilter::from).collect()
}

const PROPERTY_LISTINGS: &[ResourceKind] = &[
  ResourceKind::Property,
  ResourceKind::Properties,
  ResourceKind::PropertiesInPolygon,
];

const PROPERTY_LIFECYCLE: &[ResourceKind] = &[
  ResourceKind::Property,
  ResourceKind::Properties,
  ResourceKind::PropertiesInPolygon,
  ResourceKind::TrashedProperties,
  ResourceKind::Statistics,
];

impl Catalogue {
  /// Send `request` and invalidate `kinds` if it succeeds.
  async fn write(
    &self,
    request: ApiRequest,
    kinds: &[ResourceKind],
  ) -> Result<Option<String>, ApiError> {
    if !self.client().session().is_authenticated() {
      return Err(ApiError::Unauthenticated);
    }
    let target = request.target();
    let method = request.method.clone();
    let transport = self.transport().clone();
    let body = self
      .client()
      .mutate(transport.request(request), &filters(kinds))
      .await?;
    info!(%method, %target, "write accepted");
    Ok(acknowledgement(body))
  }

  /// Rename or re-describe a collection.
  ///
  /// The form is checked locally first; a name clash comes back as a
  /// conflict on the `title` field and leaves the cache alone.
  pub async fn edit_collection(
    &self,
    id: &str,
    form: &CollectionForm,
  ) -> Result<Option<String>, MutationError> {
    form.validate()?;
    let request = ApiRequest::put(format!("me/lists/{}", id)).with_form([
      ("name", form.title.as_str()),
      ("description", form.description.as_str()),
    ]);
    let kinds = [
      ResourceKind::Collections,
      ResourceKind::CollectionsAll,
      ResourceKind::CollectionsSidebar,
      ResourceKind::Collection,
    ];
    match self.write(request, &kinds).await {
      Ok(message) => Ok(message),
      Err(ApiError::Conflict { .. }) => Err(MutationError::Conflict {
        field: "title",
        message: DUPLICATE_COLLECTION_MESSAGE.to_string(),
      }),
      Err(error) => Err(error.into()),
    }
  }

  /// Move a property to the trash.
  pub async fn trash_property(&self, id: &str) -> Result<Option<String>, MutationError> {
    let request = ApiRequest::delete(format!("me/properties/{}", id));
    Ok(self.write(request, PROPERTY_LIFECYCLE).await?)
  }

  pub async fn restore_property(&self, id: &str) -> Result<Option<String>, MutationError> {
    let request = ApiRequest::patch(format!("me/properties/{}/restore", id));
    Ok(self.write(request, PROPERTY_LIFECYCLE).await?)
  }

  pub async fn delete_property_permanently(
    &self,
    id: &str,
  ) -> Result<Option<String>, MutationError> {
    let request = ApiRequest::delete(format!("me/properties/{}/permanent", id));
    let kinds = [ResourceKind::TrashedProperties, ResourceKind::Statistics];
    Ok(self.write(request, &kinds).await?)
  }

  pub async fn set_cover(&self, id: &str, cover_url: &str) -> Result<Option<String>, MutationError> {
    let request =
      ApiRequest::patch(format!("me/properties/{}/cover", id)).with_form([("cover_url", cover_url)]);
    Ok(self.write(request, PROPERTY_LISTINGS).await?)
  }

  pub async fn remove_cover(&self, id: &str) -> Result<Option<String>, MutationError> {
    let request = ApiRequest::delete(format!("me/properties/{}/cover", id));
    Ok(self.write(request, PROPERTY_LISTINGS).await?)
  }

  pub async fn delete_offer(&self, id: &str) -> Result<Option<String>, MutationError> {
    let request = ApiRequest::delete(format!("me/offers/{}", id));
    let kinds = [ResourceKind::Property, ResourceKind::Statistics];
    Ok(self.write(request, &kinds).await?)
  }
}
