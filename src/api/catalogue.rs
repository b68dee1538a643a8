//! Typed queries over the catalogue API.
//!
//! Each method mounts an observer on the shared [`QueryClient`]; the key,
//! request and response shape of every resource are defined here and nowhere
//! else.

use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::filters::{Filters, Polygon};
use super::keys;
use super::transport::{decode, ApiRequest, Transport};
use super::types::{
  AdministrativeDivision, Characteristic, Collection, CollectionList, CollectionWithProperties,
  Envelope, ManagedTag, Page, Property, PropertySummary, PropertyTitle, Statistics, Tag,
};
use crate::query::{QueryClient, QueryKey, QueryObserver, QueryOptions};

/// Entry point for reading server state: the query cache plus the transport
/// its fetches go through.
#[derive(Clone)]
pub struct Catalogue {
  client: QueryClient,
  transport: Arc<dyn Transport>,
}

fn page_query(page: u32) -> Vec<(String, String)> {
  vec![("page".to_string(), page.to_string())]
}

impl Catalogue {
  pub fn new(client: QueryClient, transport: Arc<dyn Transport>) -> Self {
    Self { client, transport }
  }

  pub fn client(&self) -> &QueryClient {
    &self.client
  }

  pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
    &self.transport
  }

  /// Mount `key`, fetching with `request` and decoding the body as `R`
  /// before `extract` picks out the cached payload.
  fn observe<R, T>(
    &self,
    key: QueryKey,
    resource: &'static str,
    request: ApiRequest,
    extract: fn(R) -> T,
    options: QueryOptions,
  ) -> QueryObserver<T>
  where
    R: DeserializeOwned + Send + 'static,
    T: Send + Sync + 'static,
  {
    let transport = self.transport.clone();
    self.client.use_query(
      key,
      move || {
        let transport = transport.clone();
        let request = request.clone();
        async move {
          let body = transport.request(request).await?;
          decode::<R>(resource, body).map(extract)
        }
      },
      options,
    )
  }

  fn observe_as_is<T>(
    &self,
    key: QueryKey,
    resource: &'static str,
    request: ApiRequest,
    options: QueryOptions,
  ) -> QueryObserver<T>
  where
    T: DeserializeOwned + Send + Sync + 'static,
  {
    self.observe(key, resource, request, |body: T| body, options)
  }

  // --------------------------------------------------------------------------
  // Properties
  // --------------------------------------------------------------------------

  pub fn property(&self, id: &str, enabled: bool) -> QueryObserver<Property> {
    self.observe(
      keys::property(id),
      "property",
      ApiRequest::get(format!("me/properties/{}", id)),
      |body: Envelope<Property>| body.data,
      QueryOptions::default().enabled(enabled && !id.is_empty()),
    )
  }

  pub fn properties(
    &self,
    search: &str,
    filters: &Filters,
    page: u32,
    enabled: bool,
  ) -> QueryObserver<Page<PropertySummary>> {
    let request = ApiRequest::get("me/properties")
      .with_query(page_query(page))
      .with_query(filters.to_pairs(search));
    self.observe_as_is(
      keys::properties(search, filters, page),
      "properties",
      request,
      QueryOptions::default().enabled(enabled),
    )
  }

  /// Properties inside a drawn area. Without a polygon the server applies
  /// only the search and filters.
  pub fn properties_in_polygon(
    &self,
    search: &str,
    filters: &Filters,
    polygon: Option<&Polygon>,
    page: u32,
  ) -> QueryObserver<Page<PropertySummary>> {
    let request = ApiRequest::get("me/properties/polygon")
      .with_query(page_query(page))
      .with_query(polygon.map(Polygon::to_pairs).unwrap_or_default())
      .with_query(filters.to_pairs(search));
    self.observe_as_is(
      keys::properties_in_polygon(search, filters, polygon, page),
      "properties in polygon",
      request,
      QueryOptions::default(),
    )
  }

  pub fn property_titles(&self, search: &str) -> QueryObserver<Vec<PropertyTitle>> {
    let mut request = ApiRequest::get("me/properties/titles");
    if !search.is_empty() {
      request = request.with_query([("query".to_string(), search.to_string())]);
    }
    self.observe(
      keys::property_titles(search),
      "property titles",
      request,
      |body: Envelope<Vec<PropertyTitle>>| body.data,
      QueryOptions::default(),
    )
  }

  pub fn trashed_properties(&self, page: u32) -> QueryObserver<Page<PropertySummary>> {
    self.observe_as_is(
      keys::trashed_properties(page),
      "trashed properties",
      ApiRequest::get("me/properties/trashed").with_query(page_query(page)),
      QueryOptions::default(),
    )
  }

  // --------------------------------------------------------------------------
  // Collections
  // --------------------------------------------------------------------------

  pub fn collection(&self, id: &str, page: u32) -> QueryObserver<CollectionWithProperties> {
    self.observe(
      keys::collection(id, page),
      "collection",
      ApiRequest::get(format!("me/lists/{}", id)).with_query(page_query(page)),
      |body: Envelope<CollectionWithProperties>| body.data,
      QueryOptions::default().enabled(!id.is_empty()),
    )
  }

  pub fn collections(&self, page: u32) -> QueryObserver<Page<Collection>> {
    self.observe_as_is(
      keys::collections(page),
      "collections",
      ApiRequest::get("me/lists").with_query(page_query(page)),
      QueryOptions::default(),
    )
  }

  pub fn all_collections(&self) -> QueryObserver<CollectionList> {
    self.observe_as_is(
      keys::collections_all(),
      "all collections",
      ApiRequest::get("me/lists/all"),
      QueryOptions::default(),
    )
  }

  pub fn sidebar_collections(&self) -> QueryObserver<CollectionList> {
    self.observe_as_is(
      keys::collections_sidebar(),
      "sidebar collections",
      ApiRequest::get("me/lists/sidebar"),
      QueryOptions::infinite(),
    )
  }

  // --------------------------------------------------------------------------
  // Tags & characteristics
  // --------------------------------------------------------------------------

  pub fn all_tags(&self) -> QueryObserver<Vec<Tag>> {
    self.observe(
      keys::tags_all(),
      "tags",
      ApiRequest::get("me/tags/all"),
      |body: Envelope<Vec<Tag>>| body.data,
      QueryOptions::default(),
    )
  }

  pub fn sidebar_tags(&self) -> QueryObserver<Vec<Tag>> {
    self.observe(
      keys::tags_sidebar(),
      "sidebar tags",
      ApiRequest::get("me/tags/sidebar"),
      |body: Envelope<Vec<Tag>>| body.data,
      QueryOptions::infinite(),
    )
  }

  pub fn managed_tags(&self, page: u32) -> QueryObserver<Page<ManagedTag>> {
    self.observe_as_is(
      keys::tags_manage(page),
      "managed tags",
      ApiRequest::get("me/tags").with_query(page_query(page)),
      QueryOptions::default(),
    )
  }

  pub fn characteristics(&self, page: u32) -> QueryObserver<Page<Characteristic>> {
    self.observe_as_is(
      keys::characteristics(page),
      "characteristics",
      ApiRequest::get("me/characteristics/paginated").with_query(page_query(page)),
      QueryOptions::default(),
    )
  }

  // --------------------------------------------------------------------------
  // Reference data
  // --------------------------------------------------------------------------

  /// Divisions at `level` (1 = district). Levels below the top stay disabled
  /// until their parent is selected; the list never goes stale.
  pub fn divisions(
    &self,
    level: u8,
    parent: Option<&str>,
  ) -> QueryObserver<Vec<AdministrativeDivision>> {
    let parent = parent.filter(|p| !p.is_empty());
    let mut request = ApiRequest::get(format!("administrative-divisions/level/{}", level));
    if let Some(parent) = parent {
      request = request.with_query([("parent_id".to_string(), parent.to_string())]);
    }
    self.observe(
      keys::administrative_divisions(level, parent),
      "administrative divisions",
      request,
      |body: Envelope<Vec<AdministrativeDivision>>| body.data,
      QueryOptions::infinite().enabled(level <= 1 || parent.is_some()),
    )
  }

  pub fn statistics(&self) -> QueryObserver<Statistics> {
    // Unlike the detail endpoints, no `data` envelope
    self.observe_as_is(
      keys::statistics(),
      "statistics",
      ApiRequest::get("me/statistics"),
      QueryOptions::default(),
    )
  }
}

impl std::fmt::Debug for Catalogue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Catalogue")
      .field("client", &self.client)
      .finish_non_exhaustive()
  }
}
