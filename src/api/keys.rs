//! Resource kinds of the catalogue API and the cache keys built from them.
//!
//! Every constructor is a pure function of its parameters; structured
//! parameters go in through their canonical serialization.

use crate::query::{KeyPart, QueryFilter, QueryKey};

use super::filters::{Filters, Polygon};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
  Property,
  Properties,
  PropertiesInPolygon,
  PropertyTitles,
  TrashedProperties,
  Collection,
  Collections,
  CollectionsAll,
  CollectionsSidebar,
  TagsAll,
  TagsSidebar,
  TagsManage,
  Characteristics,
  AdministrativeDivisions,
  Statistics,
}

impl ResourceKind {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Property => "property",
      Self::Properties => "properties",
      Self::PropertiesInPolygon => "propertiesInPolygon",
      Self::PropertyTitles => "propertyTitles",
      Self::TrashedProperties => "trashedProperties",
      Self::Collection => "collection",
      Self::Collections => "collections",
      Self::CollectionsAll => "collectionsAll",
      Self::CollectionsSidebar => "collectionsSidebar",
      Self::TagsAll => "tagsAll",
      Self::TagsSidebar => "tagsSidebar",
      Self::TagsManage => "tagsManage",
      Self::Characteristics => "characteristics",
      Self::AdministrativeDivisions => "administrativeDivisions",
      Self::Statistics => "statistics",
    }
  }

  fn key(self) -> QueryKey {
    QueryKey::new(self.as_str())
  }
}

impl From<ResourceKind> for QueryFilter {
  fn from(kind: ResourceKind) -> Self {
    QueryFilter::Kind(kind.as_str())
  }
}

fn canonical_filters(filters: &Filters) -> KeyPart {
  KeyPart::Canonical(filters.canonical())
}

fn canonical_polygon(polygon: Option<&Polygon>) -> KeyPart {
  match polygon {
    Some(polygon) if !polygon.is_empty() => KeyPart::Canonical(polygon.canonical()),
    _ => KeyPart::Absent,
  }
}

pub fn property(id: &str) -> QueryKey {
  ResourceKind::Property.key().with(id)
}

pub fn properties(search: &str, filters: &Filters, page: u32) -> QueryKey {
  ResourceKind::Properties
    .key()
    .with(search)
    .with(canonical_filters(filters))
    .with(page)
}

pub fn properties_in_polygon(
  search: &str,
  filters: &Filters,
  polygon: Option<&Polygon>,
  page: u32,
) -> QueryKey {
  ResourceKind::PropertiesInPolygon
    .key()
    .with(canonical_polygon(polygon))
    .with(search)
    .with(canonical_filters(filters))
    .with(page)
}

pub fn property_titles(search: &str) -> QueryKey {
  ResourceKind::PropertyTitles.key().with(search)
}

pub fn trashed_properties(page: u32) -> QueryKey {
  ResourceKind::TrashedProperties.key().with(page)
}

pub fn collection(id: &str, page: u32) -> QueryKey {
  ResourceKind::Collection.key().with(id).with(page)
}

pub fn collections(page: u32) -> QueryKey {
  ResourceKind::Collections.key().with(page)
}

pub fn collections_all() -> QueryKey {
  ResourceKind::CollectionsAll.key()
}

pub fn collections_sidebar() -> QueryKey {
  ResourceKind::CollectionsSidebar.key()
}

pub fn tags_all() -> QueryKey {
  ResourceKind::TagsAll.key()
}

pub fn tags_sidebar() -> QueryKey {
  ResourceKind::TagsSidebar.key()
}

pub fn tags_manage(page: u32) -> QueryKey {
  ResourceKind::TagsManage.key().with(page)
}

pub fn characteristics(page: u32) -> QueryKey {
  ResourceKind::Characteristics.key().with(page)
}

/// `parent` is `None` while nothing is selected at the level above; that
/// still yields a distinct, deterministic key.
pub fn administrative_divisions(level: u8, parent: Option<&str>) -> QueryKey {
  ResourceKind::AdministrativeDivisions
    .key()
    .with(level)
    .with(parent.filter(|p| !p.is_empty()))
}

pub fn statistics() -> QueryKey {
  ResourceKind::Statistics.key()
}
