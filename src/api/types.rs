//! Serde types matching the catalogue API's responses.
//!
//! Responses are decoded into these at the transport boundary; anything that
//! doesn't fit fails with a decode error instead of travelling on untyped.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Envelopes
// ============================================================================

/// `{ "data": ... }` wrapper used by single-resource endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
  pub data: T,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
  pub first: Option<String>,
  pub last: Option<String>,
  pub prev: Option<String>,
  pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
  pub current_page: u32,
  pub last_page: u32,
  #[serde(default)]
  pub per_page: Option<u32>,
  #[serde(default)]
  pub total: Option<u64>,
  #[serde(default)]
  pub from: Option<u64>,
  #[serde(default)]
  pub to: Option<u64>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub data: Vec<T>,
  #[serde(default)]
  pub links: Links,
  pub meta: Meta,
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub latitude: f64,
  pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
  #[serde(default)]
  pub full_address: Option<String>,
  #[serde(default)]
  pub postal_code: Option<String>,
  #[serde(default)]
  pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
  pub price: f64,
  /// Server timestamp, parsed when building charts
  pub datetime: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
  pub id: u64,
  #[serde(default)]
  pub listing_type: Option<String>,
  #[serde(default)]
  pub url: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub price: Option<f64>,
  #[serde(default)]
  pub price_history: Vec<PricePoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Offers {
  #[serde(default)]
  pub sale: Vec<Offer>,
  #[serde(default)]
  pub rent: Vec<Offer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Media {
  #[serde(default)]
  pub photos: Vec<String>,
  #[serde(default)]
  pub videos: Vec<String>,
  #[serde(default)]
  pub blueprints: Vec<String>,
}

/// Full property as returned by the detail endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
  pub id: u64,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub cover_url: Option<String>,
  #[serde(rename = "type", default)]
  pub property_type: Option<String>,
  #[serde(default)]
  pub typology: Option<String>,
  #[serde(default)]
  pub wc: Option<u32>,
  #[serde(default)]
  pub listing_type: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub useful_area: Option<f64>,
  #[serde(default)]
  pub gross_area: Option<f64>,
  #[serde(default)]
  pub rating: Option<f64>,
  #[serde(default)]
  pub current_price_sale: Option<f64>,
  #[serde(default)]
  pub current_price_rent: Option<f64>,
  #[serde(default)]
  pub address: Option<Address>,
  #[serde(default)]
  pub offers: Offers,
  #[serde(default)]
  pub media: Media,
  #[serde(default)]
  pub characteristics: Vec<PropertyCharacteristic>,
}

/// Property as it appears in listings and collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySummary {
  pub id: u64,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub cover_url: Option<String>,
  #[serde(rename = "type", default)]
  pub property_type: Option<String>,
  #[serde(default)]
  pub typology: Option<String>,
  #[serde(default)]
  pub useful_area: Option<f64>,
  #[serde(default)]
  pub rating: Option<f64>,
  #[serde(default)]
  pub current_price_sale: Option<f64>,
  #[serde(default)]
  pub current_price_rent: Option<f64>,
  #[serde(default)]
  pub address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyTitle {
  pub id: u64,
  pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyCharacteristic {
  pub id: u64,
  pub name: String,
  #[serde(rename = "type", default)]
  pub kind: Option<String>,
  #[serde(default)]
  pub value: Option<serde_json::Value>,
}

/// Characteristic definition without a value attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Characteristic {
  pub id: u64,
  pub name: String,
  #[serde(rename = "type", default)]
  pub kind: Option<String>,
}

// ============================================================================
// Collections & tags
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub num_properties: Option<u64>,
  #[serde(default)]
  pub covers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionWithProperties {
  #[serde(flatten)]
  pub collection: Collection,
  pub properties: Page<PropertySummary>,
}

/// Unpaginated collection list (`all` and `sidebar` endpoints).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionList {
  pub data: Vec<Collection>,
  #[serde(deserialize_with = "count_from_number_or_string")]
  pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub color: Option<String>,
}

/// Tag row on the management page, with usage count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedTag {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub color: Option<String>,
  #[serde(default)]
  pub num_properties: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdministrativeDivision {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub level: Option<u8>,
  #[serde(default)]
  pub parent_id: Option<u64>,
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsPrice {
  pub sale: Option<f64>,
  pub rent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapStats {
  pub count: u64,
  pub avg: f64,
  #[serde(default)]
  pub price: StatsPrice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedStats {
  #[serde(default)]
  pub id: Option<u64>,
  pub name: String,
  #[serde(flatten)]
  pub stats: CapStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
  pub properties: u64,
  pub tags: u64,
  pub lists: u64,
  pub offers: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
  pub total: Totals,
  /// Keyed by property type
  #[serde(default)]
  pub properties: BTreeMap<String, CapStats>,
  /// Keyed by listing type
  #[serde(default)]
  pub listings: BTreeMap<String, u64>,
  #[serde(default)]
  pub tags: Vec<NamedStats>,
  #[serde(default)]
  pub lists: Vec<NamedStats>,
}

/// The API sends some counts as strings.
fn count_from_number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Count {
    Number(u64),
    Text(String),
  }

  match Count::deserialize(deserializer)? {
    Count::Number(n) => Ok(n),
    Count::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
  }
}
