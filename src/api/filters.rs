//! Property search filters and their request-parameter serialization.
//!
//! Set-like fields are ordered sets, so two selections that differ only in
//! the order they were picked serialize (and therefore key) identically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One facet of the combined listing-type/status/property-type picker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ListingFacet {
  ListingType(String),
  Status(String),
  PropertyType(String),
}

impl FromStr for ListingFacet {
  type Err = String;

  /// Parses the picker's `group|value` form, e.g. `listing_type|sale`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (group, value) = s
      .split_once('|')
      .ok_or_else(|| format!("expected <group>|<value>, got '{}'", s))?;
    if value.is_empty() {
      return Err(format!("missing value in '{}'", s));
    }
    match group {
      "listing_type" => Ok(Self::ListingType(value.to_string())),
      "status" => Ok(Self::Status(value.to_string())),
      "type" => Ok(Self::PropertyType(value.to_string())),
      other => Err(format!(
        "unknown facet group '{}' (expected listing_type, status or type)",
        other
      )),
    }
  }
}

impl fmt::Display for ListingFacet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::ListingType(v) => write!(f, "listing_type|{}", v),
      Self::Status(v) => write!(f, "status|{}", v),
      Self::PropertyType(v) => write!(f, "type|{}", v),
    }
  }
}

/// Filters applied to property listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
  /// Restrict to one collection
  pub list: Option<String>,
  pub include_tags: BTreeSet<u64>,
  pub exclude_tags: BTreeSet<u64>,
  pub min_area: Option<u64>,
  pub max_area: Option<u64>,
  pub min_price: Option<u64>,
  pub max_price: Option<u64>,
  pub min_rating: Option<u8>,
  pub max_rating: Option<u8>,
  pub wcs: Option<u32>,
  pub listing_facets: BTreeSet<ListingFacet>,
  pub typology: BTreeSet<String>,
  pub address_search: Option<String>,
}

fn push_nonzero<T>(pairs: &mut Vec<(String, String)>, name: &str, value: Option<T>)
where
  T: Copy + Default + PartialEq + ToString,
{
  if let Some(value) = value.filter(|v| *v != T::default()) {
    pairs.push((name.to_string(), value.to_string()));
  }
}

fn push_text(pairs: &mut Vec<(String, String)>, name: &str, value: Option<&str>) {
  if let Some(value) = value.filter(|v| !v.is_empty()) {
    pairs.push((name.to_string(), value.to_string()));
  }
}

fn push_tag_set(pairs: &mut Vec<(String, String)>, name: &str, tags: &BTreeSet<u64>) {
  if tags.is_empty() {
    return;
  }
  let ids: Vec<String> = tags.iter().map(u64::to_string).collect();
  pairs.push((name.to_string(), format!("[{}]", ids.join(","))));
}

impl Filters {
  pub fn is_empty(&self) -> bool {
    self.to_pairs("").is_empty()
  }

  /// Request parameters for `search` plus these filters, in a fixed order.
  /// Empty and zero-valued fields are left out.
  pub fn to_pairs(&self, search: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    push_text(&mut pairs, "query", Some(search));
    push_text(&mut pairs, "list_id", self.list.as_deref());
    push_tag_set(&mut pairs, "include_tags", &self.include_tags);
    push_tag_set(&mut pairs, "exclude_tags", &self.exclude_tags);
    push_nonzero(&mut pairs, "area_min", self.min_area);
    push_nonzero(&mut pairs, "area_max", self.max_area);
    push_nonzero(&mut pairs, "price_min", self.min_price);
    push_nonzero(&mut pairs, "price_max", self.max_price);
    push_nonzero(&mut pairs, "rating_min", self.min_rating);
    push_nonzero(&mut pairs, "rating_max", self.max_rating);
    push_nonzero(&mut pairs, "wc", self.wcs);

    // Each facet group is indexed from zero on its own
    let (mut lt, mut s, mut t) = (0usize, 0usize, 0usize);
    for facet in &self.listing_facets {
      let (prefix, index, value) = match facet {
        ListingFacet::ListingType(v) => ("lt", &mut lt, v),
        ListingFacet::Status(v) => ("s", &mut s, v),
        ListingFacet::PropertyType(v) => ("t", &mut t, v),
      };
      pairs.push((format!("{}[{}]", prefix, index), value.clone()));
      *index += 1;
    }

    for (idx, typology) in self.typology.iter().enumerate() {
      pairs.push((format!("tl[{}]", idx), typology.clone()));
    }

    push_text(&mut pairs, "address", self.address_search.as_deref());
    pairs
  }

  /// Canonical form used inside cache keys.
  pub fn canonical(&self) -> String {
    encode_pairs(&self.to_pairs(""))
  }
}

/// A drawn search area: one closed ring of `(longitude, latitude)` vertices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
  pub ring: Vec<(f64, f64)>,
}

impl Polygon {
  pub fn new(ring: Vec<(f64, f64)>) -> Self {
    Self { ring }
  }

  pub fn is_empty(&self) -> bool {
    self.ring.is_empty()
  }

  /// `p[i][x]=<lat>&p[i][y]=<lng>` per vertex. Vertices with a zero
  /// coordinate are skipped but keep their index.
  pub fn to_pairs(&self) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (idx, (lng, lat)) in self.ring.iter().enumerate() {
      if *lng == 0.0 || *lat == 0.0 {
        continue;
      }
      pairs.push((format!("p[{}][x]", idx), lat.to_string()));
      pairs.push((format!("p[{}][y]", idx), lng.to_string()));
    }
    pairs
  }

  pub fn canonical(&self) -> String {
    encode_pairs(&self.to_pairs())
  }
}

/// `application/x-www-form-urlencoded` rendering of parameter pairs.
pub fn encode_pairs(pairs: &[(String, String)]) -> String {
  url::form_urlencoded::Serializer::new(String::new())
    .extend_pairs(pairs)
    .finish()
}
