//! Cache keys and the filters used to match them on invalidation.

use sha2::{Digest, Sha256};
use std::fmt;

/// One positional element of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
  Str(String),
  Int(i64),
  /// Explicit "nothing selected" marker, distinct from an empty string
  Absent,
  /// Deterministic serialization of a structured value (filters, geometry)
  Canonical(String),
}

impl From<&str> for KeyPart {
  fn from(value: &str) -> Self {
    Self::Str(value.to_string())
  }
}

impl From<String> for KeyPart {
  fn from(value: String) -> Self {
    Self::Str(value)
  }
}

impl From<i64> for KeyPart {
  fn from(value: i64) -> Self {
    Self::Int(value)
  }
}

impl From<u32> for KeyPart {
  fn from(value: u32) -> Self {
    Self::Int(i64::from(value))
  }
}

impl From<u8> for KeyPart {
  fn from(value: u8) -> Self {
    Self::Int(i64::from(value))
  }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
  fn from(value: Option<T>) -> Self {
    value.map(Into::into).unwrap_or(Self::Absent)
  }
}

impl fmt::Display for KeyPart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Str(s) => write!(f, "{:?}", s),
      Self::Int(n) => write!(f, "{}", n),
      Self::Absent => f.write_str("-"),
      Self::Canonical(s) => write!(f, "{{{}}}", s),
    }
  }
}

/// Ordered `[kind, ...parts]` tuple identifying one cache entry.
///
/// Two keys are the same entry iff the kind and every part compare equal
/// position by position. Structured parts must already be canonical when
/// they get here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
  kind: &'static str,
  parts: Vec<KeyPart>,
}

impl QueryKey {
  pub fn new(kind: &'static str) -> Self {
    Self {
      kind,
      parts: Vec::new(),
    }
  }

  /// Append the next positional part.
  pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
    self.parts.push(part.into());
    self
  }

  pub fn kind(&self) -> &'static str {
    self.kind
  }

  pub fn parts(&self) -> &[KeyPart] {
    &self.parts
  }

  /// Short stable hash of the key, used to correlate log lines.
  pub fn fingerprint(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.kind)?;
    if !self.parts.is_empty() {
      f.write_str("[")?;
      for (idx, part) in self.parts.iter().enumerate() {
        if idx > 0 {
          f.write_str(", ")?;
        }
        write!(f, "{}", part)?;
      }
      f.write_str("]")?;
    }
    Ok(())
  }
}

/// Selects the entries an invalidation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
  /// Every entry of one resource kind, whatever its parameters
  Kind(&'static str),
  Exact(QueryKey),
  All,
}

impl QueryFilter {
  pub fn matches(&self, key: &QueryKey) -> bool {
    match self {
      Self::Kind(kind) => key.kind == *kind,
      Self::Exact(exact) => exact == key,
      Self::All => true,
    }
  }
}

impl From<QueryKey> for QueryFilter {
  fn from(key: QueryKey) -> Self {
    Self::Exact(key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_structurally_equal_keys_are_equal() {
    let a = QueryKey::new("properties").with("Lisbon").with(1u32);
    let b = QueryKey::new("properties").with("Lisbon".to_string()).with(1u32);
    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());
  }

  #[test]
  fn test_position_matters() {
    let a = QueryKey::new("collection").with("1").with(2u32);
    let b = QueryKey::new("collection").with("2").with(1u32);
    assert_ne!(a, b);
  }

  #[test]
  fn test_absent_differs_from_empty_string() {
    let absent = QueryKey::new("administrativeDivisions").with(2u8).with(None::<&str>);
    let empty = QueryKey::new("administrativeDivisions").with(2u8).with("");
    assert_ne!(absent, empty);
  }

  #[test]
  fn test_display() {
    let key = QueryKey::new("collection").with("7").with(3u32);
    assert_eq!(key.to_string(), "collection[\"7\", 3]");
    assert_eq!(QueryKey::new("statistics").to_string(), "statistics");
  }

  #[test]
  fn test_filter_by_kind() {
    let filter = QueryFilter::Kind("collections");
    assert!(filter.matches(&QueryKey::new("collections").with(1u32)));
    assert!(filter.matches(&QueryKey::new("collections").with(9u32)));
    assert!(!filter.matches(&QueryKey::new("collectionsSidebar")));
  }
}
