use crate::api::types::AdministrativeDivision;
use crate::api::Catalogue;
use crate::query::QueryObserver;

/// Levels of the administrative hierarchy, top down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DivisionLevel {
  District,
  Municipality,
  Parish,
}

impl DivisionLevel {
  pub const ALL: [DivisionLevel; 3] = [Self::District, Self::Municipality, Self::Parish];

  /// Level number as the API counts it.
  pub fn number(self) -> u8 {
    match self {
      Self::District => 1,
      Self::Municipality => 2,
      Self::Parish => 3,
    }
  }

  pub fn from_number(number: u8) -> Option<Self> {
    match number {
      1 => Some(Self::District),
      2 => Some(Self::Municipality),
      3 => Some(Self::Parish),
      _ => None,
    }
  }

  pub fn parent(self) -> Option<Self> {
    match self {
      Self::District => None,
      Self::Municipality => Some(Self::District),
      Self::Parish => Some(Self::Municipality),
    }
  }
}

/// Selected division id per level for a chain of dependent selects.
///
/// Picking a new value at one level clears every level below it, so a
/// child never points at a parent that is no longer selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DivisionSelection {
  selected: [Option<String>; 3],
}

fn slot(level: DivisionLevel) -> usize {
  usize::from(level.number() - 1)
}

impl DivisionSelection {
  pub fn selected(&self, level: DivisionLevel) -> Option<&str> {
    self.selected[slot(level)].as_deref()
  }

  pub fn select(&mut self, level: DivisionLevel, id: Option<String>) {
    let id = id.filter(|id| !id.is_empty());
    let index = slot(level);
    if self.selected[index] == id {
      return;
    }
    self.selected[index] = id;
    for child in self.selected.iter_mut().skip(index + 1) {
      *child = None;
    }
  }

  pub fn clear(&mut self) {
    self.selected = Default::default();
  }

  /// Selected id of the level above `level`, if any.
  pub fn parent_of(&self, level: DivisionLevel) -> Option<&str> {
    level.parent().and_then(|parent| self.selected(parent))
  }

  /// Whether the select for `level` can be used.
  pub fn is_enabled(&self, level: DivisionLevel) -> bool {
    level.parent().is_none() || self.parent_of(level).is_some()
  }

  /// Observe the options for `level` under the current selection.
  pub fn observe(
    &self,
    catalogue: &Catalogue,
    level: DivisionLevel,
  ) -> QueryObserver<Vec<AdministrativeDivision>> {
    catalogue.divisions(level.number(), self.parent_of(level))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::mock::MockTransport;
  use crate::query::{CacheOptions, QueryClient};
  use crate::session::{AuthContext, Session};
  use serde_json::json;

  fn selection() -> DivisionSelection {
    let mut selection = DivisionSelection::default();
    selection.select(DivisionLevel::District, Some("11".to_string()));
    selection.select(DivisionLevel::Municipality, Some("1106".to_string()));
    selection.select(DivisionLevel::Parish, Some("110621".to_string()));
    selection
  }

  #[test]
  fn test_new_district_clears_lower_levels() {
    let mut selection = selection();
    assert!(selection.is_enabled(DivisionLevel::Parish));

    selection.select(DivisionLevel::District, Some("13".to_string()));
    assert_eq!(selection.selected(DivisionLevel::District), Some("13"));
    assert_eq!(selection.selected(DivisionLevel::Municipality), None);
    assert_eq!(selection.selected(DivisionLevel::Parish), None);
    assert!(selection.is_enabled(DivisionLevel::Municipality));
    assert!(!selection.is_enabled(DivisionLevel::Parish));
  }

  #[test]
  fn test_reselecting_same_value_keeps_children() {
    let mut selection = selection();
    selection.select(DivisionLevel::District, Some("11".to_string()));
    assert_eq!(selection.selected(DivisionLevel::Parish), Some("110621"));
  }

  #[test]
  fn test_new_municipality_clears_parish_only() {
    let mut selection = selection();
    selection.select(DivisionLevel::Municipality, Some("1105".to_string()));
    assert_eq!(selection.selected(DivisionLevel::District), Some("11"));
    assert_eq!(selection.selected(DivisionLevel::Parish), None);
    assert_eq!(selection.parent_of(DivisionLevel::Parish), Some("1105"));
  }

  #[test]
  fn test_nothing_selected() {
    let mut selection = selection();
    selection.clear();
    assert!(selection.is_enabled(DivisionLevel::District));
    assert!(!selection.is_enabled(DivisionLevel::Municipality));
    assert_eq!(DivisionLevel::from_number(4), None);
    assert_eq!(DivisionLevel::from_number(2), Some(DivisionLevel::Municipality));
  }

  #[tokio::test]
  async fn test_observers_follow_selection() {
    let mock = MockTransport::new(|_| Ok(json!({ "data": [] })));
    let client = QueryClient::with_session(
      CacheOptions::default(),
      Session::new(AuthContext::authenticated("token")),
    );
    let catalogue = Catalogue::new(client, mock.clone());

    let mut selection = DivisionSelection::default();
    selection.select(DivisionLevel::District, Some("11".to_string()));

    let mut parishes = selection.observe(&catalogue, DivisionLevel::Parish);
    assert!(!parishes.is_enabled());
    parishes.settled().await;
    let mut municipalities = selection.observe(&catalogue, DivisionLevel::Municipality);
    municipalities.settled().await;

    let targets: Vec<String> = mock.requests().iter().map(|r| r.target()).collect();
    assert_eq!(targets, vec!["administrative-divisions/level/2?parent_id=11"]);
  }
}
