use crate::api::types::{Page, PropertySummary};
use crate::api::{Catalogue, Filters, Polygon};
use crate::query::{QueryObserver, QueryResult};

/// Current page of a paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
  page: u32,
  total_pages: u32,
}

impl Default for Pagination {
  fn default() -> Self {
    Self {
      page: 1,
      total_pages: 1,
    }
  }
}

impl Pagination {
  pub fn page(&self) -> u32 {
    self.page
  }

  pub fn total_pages(&self) -> u32 {
    self.total_pages
  }

  /// Pages start at 1; anything lower is taken as 1.
  pub fn set_page(&mut self, page: u32) {
    self.page = page.max(1);
  }

  pub fn reset(&mut self) {
    self.page = 1;
  }

  /// Take the page count from the last response's `meta.last_page`.
  pub fn update_total(&mut self, last_page: u32) {
    self.total_pages = last_page.max(1);
  }

  pub fn has_next(&self) -> bool {
    self.page < self.total_pages
  }

  pub fn has_previous(&self) -> bool {
    self.page > 1
  }
}

/// Inputs of the property search view.
///
/// Changing any input to a different value goes back to the first page.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
  search: String,
  filters: Filters,
  polygon: Option<Polygon>,
  pagination: Pagination,
}

impl SearchState {
  pub fn search(&self) -> &str {
    &self.search
  }

  pub fn filters(&self) -> &Filters {
    &self.filters
  }

  pub fn polygon(&self) -> Option<&Polygon> {
    self.polygon.as_ref()
  }

  pub fn pagination(&self) -> &Pagination {
    &self.pagination
  }

  pub fn page(&self) -> u32 {
    self.pagination.page()
  }

  pub fn set_search(&mut self, search: impl Into<String>) {
    let search = search.into();
    if search != self.search {
      self.search = search;
      self.pagination.reset();
    }
  }

  pub fn set_filters(&mut self, filters: Filters) {
    if filters != self.filters {
      self.filters = filters;
      self.pagination.reset();
    }
  }

  /// An empty ring counts as no polygon.
  pub fn set_polygon(&mut self, polygon: Option<Polygon>) {
    let polygon = polygon.filter(|p| !p.is_empty());
    if polygon != self.polygon {
      self.polygon = polygon;
      self.pagination.reset();
    }
  }

  pub fn set_page(&mut self, page: u32) {
    self.pagination.set_page(page);
  }

  /// Observe the listing for the current inputs: the polygon endpoint while
  /// an area is drawn, the plain listing otherwise.
  pub fn query(&self, catalogue: &Catalogue) -> QueryObserver<Page<PropertySummary>> {
    match &self.polygon {
      Some(polygon) => {
        catalogue.properties_in_polygon(&self.search, &self.filters, Some(polygon), self.page())
      }
      None => catalogue.properties(&self.search, &self.filters, self.page(), true),
    }
  }

  /// Record the page count of a landed result.
  pub fn sync(&mut self, result: &QueryResult<Page<PropertySummary>>) {
    if let Some(page) = result.data() {
      self.pagination.update_total(page.meta.last_page);
    }
  }
}
