//! State a view keeps next to its queries: which page, which inputs, which
//! dependent selections, and data reshaped for charts.

mod chart;
mod divisions;
mod search;

pub use chart::{
  offer_history, property_history, ChartRow, ListingHistory, OfferChart, PropertyHistory,
};
pub use divisions::{DivisionLevel, DivisionSelection};
pub use search::{Pagination, SearchState};
