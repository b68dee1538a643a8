//! Offer price histories reshaped into chart rows, one row per month.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::api::types::{Offer, Property};

/// One x-axis point: a month and the price of each series that month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
  /// e.g. "January 2024"
  pub label: String,
  /// Series name to price
  pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OfferChart {
  /// Series names in the order their offers were given
  pub series: Vec<String>,
  /// Chronological
  pub rows: Vec<ChartRow>,
}

impl OfferChart {
  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// Lowest and highest plotted price, widened by `padding` on both ends.
  pub fn value_range(&self, padding: f64) -> Option<(f64, f64)> {
    let mut values = self.rows.iter().flat_map(|row| row.values.values().copied());
    let first = values.next()?;
    let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    Some((min - padding, max + padding))
  }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDate> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.date_naive());
  }
  if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
    return Some(dt.date());
  }
  NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn month_start(date: NaiveDate) -> NaiveDate {
  date.with_day0(0).unwrap_or(date)
}

/// Build the price-history chart for `offers`.
///
/// Each offer is one series named `Offer {id}`. Points are bucketed by
/// month; when an offer has several points in one month the latest wins.
/// Points with an unreadable timestamp are skipped.
pub fn offer_history<'a>(offers: impl IntoIterator<Item = &'a Offer>) -> OfferChart {
  let mut series = Vec::new();
  let mut months: BTreeMap<NaiveDate, BTreeMap<String, f64>> = BTreeMap::new();

  for offer in offers {
    let name = format!("Offer {}", offer.id);
    let mut points: Vec<(NaiveDate, f64)> = offer
      .price_history
      .iter()
      .filter_map(|point| match parse_timestamp(&point.datetime) {
        Some(date) => Some((date, point.price)),
        None => {
          warn!(offer = offer.id, datetime = %point.datetime, "skipping unparsable price point");
          None
        }
      })
      .collect();
    if points.is_empty() {
      continue;
    }
    // Stable sort keeps server order for points on the same day
    points.sort_by_key(|(date, _)| *date);

    for (date, price) in points {
      months
        .entry(month_start(date))
        .or_default()
        .insert(name.clone(), price);
    }
    if !series.contains(&name) {
      series.push(name);
    }
  }

  let rows = months
    .into_iter()
    .map(|(month, values)| ChartRow {
      label: month.format("%B %Y").to_string(),
      values,
    })
    .collect();

  OfferChart { series, rows }
}

/// Chart of one listing type's offers with its padded price range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingHistory {
  pub chart: OfferChart,
  pub padding: f64,
  pub range: Option<(f64, f64)>,
}

impl ListingHistory {
  fn build(offers: &[Offer], current_price: Option<f64>, padding: Option<f64>) -> Option<Self> {
    if offers.is_empty() {
      return None;
    }
    let padding = padding.unwrap_or_else(|| current_price.unwrap_or(0.0) / 10.0);
    let chart = offer_history(offers);
    let range = chart.value_range(padding);
    Some(Self {
      chart,
      padding,
      range,
    })
  }
}

/// A property's sale and rent histories, charted apart.
///
/// A listing type with no offers has no chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertyHistory {
  pub sale: Option<ListingHistory>,
  pub rent: Option<ListingHistory>,
}

/// Build both charts for `property`.
///
/// Each range is padded by a tenth of the property's current price for that
/// listing type unless `padding` is given.
pub fn property_history(property: &Property, padding: Option<f64>) -> PropertyHistory {
  PropertyHistory {
    sale: ListingHistory::build(&property.offers.sale, property.current_price_sale, padding),
    rent: ListingHistory::build(&property.offers.rent, property.current_price_rent, padding),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{Offers, PricePoint};

  fn offer(id: u64, history: &[(&str, f64)]) -> Offer {
    Offer {
      id,
      listing_type: None,
      url: None,
      description: None,
      price: None,
      price_history: history
        .iter()
        .map(|(datetime, price)| PricePoint {
          price: *price,
          datetime: datetime.to_string(),
        })
        .collect(),
    }
  }

  #[test]
  fn test_rows_by_month_in_order() {
    // Newest first, as the API sends them
    let offers = vec![
      offer(1, &[("2024-03-02", 240_000.0), ("2024-01-15 10:00:00", 250_000.0)]),
      offer(2, &[("2024-01-20T08:00:00Z", 1_200.0)]),
    ];
    let chart = offer_history(&offers);

    assert_eq!(chart.series, vec!["Offer 1", "Offer 2"]);
    let labels: Vec<&str> = chart.rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["January 2024", "March 2024"]);
    assert_eq!(chart.rows[0].values["Offer 1"], 250_000.0);
    assert_eq!(chart.rows[0].values["Offer 2"], 1_200.0);
    assert!(!chart.rows[1].values.contains_key("Offer 2"));
  }

  #[test]
  fn test_latest_point_in_month_wins() {
    let offers = vec![offer(3, &[("2023-11-28", 99.0), ("2023-11-03", 120.0)])];
    let chart = offer_history(&offers);
    assert_eq!(chart.rows.len(), 1);
    assert_eq!(chart.rows[0].label, "November 2023");
    assert_eq!(chart.rows[0].values["Offer 3"], 99.0);
  }

  #[test]
  fn test_year_boundary_sorts_chronologically() {
    let offers = vec![offer(4, &[("2024-01-01", 10.0), ("2023-12-31", 20.0)])];
    let chart = offer_history(&offers);
    let labels: Vec<&str> = chart.rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["December 2023", "January 2024"]);
  }

  #[test]
  fn test_unparsable_points_and_empty_offers() {
    let offers = vec![offer(5, &[("yesterday", 1.0)]), offer(6, &[])];
    let chart = offer_history(&offers);
    assert!(chart.is_empty());
    assert!(chart.series.is_empty());
    assert_eq!(chart.value_range(10.0), None);
  }

  #[test]
  fn test_value_range_is_padded() {
    let offers = vec![offer(7, &[("2024-02-01", 300.0), ("2024-04-01", 200.0)])];
    let chart = offer_history(&offers);
    assert_eq!(chart.value_range(50.0), Some((150.0, 350.0)));
  }

  fn property(sale: Vec<Offer>, rent: Vec<Offer>) -> Property {
    serde_json::from_value(serde_json::json!({
      "id": 9,
      "current_price_sale": 240000.0,
      "current_price_rent": 1100.0
    }))
    .map(|property: Property| Property {
      offers: Offers { sale, rent },
      ..property
    })
    .unwrap()
  }

  #[test]
  fn test_sale_and_rent_are_charted_apart() {
    let property = property(
      vec![offer(1, &[("2024-01-10", 250_000.0), ("2024-03-10", 240_000.0)])],
      vec![offer(2, &[("2024-02-01", 1_200.0)])],
    );
    let history = property_history(&property, None);

    let sale = history.sale.unwrap();
    assert_eq!(sale.chart.series, vec!["Offer 1"]);
    assert_eq!(sale.padding, 24_000.0);
    assert_eq!(sale.range, Some((216_000.0, 274_000.0)));

    let rent = history.rent.unwrap();
    assert_eq!(rent.chart.series, vec!["Offer 2"]);
    assert_eq!(rent.chart.rows.len(), 1);
    assert_eq!(rent.range, Some((1_090.0, 1_310.0)));
  }

  #[test]
  fn test_missing_listing_type_has_no_chart() {
    let mut property = property(vec![], vec![offer(3, &[("2024-05-05", 900.0)])]);
    property.current_price_rent = None;
    let history = property_history(&property, None);

    assert!(history.sale.is_none());
    assert_eq!(history.rent.as_ref().map(|rent| rent.padding), Some(0.0));
  }

  #[test]
  fn test_explicit_padding_overrides_price_based() {
    let property = property(vec![offer(4, &[("2024-06-01", 100_000.0)])], vec![]);
    let history = property_history(&property, Some(500.0));
    assert_eq!(history.sale.unwrap().range, Some((99_500.0, 100_500.0)));
  }
}
