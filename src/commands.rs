//! Command-line subcommands and how each maps onto catalogue queries and writes.

use clap::{Args, Subcommand};
use color_eyre::{
  eyre::{eyre, Report},
  Result,
};
use serde::Serialize;
use std::sync::Arc;

use propcat::api::{Catalogue, CollectionForm, Filters, ListingFacet, MutationError, Polygon};
use propcat::query::{QueryError, QueryKey, QueryObserver};
use propcat::view::{property_history, DivisionLevel, DivisionSelection, SearchState};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Show one property
  Property { id: String },
  /// Search properties
  Properties(SearchArgs),
  /// Search properties inside a drawn area
  Polygon {
    /// Vertex as LNG,LAT; repeat for each vertex
    #[arg(long = "point", value_parser = parse_point, required = true, allow_hyphen_values = true)]
    points: Vec<(f64, f64)>,
    #[command(flatten)]
    search: SearchArgs,
  },
  /// Property titles matching a search
  Titles {
    #[arg(default_value = "")]
    query: String,
  },
  /// Properties in the trash
  Trashed {
    #[arg(long, default_value_t = 1)]
    page: u32,
  },
  /// One collection with a page of its properties
  Collection {
    id: String,
    #[arg(long, default_value_t = 1)]
    page: u32,
  },
  /// List collections
  Collections {
    #[arg(long, default_value_t = 1)]
    page: u32,
    /// Every collection, unpaginated
    #[arg(long, conflicts_with = "sidebar")]
    all: bool,
    /// The sidebar selection
    #[arg(long)]
    sidebar: bool,
  },
  /// List tags
  Tags {
    /// Paginated management listing with usage counts
    #[arg(long, conflicts_with = "sidebar")]
    manage: bool,
    #[arg(long)]
    sidebar: bool,
    #[arg(long, default_value_t = 1)]
    page: u32,
  },
  /// List characteristic definitions
  Characteristics {
    #[arg(long, default_value_t = 1)]
    page: u32,
  },
  /// Administrative divisions below the given selection
  Divisions {
    #[arg(long)]
    district: Option<String>,
    #[arg(long, requires = "district")]
    municipality: Option<String>,
  },
  /// Catalogue statistics
  Stats,
  /// Monthly price history of a property's offers, sale and rent apart
  History {
    id: String,
    /// Padding around each price range; a tenth of the current price when omitted
    #[arg(long)]
    extra: Option<f64>,
  },
  /// Rename or re-describe a collection
  EditCollection {
    id: String,
    #[arg(long)]
    title: String,
    /// Keeps the current description when omitted
    #[arg(long)]
    description: Option<String>,
  },
  /// Move a property to the trash
  Trash { id: String },
  /// Restore a property from the trash
  Restore { id: String },
  /// Delete a trashed property for good
  Purge { id: String },
  /// Set a property's cover image
  SetCover { id: String, url: String },
  /// Remove a property's cover image
  RemoveCover { id: String },
  /// Delete an offer
  DeleteOffer { id: String },
}

#[derive(Args, Debug, Clone, Default)]
pub struct SearchArgs {
  /// Free-text search
  #[arg(short, long, default_value = "")]
  pub query: String,
  #[arg(long, default_value_t = 1)]
  pub page: u32,
  /// Restrict to a collection id
  #[arg(long)]
  pub list: Option<String>,
  #[arg(long = "tag", value_delimiter = ',')]
  pub include_tags: Vec<u64>,
  #[arg(long = "exclude-tag", value_delimiter = ',')]
  pub exclude_tags: Vec<u64>,
  #[arg(long)]
  pub min_area: Option<u64>,
  #[arg(long)]
  pub max_area: Option<u64>,
  #[arg(long)]
  pub min_price: Option<u64>,
  #[arg(long)]
  pub max_price: Option<u64>,
  #[arg(long)]
  pub min_rating: Option<u8>,
  #[arg(long)]
  pub max_rating: Option<u8>,
  /// Number of bathrooms
  #[arg(long)]
  pub wcs: Option<u32>,
  /// Facet as GROUP|VALUE, e.g. listing_type|sale
  #[arg(long = "facet")]
  pub facets: Vec<ListingFacet>,
  #[arg(long)]
  pub typology: Vec<String>,
  #[arg(long)]
  pub address: Option<String>,
}

impl SearchArgs {
  pub fn filters(&self) -> Filters {
    Filters {
      list: self.list.clone(),
      include_tags: self.include_tags.iter().copied().collect(),
      exclude_tags: self.exclude_tags.iter().copied().collect(),
      min_area: self.min_area,
      max_area: self.max_area,
      min_price: self.min_price,
      max_price: self.max_price,
      min_rating: self.min_rating,
      max_rating: self.max_rating,
      wcs: self.wcs,
      listing_facets: self.facets.iter().cloned().collect(),
      typology: self.typology.iter().cloned().collect(),
      address_search: self.address.clone(),
    }
  }

  fn state(&self, polygon: Option<Polygon>) -> SearchState {
    let mut state = SearchState::default();
    state.set_search(self.query.clone());
    state.set_filters(self.filters());
    state.set_polygon(polygon);
    state.set_page(self.page);
    state
  }
}

fn parse_point(s: &str) -> Result<(f64, f64), String> {
  let (lng, lat) = s
    .split_once(',')
    .ok_or_else(|| format!("expected LNG,LAT, got '{}'", s))?;
  let lng: f64 = lng.trim().parse().map_err(|e| format!("bad longitude: {}", e))?;
  let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {}", e))?;
  Ok((lng, lat))
}

const SESSION_REJECTED: &str = "the API rejected the session; check PROPCAT_TOKEN";

fn query_failed(key: &QueryKey, error: &QueryError) -> Report {
  match error.api() {
    Some(api) if api.is_unauthorized() => eyre!("{} failed: {}", key, SESSION_REJECTED),
    _ => eyre!("{} failed: {}", key, error),
  }
}

fn write_failed(error: MutationError) -> Report {
  match &error {
    MutationError::Api(api) if api.is_unauthorized() => eyre!(SESSION_REJECTED),
    _ => Report::new(error),
  }
}

/// Wait for the observer's fetch and hand back its payload.
async fn settle<T: Send + Sync + 'static>(mut observer: QueryObserver<T>) -> Result<Arc<T>> {
  let result = observer.settled().await;
  match (result.data, result.error) {
    (_, Some(error)) => Err(query_failed(observer.key(), &error)),
    (Some(data), None) => Ok(data),
    (None, None) => Err(eyre!("{} did not run; is the session signed in?", observer.key())),
  }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[derive(Serialize)]
struct WriteOutcome {
  ok: bool,
  message: Option<String>,
}

fn print_write(message: Option<String>) -> Result<()> {
  print_json(&WriteOutcome { ok: true, message })
}

pub async fn run(command: Command, catalogue: &Catalogue) -> Result<()> {
  match command {
    Command::Property { id } => print_json(&*settle(catalogue.property(&id, true)).await?),
    Command::Properties(search) => {
      let state = search.state(None);
      print_json(&*settle(state.query(catalogue)).await?)
    }
    Command::Polygon { points, search } => {
      let state = search.state(Some(Polygon::new(points)));
      print_json(&*settle(state.query(catalogue)).await?)
    }
    Command::Titles { query } => print_json(&*settle(catalogue.property_titles(&query)).await?),
    Command::Trashed { page } => print_json(&*settle(catalogue.trashed_properties(page)).await?),
    Command::Collection { id, page } => {
      print_json(&*settle(catalogue.collection(&id, page)).await?)
    }
    Command::Collections { page, all, sidebar } => {
      if all {
        print_json(&*settle(catalogue.all_collections()).await?)
      } else if sidebar {
        print_json(&*settle(catalogue.sidebar_collections()).await?)
      } else {
        print_json(&*settle(catalogue.collections(page)).await?)
      }
    }
    Command::Tags {
      manage,
      sidebar,
      page,
    } => {
      if manage {
        print_json(&*settle(catalogue.managed_tags(page)).await?)
      } else if sidebar {
        print_json(&*settle(catalogue.sidebar_tags()).await?)
      } else {
        print_json(&*settle(catalogue.all_tags()).await?)
      }
    }
    Command::Characteristics { page } => {
      print_json(&*settle(catalogue.characteristics(page)).await?)
    }
    Command::Divisions {
      district,
      municipality,
    } => {
      let mut selection = DivisionSelection::default();
      selection.select(DivisionLevel::District, district);
      selection.select(DivisionLevel::Municipality, municipality);
      let level = DivisionLevel::ALL
        .into_iter()
        .filter(|level| selection.is_enabled(*level))
        .last()
        .unwrap_or(DivisionLevel::District);
      print_json(&*settle(selection.observe(catalogue, level)).await?)
    }
    Command::Stats => print_json(&*settle(catalogue.statistics()).await?),
    Command::History { id, extra } => {
      let property = settle(catalogue.property(&id, true)).await?;
      print_json(&property_history(&property, extra))
    }
    Command::EditCollection {
      id,
      title,
      description,
    } => {
      let description = match description {
        Some(description) => description,
        None => settle(catalogue.collection(&id, 1))
          .await?
          .collection
          .description
          .clone()
          .unwrap_or_default(),
      };
      let form = CollectionForm::new(title, description);
      print_write(catalogue.edit_collection(&id, &form).await.map_err(write_failed)?)
    }
    Command::Trash { id } => {
      print_write(catalogue.trash_property(&id).await.map_err(write_failed)?)
    }
    Command::Restore { id } => {
      print_write(catalogue.restore_property(&id).await.map_err(write_failed)?)
    }
    Command::Purge { id } => {
      print_write(catalogue.delete_property_permanently(&id).await.map_err(write_failed)?)
    }
    Command::SetCover { id, url } => {
      print_write(catalogue.set_cover(&id, &url).await.map_err(write_failed)?)
    }
    Command::RemoveCover { id } => {
      print_write(catalogue.remove_cover(&id).await.map_err(write_failed)?)
    }
    Command::DeleteOffer { id } => {
      print_write(catalogue.delete_offer(&id).await.map_err(write_failed)?)
    }
  }
}
