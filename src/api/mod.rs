//! Catalogue REST API: transport, response types, cache keys, and the typed
//! queries and writes built on them.

mod catalogue;
mod error;
pub mod filters;
pub mod keys;
#[cfg(test)]
pub(crate) mod mock;
mod mutations;
mod transport;
pub mod types;

pub use catalogue::Catalogue;
pub use error::ApiError;
pub use filters::{encode_pairs, Filters, ListingFacet, Polygon};
pub use keys::ResourceKind;
pub use mutations::{CollectionForm, MutationError, ValidationError, DUPLICATE_COLLECTION_MESSAGE};
pub use transport::{decode, ApiRequest, HttpTransport, RequestBody, Transport};
