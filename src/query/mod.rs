//! Client-side query cache for server state.
//!
//! Inspired by TanStack Query: a [`QueryClient`] maps a [`QueryKey`] to a cached
//! entry, runs the fetch function for it at most once at a time, and tells every
//! mounted [`QueryObserver`] when the entry changes.
//!
//! # Example
//!
//! ```ignore
//! let client = QueryClient::new(CacheOptions::default());
//! client.set_auth(AuthContext::authenticated(token));
//!
//! let transport = transport.clone();
//! let mut statistics = client.use_query(
//!     QueryKey::new("statistics"),
//!     move || {
//!         let transport = transport.clone();
//!         async move { transport.request(ApiRequest::get("me/statistics")).await }
//!     },
//!     QueryOptions::default(),
//! );
//!
//! // In render
//! let result = statistics.result();
//! if result.is_loading {
//!     render_spinner();
//! } else if let Some(stats) = result.data() {
//!     render_stats(stats);
//! }
//!
//! // Or wait until the fetch lands
//! let result = statistics.settled().await;
//! ```

mod client;
mod error;
mod key;
mod observer;
mod state;

pub use client::{CacheOptions, QueryClient};
pub use error::QueryError;
pub use key::{KeyPart, QueryFilter, QueryKey};
pub use observer::QueryObserver;
pub use state::{QueryOptions, QueryResult, QueryStatus, StaleTime};
