//! Client library for a personal real-estate property catalogue.
//!
//! The crate is layered bottom-up:
//! - [`api`] talks to the remote REST API and defines one typed query per resource kind
//! - [`query`] is the client-side query cache (keys, staleness, de-duplication, invalidation)
//! - [`session`] holds the auth state every query is gated on
//! - [`view`] keeps the state a view needs (pagination, dependent selects, chart rows)

pub mod api;
pub mod config;
pub mod query;
pub mod session;
pub mod view;
