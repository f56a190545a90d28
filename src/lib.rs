//! Customer Review Portal Library
//!
//! Review aggregation for a logistics company's public review portal: the
//! pure filter/sort/statistics pipeline, the spotlight rotation, and the
//! store, identity and HTTP plumbing around them.
//!
//! # Modules
//!
//! - `aggregation`: Filtering, sorting and statistics over a review snapshot.
//! - `rotation`: Spotlight index selection and the rotation timer.
//! - `models`: Review records, view parameters and API shapes.
//! - `documents`: Coercion of raw store documents into review records.
//! - `feed`: Latest-snapshot channel and subscriptions.
//! - `store`: Review store trait and the in-memory store.
//! - `db`: Database connection and schema.
//! - `db_storage`: PostgreSQL review store.
//! - `verification`: Consignment reference verification.
//! - `identity`: Per-request user identity.
//! - `circuit_breaker`: Circuit breaker for store calls.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `routes`: Router assembly.

pub mod aggregation;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod documents;
pub mod errors;
pub mod feed;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod rotation;
pub mod routes;
pub mod store;
pub mod verification;
