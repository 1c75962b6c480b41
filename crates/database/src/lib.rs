//! # Meterwise Database Crate
//!
//! This crate is the local store the sync job reconciles into and the analysis
//! reads from.
//!
//! ## Architectural Principles
//!
//! - **Layer 3 Adapter:** All persistence details live here behind the
//!   `MeteringStore` trait. The rest of the application never sees SQL.
//! - **Keyed Upserts:** Every write is an upsert on the record's natural key, so
//!   re-running a sync over overlapping windows never duplicates rows.
//! - **Two Backends:** `DbRepository` talks to PostgreSQL through a pooled `sqlx`
//!   connection; `InMemoryStore` keeps everything in process for tests and dry runs.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: pool creation and schema setup.
//! - `MeteringStore`: the store contract consumed by the sync job.
//! - `DbRepository`, `InMemoryStore`: the two implementations.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod memory;
pub mod repository;
pub mod store;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use memory::InMemoryStore;
pub use repository::DbRepository;
pub use store::MeteringStore;
