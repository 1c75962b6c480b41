//! # Meterwise Ingest Crate
//!
//! This crate keeps the local store current with the metering provider. It is
//! the only place that talks to both the `MeteringSource` and the `MeteringStore`.
//!
//! ## Architectural Principles
//!
//! - **Partial Failure:** One bad client or metering point never aborts a run.
//!   Per-item failures are collected into the result's `errors` list; only a
//!   failure outside the per-item loops is returned as a `SyncError`.
//! - **Idempotent Ingestion:** Readings are deduplicated by natural key and
//!   upserted, so overlapping windows and repeated runs converge on the same rows.
//! - **Atomic Per Point:** A point's `last_sync_at` only moves after its readings
//!   were written. A failed write leaves the point eligible for the next run.
//! - **Sequential:** Points are visited one at a time, which keeps the provider's
//!   request rate low and lets a caller's deadline stop the run between points.
//!
//! ## Public API
//!
//! - `SyncJob`: the orchestrator, built from a source, a store and `SyncSettings`.
//! - `SyncClientsResult`, `SyncReadingsResult`: counters plus itemized errors.
//! - `ReadingSyncOptions`: staleness window and optional deadline of a reading sync.
//! - `SyncError`: the fatal failures.

use api_client::MeteringSource;
use configuration::SyncSettings;
use database::MeteringStore;
use std::sync::Arc;

pub mod clients;
pub mod error;
pub mod readings;
pub mod report;
pub mod window;

// --- Public API ---
pub use error::SyncError;
pub use readings::ReadingSyncOptions;
pub use report::{SyncClientsResult, SyncReadingsResult};

/// Reconciles authorizations, metering points and readings from a
/// `MeteringSource` into a `MeteringStore`.
pub struct SyncJob {
    source: Arc<dyn MeteringSource>,
    store: Arc<dyn MeteringStore>,
    settings: SyncSettings,
}

impl SyncJob {
    /// `settings.owner_client_id` names the operator's own account. Its points are
    /// fetched without client attribution, and it is the implicit client when
    /// the provider refuses to list authorizations.
    pub fn new(
        source: Arc<dyn MeteringSource>,
        store: Arc<dyn MeteringStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    fn owner_client_id(&self) -> Option<&str> {
        self.settings
            .owner_client_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }

    fn is_owner(&self, client_id: &str) -> bool {
        self.owner_client_id() == Some(client_id)
    }
}
