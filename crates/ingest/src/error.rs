use api_client::error::ApiError;
use database::DbError;
use thiserror::Error;

/// Failures that abort a whole sync operation.
///
/// Per-client and per-point failures never surface here; they are collected in
/// the result's error list instead.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to list client authorizations: {0}")]
    AuthorizationListing(#[source] ApiError),

    #[error("Failed to read metering points from the store: {0}")]
    StoreRead(#[source] DbError),
}
