use serde::Serialize;

/// Outcome of an authorization and metering-point sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncClientsResult {
    pub clients_found: usize,
    pub clients_upserted: usize,
    pub supplies_found: usize,
    pub supplies_upserted: usize,
    pub errors: Vec<String>,
}

/// Outcome of a reading sync over every stored metering point.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReadingsResult {
    pub supplies_found: usize,
    pub supplies_processed: usize,
    pub supplies_skipped_fresh: usize,
    pub total_records_inserted: usize,
    /// Points whose fetch was refused because the provider's daily quota ran out.
    pub rate_limited_points: usize,
    /// Set when the caller's deadline stopped the run before every point was visited.
    pub deadline_reached: bool,
    pub errors: Vec<String>,
}

impl SyncReadingsResult {
    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited_points > 0
    }
}
