use crate::error::SyncError;
use crate::report::SyncClientsResult;
use crate::SyncJob;
use chrono::Utc;
use core_types::{Authorization, AuthorizationStatus};
use tracing::{debug, info, warn};

impl SyncJob {
    /// Syncs every client authorization and the metering points of each client.
    ///
    /// When the provider forbids listing authorizations, or lists none, the
    /// operator's own account is synced as the single implicit client.
    pub async fn sync_clients(&self) -> Result<SyncClientsResult, SyncError> {
        let mut result = SyncClientsResult::default();

        let entries = match self.source.list_authorizations().await {
            Ok(entries) => entries,
            Err(e) if e.is_permission_denied() => {
                warn!(error = %e, "authorization listing denied, falling back to the owner account");
                if self.sync_owner(&mut result).await {
                    result.errors.push(format!(
                        "Authorization listing was denied ({e}); synced the operator's own supplies instead."
                    ));
                }
                return Ok(result);
            }
            Err(e) => return Err(SyncError::AuthorizationListing(e)),
        };

        if entries.is_empty() {
            info!("no authorizations listed, falling back to the owner account");
            self.sync_owner(&mut result).await;
            return Ok(result);
        }

        result.clients_found = entries.len();
        info!(count = entries.len(), "authorizations listed");

        for entry in entries {
            let Some(client_id) = entry.client_id.filter(|id| !id.trim().is_empty()) else {
                debug!("skipping authorization without a client id");
                continue;
            };

            let now = Utc::now();
            let authorization = Authorization {
                display_name: entry
                    .display_name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| format!("Client {client_id}")),
                client_id: client_id.clone(),
                status: AuthorizationStatus::from_authorized(entry.authorized),
                created_at: now,
                updated_at: now,
            };

            if let Err(e) = self.store.upsert_authorization(&authorization).await {
                warn!(client = %client_id, error = %e, "failed to store authorization");
                result.errors.push(format!("Error upserting client {client_id}: {e}"));
                continue;
            }
            result.clients_upserted += 1;

            self.sync_supplies(Some(&client_id), &client_id, &mut result).await;
        }

        info!(
            clients = result.clients_upserted,
            supplies = result.supplies_upserted,
            errors = result.errors.len(),
            "client sync finished"
        );
        Ok(result)
    }

    /// Returns whether the owner account was stored and its supplies attempted.
    async fn sync_owner(&self, result: &mut SyncClientsResult) -> bool {
        let Some(owner) = self.owner_client_id() else {
            result
                .errors
                .push("No owner account is configured; own supplies were not synced.".to_string());
            return false;
        };

        let now = Utc::now();
        let authorization = Authorization {
            client_id: owner.to_string(),
            display_name: format!("Owner {owner}"),
            status: AuthorizationStatus::Active,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.store.upsert_authorization(&authorization).await {
            warn!(client = %owner, error = %e, "failed to store the owner account");
            result.errors.push(format!("Error upserting owner client {owner}: {e}"));
            return false;
        }
        result.clients_found = result.clients_found.max(1);
        result.clients_upserted += 1;

        // The operator's own supplies are listed without client attribution.
        self.sync_supplies(None, owner, result).await;
        true
    }

    /// Fetches the points listed under `attributed_to` and stores them as owned by `client_id`.
    async fn sync_supplies(
        &self,
        attributed_to: Option<&str>,
        client_id: &str,
        result: &mut SyncClientsResult,
    ) {
        let supplies = match self.source.list_metering_points(attributed_to).await {
            Ok(supplies) => supplies,
            Err(e) => {
                warn!(client = %client_id, error = %e, "failed to list supplies");
                result
                    .errors
                    .push(format!("Error fetching supplies for {client_id}: {e}"));
                return;
            }
        };
        result.supplies_found += supplies.len();

        for supply in supplies {
            let point = supply.into_metering_point(client_id);
            match self.store.upsert_metering_point(&point).await {
                Ok(()) => result.supplies_upserted += 1,
                Err(e) => result
                    .errors
                    .push(format!("Error upserting supply {}: {e}", point.id)),
            }
        }
    }
}
