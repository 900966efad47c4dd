use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use fairgrid_core::error::DomainError;
use fairgrid_core::store::EntityStore;

/// Unpaid reservations older than this are reclaimed.
pub fn default_grace_period() -> Duration {
    Duration::days(5)
}

/// Finds reservations whose payment never succeeded within the grace period
/// and removes them, payment included, one atomic unit per reservation.
/// A unit failure is logged and the scan moves on, so one poisoned row
/// cannot block the rest of the set.
pub struct ExpirySweeper {
    store: Arc<dyn EntityStore>,
    grace_period: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn EntityStore>, grace_period: Duration) -> Self {
        Self {
            store,
            grace_period,
        }
    }

    /// Runs one sweep against the given clock and returns how many
    /// reservations were removed. Safe to run on a cadence or on demand;
    /// a second pass over an unchanged store removes nothing.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, DomainError> {
        let cutoff = now - self.grace_period;
        let expired = self.store.expired_unpaid_reservations(cutoff).await?;

        let mut removed = 0;
        for reservation in expired {
            match self.store.purge_reservation(reservation.id).await {
                Ok(true) => {
                    info!(
                        reservation_id = %reservation.id,
                        fair_id = %reservation.fair_id,
                        place_id = %reservation.place_id,
                        "expired unpaid reservation removed"
                    );
                    removed += 1;
                }
                // Cancelled or paid between scan and purge; the store
                // re-checks the condition inside the atomic unit.
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        reservation_id = %reservation.id,
                        error = %err,
                        "failed to purge expired reservation, continuing sweep"
                    );
                }
            }
        }

        Ok(removed)
    }
}
