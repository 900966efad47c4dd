use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use fairgrid_core::error::{DomainError, EntityKind};
use fairgrid_core::model::Reservation;
use fairgrid_core::store::EntityStore;

/// Claims a place at a fair for a business. The uniqueness guard of record
/// is the store's (fair_id, place_id) constraint, not any read performed
/// here: resolution reads only pick the entities, the claim itself is a
/// single conditional insert.
pub struct AllocationService {
    store: Arc<dyn EntityStore>,
}

impl AllocationService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn create_reservation(
        &self,
        business_email: &str,
        fair_name: &str,
        place_coordinates: &str,
    ) -> Result<Reservation, DomainError> {
        let business = self
            .store
            .business_by_email(business_email)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(EntityKind::Business, business_email.to_string())
            })?;
        let fair = self
            .store
            .fair_by_name(fair_name)
            .await?
            .ok_or_else(|| DomainError::NotFound(EntityKind::Fair, fair_name.to_string()))?;
        let place = self
            .store
            .place_by_coordinates(place_coordinates)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(EntityKind::Place, place_coordinates.to_string())
            })?;

        let reservation = Reservation::new(business.id, fair.id, place.id);
        let inserted = self.store.try_insert_reservation(&reservation).await?;
        if !inserted {
            return Err(DomainError::AlreadyReserved {
                fair_id: fair.id,
                place_id: place.id,
            });
        }

        info!(
            reservation_id = %reservation.id,
            fair = fair_name,
            place = place_coordinates,
            "reservation created"
        );
        Ok(reservation)
    }

    /// Advisory read; callers may use it to avoid an obviously doomed claim,
    /// never as the correctness guard.
    pub async fn is_reserved(
        &self,
        fair_name: &str,
        place_coordinates: &str,
    ) -> Result<bool, DomainError> {
        let fair = self
            .store
            .fair_by_name(fair_name)
            .await?
            .ok_or_else(|| DomainError::NotFound(EntityKind::Fair, fair_name.to_string()))?;
        let place = self
            .store
            .place_by_coordinates(place_coordinates)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(EntityKind::Place, place_coordinates.to_string())
            })?;

        self.store.reservation_exists(fair.id, place.id).await
    }

    /// Business-initiated cancellation. Idempotent: cancelling an id that no
    /// longer exists is a no-op. The pair becomes claimable again because
    /// reservation state is derived from the reservation set itself.
    pub async fn cancel_reservation(&self, reservation_id: Uuid) -> Result<(), DomainError> {
        let removed = self.store.delete_reservation(reservation_id).await?;
        if removed {
            info!(reservation_id = %reservation_id, "reservation cancelled");
        }
        Ok(())
    }
}
