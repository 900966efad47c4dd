use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::model::{Business, Fair, Payment, Place, Reservation};

/// Persistence seam for the reservation engine. One implementation backed by
/// Postgres, one in-memory for tests; both must serialize conflicting
/// reservation inserts so that exactly one of N racing claims for the same
/// (fair, place) pair lands.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // Entity resolution by natural key.
    async fn business_by_email(&self, email: &str) -> Result<Option<Business>, DomainError>;
    async fn fair_by_name(&self, name: &str) -> Result<Option<Fair>, DomainError>;
    async fn place_by_coordinates(&self, coordinates: &str)
        -> Result<Option<Place>, DomainError>;

    // Entity inserts (seeding and the admin-facing collaborators).
    async fn insert_business(&self, business: &Business) -> Result<(), DomainError>;
    async fn insert_fair(&self, fair: &Fair) -> Result<(), DomainError>;
    async fn insert_place(&self, place: &Place) -> Result<(), DomainError>;

    // Fair <-> place association.
    async fn assign_place(&self, fair_id: Uuid, place_id: Uuid) -> Result<(), DomainError>;
    async fn withdraw_place(&self, fair_id: Uuid, place_id: Uuid) -> Result<(), DomainError>;
    async fn places_for_fair(&self, fair_id: Uuid) -> Result<Vec<Place>, DomainError>;

    /// Conditional insert guarded by the (fair_id, place_id) uniqueness
    /// constraint. Returns false when a live reservation already holds the
    /// pair; the existence check and the insert are one atomic unit.
    async fn try_insert_reservation(&self, reservation: &Reservation)
        -> Result<bool, DomainError>;

    async fn reservation_by_id(&self, id: Uuid) -> Result<Option<Reservation>, DomainError>;

    /// Returns whether a row was removed. Absent ids are not an error.
    async fn delete_reservation(&self, id: Uuid) -> Result<bool, DomainError>;

    async fn reservation_exists(&self, fair_id: Uuid, place_id: Uuid)
        -> Result<bool, DomainError>;

    /// The business's most recently created reservation, if any.
    async fn latest_reservation_for_business(
        &self,
        business_id: Uuid,
    ) -> Result<Option<Reservation>, DomainError>;

    /// Inserts the payment and links it to the reservation in one atomic
    /// unit. Fails with `NoOpenReservation` when the reservation is gone or
    /// already holds a payment.
    async fn attach_payment(
        &self,
        reservation_id: Uuid,
        payment: &Payment,
    ) -> Result<(), DomainError>;

    /// Reservations with no successful payment created strictly before
    /// `cutoff`, in creation order.
    async fn expired_unpaid_reservations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, DomainError>;

    /// Deletes the reservation and its linked payment, if any, as one atomic
    /// unit. The unpaid condition is re-checked inside the unit: a
    /// reservation whose payment succeeded after it was matched for expiry
    /// is left alone. Returns false when nothing was removed.
    async fn purge_reservation(&self, id: Uuid) -> Result<bool, DomainError>;

    // Read projections.
    async fn active_fairs(&self, now: DateTime<Utc>) -> Result<Vec<Fair>, DomainError>;
    async fn reservations_for_fair(&self, fair_id: Uuid)
        -> Result<Vec<Reservation>, DomainError>;
    async fn payments_for_business(&self, business_id: Uuid)
        -> Result<Vec<Payment>, DomainError>;
}
