use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use fairgrid_core::error::DomainError;
use fairgrid_core::model::{Business, Fair, Payment, Place, Reservation};
use fairgrid_core::store::EntityStore;

#[derive(Default)]
struct Tables {
    businesses: HashMap<Uuid, Business>,
    fairs: HashMap<Uuid, Fair>,
    places: HashMap<Uuid, Place>,
    payments: HashMap<Uuid, Payment>,
    reservations: HashMap<Uuid, Reservation>,
    fair_places: HashSet<(Uuid, Uuid)>,
}

/// In-memory `EntityStore`. A single mutex guards all tables, so the
/// conditional reservation insert is one critical section and racing
/// claims for the same (fair, place) pair resolve to exactly one winner.
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn business_by_email(&self, email: &str) -> Result<Option<Business>, DomainError> {
        let tables = self.tables.lock().await;
        Ok(tables.businesses.values().find(|b| b.email == email).cloned())
    }

    async fn fair_by_name(&self, name: &str) -> Result<Option<Fair>, DomainError> {
        let tables = self.tables.lock().await;
        Ok(tables.fairs.values().find(|f| f.name == name).cloned())
    }

    async fn place_by_coordinates(
        &self,
        coordinates: &str,
    ) -> Result<Option<Place>, DomainError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .places
            .values()
            .find(|p| p.coordinates == coordinates)
            .cloned())
    }

    async fn insert_business(&self, business: &Business) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().await;
        tables.businesses.insert(business.id, business.clone());
        Ok(())
    }

    async fn insert_fair(&self, fair: &Fair) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().await;
        tables.fairs.insert(fair.id, fair.clone());
        Ok(())
    }

    async fn insert_place(&self, place: &Place) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().await;
        tables.places.insert(place.id, place.clone());
        Ok(())
    }

    async fn assign_place(&self, fair_id: Uuid, place_id: Uuid) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().await;
        tables.fair_places.insert((fair_id, place_id));
        Ok(())
    }

    async fn withdraw_place(&self, fair_id: Uuid, place_id: Uuid) -> Result<(), DomainError> {
        let mut tables = self.tables.lock().await;
        tables.fair_places.remove(&(fair_id, place_id));
        Ok(())
    }

    async fn places_for_fair(&self, fair_id: Uuid) -> Result<Vec<Place>, DomainError> {
        let tables = self.tables.lock().await;
        let mut places: Vec<Place> = tables
            .fair_places
            .iter()
            .filter(|(f, _)| *f == fair_id)
            .filter_map(|(_, p)| tables.places.get(p).cloned())
            .collect();
        places.sort_by_key(|p| p.id);
        Ok(places)
    }

    async fn try_insert_reservation(
        &self,
        reservation: &Reservation,
    ) -> Result<bool, DomainError> {
        let mut tables = self.tables.lock().await;
        let taken = tables
            .reservations
            .values()
            .any(|r| r.fair_id == reservation.fair_id && r.place_id == reservation.place_id);
        if taken {
            return Ok(false);
        }
        tables.reservations.insert(reservation.id, reservation.clone());
        Ok(true)
    }

    async fn reservation_by_id(&self, id: Uuid) -> Result<Option<Reservation>, DomainError> {
        let tables = self.tables.lock().await;
        Ok(tables.reservations.get(&id).cloned())
    }

    async fn delete_reservation(&self, id: Uuid) -> Result<bool, DomainError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.reservations.remove(&id).is_some())
    }

    async fn reservation_exists(
        &self,
        fair_id: Uuid,
        place_id: Uuid,
    ) -> Result<bool, DomainError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reservations
            .values()
            .any(|r| r.fair_id == fair_id && r.place_id == place_id))
    }

    async fn latest_reservation_for_business(
        &self,
        business_id: Uuid,
    ) -> Result<Option<Reservation>, DomainError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reservations
            .values()
            .filter(|r| r.business_id == business_id)
            .max_by_key(|r| (r.created_at, r.id))
            .cloned())
    }

    async fn attach_payment(
        &self,
        reservation_id: Uuid,
        payment: &Payment,
    ) -> Result<(), DomainError> {
        use fairgrid_core::model::PaymentState;

        let mut tables = self.tables.lock().await;
        let reservation = tables
            .reservations
            .get_mut(&reservation_id)
            .ok_or(DomainError::NoOpenReservation)?;
        if reservation.payment_state != PaymentState::Unpaid {
            return Err(DomainError::NoOpenReservation);
        }
        reservation.payment_state = PaymentState::for_payment(payment);
        reservation.updated_at = Utc::now();
        tables.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn expired_unpaid_reservations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, DomainError> {
        let tables = self.tables.lock().await;
        let mut matches: Vec<Reservation> = tables
            .reservations
            .values()
            .filter(|r| !r.payment_state.is_paid() && r.created_at < cutoff)
            .cloned()
            .collect();
        matches.sort_by_key(|r| (r.created_at, r.id));
        Ok(matches)
    }

    async fn purge_reservation(&self, id: Uuid) -> Result<bool, DomainError> {
        let mut tables = self.tables.lock().await;
        // Re-check under the lock: a payment may have succeeded since the
        // reservation was matched for expiry.
        let Some(reservation) = tables.reservations.get(&id) else {
            return Ok(false);
        };
        if reservation.payment_state.is_paid() {
            return Ok(false);
        }
        let payment_id = reservation.payment_state.payment_id();
        tables.reservations.remove(&id);
        if let Some(payment_id) = payment_id {
            tables.payments.remove(&payment_id);
        }
        Ok(true)
    }

    async fn active_fairs(&self, now: DateTime<Utc>) -> Result<Vec<Fair>, DomainError> {
        let tables = self.tables.lock().await;
        let mut fairs: Vec<Fair> = tables
            .fairs
            .values()
            .filter(|f| f.ends_at >= now)
            .cloned()
            .collect();
        fairs.sort_by_key(|f| (f.starts_at, f.id));
        Ok(fairs)
    }

    async fn reservations_for_fair(
        &self,
        fair_id: Uuid,
    ) -> Result<Vec<Reservation>, DomainError> {
        let tables = self.tables.lock().await;
        let mut reservations: Vec<Reservation> = tables
            .reservations
            .values()
            .filter(|r| r.fair_id == fair_id)
            .cloned()
            .collect();
        reservations.sort_by_key(|r| (r.created_at, r.id));
        Ok(reservations)
    }

    async fn payments_for_business(
        &self,
        business_id: Uuid,
    ) -> Result<Vec<Payment>, DomainError> {
        let tables = self.tables.lock().await;
        let mut payments: Vec<Payment> = tables
            .reservations
            .values()
            .filter(|r| r.business_id == business_id)
            .filter_map(|r| r.payment_state.payment_id())
            .filter_map(|id| tables.payments.get(&id).cloned())
            .collect();
        payments.sort_by_key(|p| (p.created_at, p.id));
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairgrid_core::model::{PaymentStatus, Reservation};

    #[tokio::test]
    async fn conditional_insert_rejects_second_claim_for_pair() {
        let store = MemoryStore::new();
        let fair_id = Uuid::new_v4();
        let place_id = Uuid::new_v4();

        let first = Reservation::new(Uuid::new_v4(), fair_id, place_id);
        let second = Reservation::new(Uuid::new_v4(), fair_id, place_id);

        assert!(store.try_insert_reservation(&first).await.unwrap());
        assert!(!store.try_insert_reservation(&second).await.unwrap());
        assert!(store.reservation_exists(fair_id, place_id).await.unwrap());
    }

    #[tokio::test]
    async fn attach_payment_is_exclusive() {
        let store = MemoryStore::new();
        let reservation = Reservation::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.try_insert_reservation(&reservation).await.unwrap();

        let first = Payment::new(PaymentStatus::Success, "tx1");
        store.attach_payment(reservation.id, &first).await.unwrap();

        let second = Payment::new(PaymentStatus::Success, "tx2");
        let err = store.attach_payment(reservation.id, &second).await.unwrap_err();
        assert!(matches!(err, DomainError::NoOpenReservation));
    }

    #[tokio::test]
    async fn purge_spares_reservation_paid_after_the_expiry_scan() {
        use chrono::Duration;

        let store = MemoryStore::new();
        let business_id = Uuid::new_v4();
        let reservation = Reservation::new(business_id, Uuid::new_v4(), Uuid::new_v4());
        store.try_insert_reservation(&reservation).await.unwrap();

        // The scan matches the still-unpaid reservation.
        let matched = store
            .expired_unpaid_reservations(reservation.created_at + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(matched.len(), 1);

        // A gateway callback lands before the purge reaches it.
        let payment = Payment::new(PaymentStatus::Success, "tx1");
        store.attach_payment(reservation.id, &payment).await.unwrap();

        assert!(!store.purge_reservation(matched[0].id).await.unwrap());
        assert!(store.reservation_by_id(reservation.id).await.unwrap().is_some());
        assert_eq!(store.payments_for_business(business_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn purge_removes_reservation_and_linked_payment() {
        let store = MemoryStore::new();
        let business_id = Uuid::new_v4();
        let reservation = Reservation::new(business_id, Uuid::new_v4(), Uuid::new_v4());
        store.try_insert_reservation(&reservation).await.unwrap();

        let payment = Payment::new(PaymentStatus::Pending, "tx1");
        store.attach_payment(reservation.id, &payment).await.unwrap();

        assert!(store.purge_reservation(reservation.id).await.unwrap());
        assert!(store.reservation_by_id(reservation.id).await.unwrap().is_none());
        assert!(store
            .payments_for_business(business_id)
            .await
            .unwrap()
            .is_empty());

        // Second purge is a no-op.
        assert!(!store.purge_reservation(reservation.id).await.unwrap());
    }
}
