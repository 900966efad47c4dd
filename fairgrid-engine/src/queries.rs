use std::sync::Arc;

use chrono::{DateTime, Utc};

use fairgrid_core::error::{DomainError, EntityKind};
use fairgrid_core::model::{Fair, Payment, Place, Reservation};
use fairgrid_core::store::EntityStore;

/// Read projections for the presentation layer. No invariants of their own,
/// they only reflect current store state.
pub struct QueryFacade {
    store: Arc<dyn EntityStore>,
}

impl QueryFacade {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Fairs still running or upcoming at `now`, ordered by start time, then
    /// id, so pagination stays deterministic.
    pub async fn active_fairs(&self, now: DateTime<Utc>) -> Result<Vec<Fair>, DomainError> {
        self.store.active_fairs(now).await
    }

    /// Live reservations for a fair; the caller derives occupied-place views
    /// from these.
    pub async fn reservations_for_fair(
        &self,
        fair_name: &str,
    ) -> Result<Vec<Reservation>, DomainError> {
        let fair = self.resolve_fair(fair_name).await?;
        self.store.reservations_for_fair(fair.id).await
    }

    /// Places assigned to a fair, reserved or not.
    pub async fn places_for_fair(&self, fair_name: &str) -> Result<Vec<Place>, DomainError> {
        let fair = self.resolve_fair(fair_name).await?;
        self.store.places_for_fair(fair.id).await
    }

    /// Payments linked through the business's reservations.
    pub async fn payments_for_business(
        &self,
        business_email: &str,
    ) -> Result<Vec<Payment>, DomainError> {
        let business = self
            .store
            .business_by_email(business_email)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(EntityKind::Business, business_email.to_string())
            })?;
        self.store.payments_for_business(business.id).await
    }

    async fn resolve_fair(&self, fair_name: &str) -> Result<Fair, DomainError> {
        self.store
            .fair_by_name(fair_name)
            .await?
            .ok_or_else(|| DomainError::NotFound(EntityKind::Fair, fair_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::AllocationService;
    use crate::linkage::PaymentLinkage;
    use crate::memory::MemoryStore;
    use chrono::Duration;
    use fairgrid_core::model::{Business, Fair, PaymentStatus, Place};

    #[tokio::test]
    async fn active_fairs_are_ordered_and_exclude_finished_ones() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        let finished = Fair::new("WinterMarket", now - Duration::days(10), now - Duration::days(5));
        let mut early = Fair::new("SpringExpo", now + Duration::days(1), now + Duration::days(5));
        let mut tied = Fair::new("CraftDays", now + Duration::days(1), now + Duration::days(3));
        let late = Fair::new("AutumnFest", now + Duration::days(30), now + Duration::days(34));

        // Same start time exercises the id tie-break.
        tied.starts_at = early.starts_at;
        if tied.id < early.id {
            std::mem::swap(&mut early.id, &mut tied.id);
        }

        for fair in [&finished, &early, &tied, &late] {
            store.insert_fair(fair).await.unwrap();
        }

        let facade = QueryFacade::new(store);
        let fairs = facade.active_fairs(now).await.unwrap();
        let ids: Vec<_> = fairs.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![early.id, tied.id, late.id]);
    }

    #[tokio::test]
    async fn fair_ending_exactly_now_is_still_active() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store
            .insert_fair(&Fair::new("LastDay", now - Duration::days(4), now))
            .await
            .unwrap();

        let facade = QueryFacade::new(store);
        assert_eq!(facade.active_fairs(now).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn projections_follow_the_reservation_graph() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store
            .insert_business(&Business::new("b@x.com", "hash", "Booth Co", "+421900000001"))
            .await
            .unwrap();
        let fair = Fair::new("SpringExpo", now, now + Duration::days(4));
        store.insert_fair(&fair).await.unwrap();
        let place = Place::new("A1", 1, "10,20");
        store.insert_place(&place).await.unwrap();
        store.assign_place(fair.id, place.id).await.unwrap();

        let allocation = AllocationService::new(store.clone());
        let linkage = PaymentLinkage::new(store.clone());
        let facade = QueryFacade::new(store);

        let reservation = allocation
            .create_reservation("b@x.com", "SpringExpo", "10,20")
            .await
            .unwrap();
        let payment = linkage
            .attach_payment("b@x.com", Some(reservation.id), PaymentStatus::Success, "tx1")
            .await
            .unwrap();

        let places = facade.places_for_fair("SpringExpo").await.unwrap();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].id, place.id);

        let reservations = facade.reservations_for_fair("SpringExpo").await.unwrap();
        assert_eq!(reservations.len(), 1);
        assert_eq!(reservations[0].id, reservation.id);

        let payments = facade.payments_for_business("b@x.com").await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].id, payment.id);
    }

    #[tokio::test]
    async fn unknown_fair_reports_not_found() {
        let store = Arc::new(MemoryStore::new());
        let facade = QueryFacade::new(store);
        let err = facade.reservations_for_fair("NoSuchFair").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(EntityKind::Fair, _)));
    }
}
