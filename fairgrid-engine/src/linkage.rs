use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use fairgrid_core::error::{DomainError, EntityKind};
use fairgrid_core::model::{Payment, PaymentStatus, Reservation};
use fairgrid_core::store::EntityStore;

/// Attaches a completed payment to a reservation. The primary contract
/// carries the reservation id from the payment-initiating call; when the
/// caller cannot supply one (gateway callbacks that only know the business),
/// the fallback picks the business's most recent reservation. The fallback
/// misattributes when a business opens a second reservation before paying
/// the first, which is why it is not the primary path.
pub struct PaymentLinkage {
    store: Arc<dyn EntityStore>,
}

impl PaymentLinkage {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn attach_payment(
        &self,
        business_email: &str,
        reservation_id: Option<Uuid>,
        status: PaymentStatus,
        provider_ref: &str,
    ) -> Result<Payment, DomainError> {
        let business = self
            .store
            .business_by_email(business_email)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(EntityKind::Business, business_email.to_string())
            })?;

        let target = match reservation_id {
            Some(id) => {
                let reservation = self
                    .store
                    .reservation_by_id(id)
                    .await?
                    .ok_or(DomainError::NoOpenReservation)?;
                // An id pointing at someone else's reservation is treated the
                // same as having nothing to attach to.
                if reservation.business_id != business.id {
                    return Err(DomainError::NoOpenReservation);
                }
                reservation
            }
            None => self.latest_open(business.id).await?,
        };

        let payment = Payment::new(status, provider_ref);
        self.store.attach_payment(target.id, &payment).await?;

        info!(
            payment_id = %payment.id,
            reservation_id = %target.id,
            status = payment.status.as_str(),
            "payment linked to reservation"
        );
        Ok(payment)
    }

    async fn latest_open(&self, business_id: Uuid) -> Result<Reservation, DomainError> {
        let latest = self
            .store
            .latest_reservation_for_business(business_id)
            .await?
            .ok_or(DomainError::NoOpenReservation)?;
        if latest.payment_state.payment_id().is_some() {
            return Err(DomainError::NoOpenReservation);
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::AllocationService;
    use crate::memory::MemoryStore;
    use chrono::{Duration, Utc};
    use fairgrid_core::model::{Business, Fair, PaymentState, Place};

    struct Fixture {
        store: Arc<MemoryStore>,
        allocation: AllocationService,
        linkage: PaymentLinkage,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store
            .insert_business(&Business::new("b@x.com", "hash", "Booth Co", "+421900000001"))
            .await
            .unwrap();
        store
            .insert_fair(&Fair::new("SpringExpo", now, now + Duration::days(4)))
            .await
            .unwrap();
        store.insert_place(&Place::new("A1", 1, "10,20")).await.unwrap();
        store.insert_place(&Place::new("A2", 1, "10,30")).await.unwrap();
        Fixture {
            allocation: AllocationService::new(store.clone()),
            linkage: PaymentLinkage::new(store.clone()),
            store,
        }
    }

    #[tokio::test]
    async fn recency_fallback_attaches_to_latest_reservation() {
        let fx = fixture().await;
        let reservation = fx
            .allocation
            .create_reservation("b@x.com", "SpringExpo", "10,20")
            .await
            .unwrap();

        let payment = fx
            .linkage
            .attach_payment("b@x.com", None, PaymentStatus::Success, "tx1")
            .await
            .unwrap();

        let stored = fx
            .store
            .reservation_by_id(reservation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.payment_state,
            PaymentState::Paid { payment_id: payment.id }
        );
    }

    #[tokio::test]
    async fn pending_status_leaves_reservation_awaiting_payment() {
        let fx = fixture().await;
        let reservation = fx
            .allocation
            .create_reservation("b@x.com", "SpringExpo", "10,20")
            .await
            .unwrap();

        let payment = fx
            .linkage
            .attach_payment("b@x.com", Some(reservation.id), PaymentStatus::Pending, "tx1")
            .await
            .unwrap();

        let stored = fx
            .store
            .reservation_by_id(reservation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.payment_state,
            PaymentState::PendingPayment { payment_id: payment.id }
        );
    }

    #[tokio::test]
    async fn attaching_twice_fails_with_no_open_reservation() {
        let fx = fixture().await;
        let reservation = fx
            .allocation
            .create_reservation("b@x.com", "SpringExpo", "10,20")
            .await
            .unwrap();

        fx.linkage
            .attach_payment("b@x.com", Some(reservation.id), PaymentStatus::Success, "tx1")
            .await
            .unwrap();
        let err = fx
            .linkage
            .attach_payment("b@x.com", Some(reservation.id), PaymentStatus::Success, "tx2")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NoOpenReservation));
    }

    #[tokio::test]
    async fn no_reservations_means_nothing_to_attach_to() {
        let fx = fixture().await;
        let err = fx
            .linkage
            .attach_payment("b@x.com", None, PaymentStatus::Success, "tx1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NoOpenReservation));
    }

    #[tokio::test]
    async fn explicit_id_reaches_the_older_open_reservation() {
        // The case the recency fallback gets wrong: a second reservation is
        // opened before the first is paid.
        let fx = fixture().await;
        let first = fx
            .allocation
            .create_reservation("b@x.com", "SpringExpo", "10,20")
            .await
            .unwrap();
        let _second = fx
            .allocation
            .create_reservation("b@x.com", "SpringExpo", "10,30")
            .await
            .unwrap();

        let payment = fx
            .linkage
            .attach_payment("b@x.com", Some(first.id), PaymentStatus::Success, "tx1")
            .await
            .unwrap();

        let stored = fx.store.reservation_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(
            stored.payment_state,
            PaymentState::Paid { payment_id: payment.id }
        );
    }

    #[tokio::test]
    async fn someone_elses_reservation_id_is_rejected() {
        let fx = fixture().await;
        fx.store
            .insert_business(&Business::new("c@x.com", "hash", "Rival Co", "+421900000002"))
            .await
            .unwrap();
        let reservation = fx
            .allocation
            .create_reservation("b@x.com", "SpringExpo", "10,20")
            .await
            .unwrap();

        let err = fx
            .linkage
            .attach_payment("c@x.com", Some(reservation.id), PaymentStatus::Success, "tx1")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NoOpenReservation));
    }
}
