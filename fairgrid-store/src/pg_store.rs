use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use fairgrid_core::error::DomainError;
use fairgrid_core::model::{
    Business, Fair, Payment, PaymentState, PaymentStatus, Place, Reservation,
};
use fairgrid_core::store::EntityStore;

pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn store_err(err: sqlx::Error) -> DomainError {
    DomainError::StoreUnavailable(err.to_string())
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct BusinessRow {
    id: Uuid,
    email: String,
    password_hash: String,
    business_name: String,
    phone: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BusinessRow> for Business {
    fn from(row: BusinessRow) -> Self {
        Business {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            business_name: row.business_name,
            phone: row.phone,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FairRow {
    id: Uuid,
    name: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FairRow> for Fair {
    fn from(row: FairRow) -> Self {
        Fair {
            id: row.id,
            name: row.name,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PlaceRow {
    id: Uuid,
    name: String,
    zone: i32,
    coordinates: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PlaceRow> for Place {
    fn from(row: PlaceRow) -> Self {
        Place {
            id: row.id,
            name: row.name,
            zone: row.zone,
            coordinates: row.coordinates,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    status: String,
    provider_ref: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: row.id,
            status: PaymentStatus::parse(&row.status),
            provider_ref: row.provider_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const STATE_UNPAID: &str = "UNPAID";
const STATE_PENDING: &str = "PENDING_PAYMENT";
const STATE_PAID: &str = "PAID";

fn state_to_columns(state: &PaymentState) -> (&'static str, Option<Uuid>) {
    match state {
        PaymentState::Unpaid => (STATE_UNPAID, None),
        PaymentState::PendingPayment { payment_id } => (STATE_PENDING, Some(*payment_id)),
        PaymentState::Paid { payment_id } => (STATE_PAID, Some(*payment_id)),
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    business_id: Uuid,
    fair_id: Uuid,
    place_id: Uuid,
    payment_id: Option<Uuid>,
    payment_state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = DomainError;

    fn try_from(row: ReservationRow) -> Result<Self, DomainError> {
        let payment_state = match (row.payment_state.as_str(), row.payment_id) {
            (STATE_UNPAID, None) => PaymentState::Unpaid,
            (STATE_PENDING, Some(payment_id)) => PaymentState::PendingPayment { payment_id },
            (STATE_PAID, Some(payment_id)) => PaymentState::Paid { payment_id },
            (state, payment_id) => {
                return Err(DomainError::StoreUnavailable(format!(
                    "reservation {} has inconsistent payment columns: state={}, payment_id={:?}",
                    row.id, state, payment_id
                )))
            }
        };
        Ok(Reservation {
            id: row.id,
            business_id: row.business_id,
            fair_id: row.fair_id,
            place_id: row.place_id,
            payment_state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn business_by_email(&self, email: &str) -> Result<Option<Business>, DomainError> {
        let row = sqlx::query_as::<_, BusinessRow>(
            "SELECT id, email, password_hash, business_name, phone, created_at, updated_at \
             FROM business WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(Business::from))
    }

    async fn fair_by_name(&self, name: &str) -> Result<Option<Fair>, DomainError> {
        let row = sqlx::query_as::<_, FairRow>(
            "SELECT id, name, starts_at, ends_at, created_at, updated_at \
             FROM fair WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(Fair::from))
    }

    async fn place_by_coordinates(
        &self,
        coordinates: &str,
    ) -> Result<Option<Place>, DomainError> {
        let row = sqlx::query_as::<_, PlaceRow>(
            "SELECT id, name, zone, coordinates, created_at, updated_at \
             FROM place WHERE coordinates = $1",
        )
        .bind(coordinates)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(Place::from))
    }

    async fn insert_business(&self, business: &Business) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO business (id, email, password_hash, business_name, phone, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(business.id)
        .bind(&business.email)
        .bind(&business.password_hash)
        .bind(&business.business_name)
        .bind(&business.phone)
        .bind(business.created_at)
        .bind(business.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn insert_fair(&self, fair: &Fair) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO fair (id, name, starts_at, ends_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(fair.id)
        .bind(&fair.name)
        .bind(fair.starts_at)
        .bind(fair.ends_at)
        .bind(fair.created_at)
        .bind(fair.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn insert_place(&self, place: &Place) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO place (id, name, zone, coordinates, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(place.id)
        .bind(&place.name)
        .bind(place.zone)
        .bind(&place.coordinates)
        .bind(place.created_at)
        .bind(place.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn assign_place(&self, fair_id: Uuid, place_id: Uuid) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO fair_place (fair_id, place_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(fair_id)
        .bind(place_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn withdraw_place(&self, fair_id: Uuid, place_id: Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM fair_place WHERE fair_id = $1 AND place_id = $2")
            .bind(fair_id)
            .bind(place_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn places_for_fair(&self, fair_id: Uuid) -> Result<Vec<Place>, DomainError> {
        let rows = sqlx::query_as::<_, PlaceRow>(
            "SELECT p.id, p.name, p.zone, p.coordinates, p.created_at, p.updated_at \
             FROM place p JOIN fair_place fp ON fp.place_id = p.id \
             WHERE fp.fair_id = $1 ORDER BY p.id",
        )
        .bind(fair_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(Place::from).collect())
    }

    async fn try_insert_reservation(
        &self,
        reservation: &Reservation,
    ) -> Result<bool, DomainError> {
        // The uniqueness constraint is the guard of record; a lost race
        // surfaces here as zero affected rows, never as a raced check.
        let (state, payment_id) = state_to_columns(&reservation.payment_state);
        let result = sqlx::query(
            "INSERT INTO reservation \
             (id, business_id, fair_id, place_id, payment_id, payment_state, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT ON CONSTRAINT uq_reservation_fair_place DO NOTHING",
        )
        .bind(reservation.id)
        .bind(reservation.business_id)
        .bind(reservation.fair_id)
        .bind(reservation.place_id)
        .bind(payment_id)
        .bind(state)
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn reservation_by_id(&self, id: Uuid) -> Result<Option<Reservation>, DomainError> {
        let row = sqlx::query_as::<_, ReservationRow>(
            "SELECT id, business_id, fair_id, place_id, payment_id, payment_state, created_at, updated_at \
             FROM reservation WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(Reservation::try_from).transpose()
    }

    async fn delete_reservation(&self, id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM reservation WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn reservation_exists(
        &self,
        fair_id: Uuid,
        place_id: Uuid,
    ) -> Result<bool, DomainError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM reservation WHERE fair_id = $1 AND place_id = $2)",
        )
        .bind(fair_id)
        .bind(place_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)
    }

    async fn latest_reservation_for_business(
        &self,
        business_id: Uuid,
    ) -> Result<Option<Reservation>, DomainError> {
        let row = sqlx::query_as::<_, ReservationRow>(
            "SELECT id, business_id, fair_id, place_id, payment_id, payment_state, created_at, updated_at \
             FROM reservation WHERE business_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        row.map(Reservation::try_from).transpose()
    }

    async fn attach_payment(
        &self,
        reservation_id: Uuid,
        payment: &Payment,
    ) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        sqlx::query(
            "INSERT INTO payment (id, status, provider_ref, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(payment.id)
        .bind(payment.status.as_str())
        .bind(&payment.provider_ref)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        let state = PaymentState::for_payment(payment);
        let (state_str, payment_id) = state_to_columns(&state);
        let result = sqlx::query(
            "UPDATE reservation SET payment_id = $1, payment_state = $2, updated_at = NOW() \
             WHERE id = $3 AND payment_id IS NULL",
        )
        .bind(payment_id)
        .bind(state_str)
        .bind(reservation_id)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(store_err)?;
            return Err(DomainError::NoOpenReservation);
        }

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn expired_unpaid_reservations(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, DomainError> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            "SELECT id, business_id, fair_id, place_id, payment_id, payment_state, created_at, updated_at \
             FROM reservation WHERE payment_state <> 'PAID' AND created_at < $1 \
             ORDER BY created_at, id",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(Reservation::try_from).collect()
    }

    async fn purge_reservation(&self, id: Uuid) -> Result<bool, DomainError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // The unpaid condition is re-checked inside the delete itself: a
        // payment landing between the expiry scan and this purge flips the
        // row to PAID and the delete matches nothing.
        let payment_id = sqlx::query_scalar::<_, Option<Uuid>>(
            "DELETE FROM reservation WHERE id = $1 AND payment_state <> 'PAID' RETURNING payment_id",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_err)?;

        let Some(payment_id) = payment_id else {
            tx.rollback().await.map_err(store_err)?;
            return Ok(false);
        };

        if let Some(payment_id) = payment_id {
            sqlx::query("DELETE FROM payment WHERE id = $1")
                .bind(payment_id)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(true)
    }

    async fn active_fairs(&self, now: DateTime<Utc>) -> Result<Vec<Fair>, DomainError> {
        let rows = sqlx::query_as::<_, FairRow>(
            "SELECT id, name, starts_at, ends_at, created_at, updated_at \
             FROM fair WHERE ends_at >= $1 ORDER BY starts_at, id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(Fair::from).collect())
    }

    async fn reservations_for_fair(
        &self,
        fair_id: Uuid,
    ) -> Result<Vec<Reservation>, DomainError> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            "SELECT id, business_id, fair_id, place_id, payment_id, payment_state, created_at, updated_at \
             FROM reservation WHERE fair_id = $1 ORDER BY created_at, id",
        )
        .bind(fair_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(Reservation::try_from).collect()
    }

    async fn payments_for_business(
        &self,
        business_id: Uuid,
    ) -> Result<Vec<Payment>, DomainError> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            "SELECT p.id, p.status, p.provider_ref, p.created_at, p.updated_at \
             FROM payment p JOIN reservation r ON r.payment_id = p.id \
             WHERE r.business_id = $1 ORDER BY p.created_at, p.id",
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(Payment::from).collect())
    }
}
