use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub business_name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Business {
    pub fn new(email: &str, password_hash: &str, business_name: &str, phone: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            business_name: business_name.to_string(),
            phone: phone.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fair {
    pub id: Uuid,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fair {
    pub fn new(name: &str, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            starts_at,
            ends_at,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A physical booth. Whether it is reserved is not stored here: that is a
/// property of the (fair, place) pair, derived from the live reservation set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub id: Uuid,
    pub name: String,
    pub zone: i32,
    pub coordinates: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Place {
    pub fn new(name: &str, zone: i32, coordinates: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            zone,
            coordinates: coordinates.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    /// Provider-specific status codes pass through untouched.
    Other(String),
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "pending" => PaymentStatus::Pending,
            "success" => PaymentStatus::Success,
            other => PaymentStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub status: PaymentStatus,
    pub provider_ref: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(status: PaymentStatus, provider_ref: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status,
            provider_ref: provider_ref.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Explicit payment state of a reservation. The linked payment id lives
/// inside the variant so the two can never disagree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Unpaid,
    PendingPayment { payment_id: Uuid },
    Paid { payment_id: Uuid },
}

impl PaymentState {
    pub fn for_payment(payment: &Payment) -> Self {
        match payment.status {
            PaymentStatus::Success => PaymentState::Paid {
                payment_id: payment.id,
            },
            _ => PaymentState::PendingPayment {
                payment_id: payment.id,
            },
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentState::Paid { .. })
    }

    pub fn payment_id(&self) -> Option<Uuid> {
        match self {
            PaymentState::Unpaid => None,
            PaymentState::PendingPayment { payment_id } | PaymentState::Paid { payment_id } => {
                Some(*payment_id)
            }
        }
    }
}

/// A business's claim on one place for one fair. At most one live reservation
/// may exist per (fair_id, place_id); the store enforces that structurally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub business_id: Uuid,
    pub fair_id: Uuid,
    pub place_id: Uuid,
    pub payment_state: PaymentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(business_id: Uuid, fair_id: Uuid, place_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            business_id,
            fair_id,
            place_id,
            payment_state: PaymentState::Unpaid,
            created_at: now,
            updated_at: now,
        }
    }
}
