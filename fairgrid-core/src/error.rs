use uuid::Uuid;

/// Which entity a lookup failed on. Carried inside `DomainError::NotFound`
/// so callers can tell a bad business reference from a bad place reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Business,
    Fair,
    Place,
    Reservation,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Business => "business",
            EntityKind::Fair => "fair",
            EntityKind::Place => "place",
            EntityKind::Reservation => "reservation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("{0} not found: {1}")]
    NotFound(EntityKind, String),

    #[error("place {place_id} is already reserved for fair {fair_id}")]
    AlreadyReserved { fair_id: Uuid, place_id: Uuid },

    #[error("no open reservation to attach the payment to")]
    NoOpenReservation,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl DomainError {
    /// Transient infrastructure failures are safe to retry as a whole;
    /// the domain errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::StoreUnavailable(_))
    }
}
