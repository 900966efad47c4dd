pub mod error;
pub mod model;
pub mod store;

pub use error::{DomainError, EntityKind};
pub use store::EntityStore;

pub type DomainResult<T> = Result<T, error::DomainError>;
