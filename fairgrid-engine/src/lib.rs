pub mod allocation;
pub mod linkage;
pub mod memory;
pub mod queries;
pub mod sweeper;

pub use allocation::AllocationService;
pub use linkage::PaymentLinkage;
pub use memory::MemoryStore;
pub use queries::QueryFacade;
pub use sweeper::ExpirySweeper;
