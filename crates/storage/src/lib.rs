pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryRecordStore;
pub use record::{
    OperationKind, PendingOperation, ProvisionRequestRecord, ServiceBindingRecord,
    ServiceInstanceRecord,
};
pub use traits::RecordStore;
