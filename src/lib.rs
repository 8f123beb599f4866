pub mod persistence;
pub mod sync;

pub use persistence::{load_document, Document, DB_PATH};
pub use sync::domain::{insertion_index, OrderKey, SectionKey, SectionedStore, SortKey};
pub use sync::engine::{EditOp, EditScript, EngineConfig, ListSyncEngine, SyncCommand, SyncEvent};
pub use sync::error::{MissingFieldError, ServiceError, SyncError};
pub use sync::types::{Record, RecordId, RecordKind};
