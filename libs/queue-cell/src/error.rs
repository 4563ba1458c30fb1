use thiserror::Error;
use uuid::Uuid;

use shared_config::ConfigError;
use shared_database::SupabaseError;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Store operation failed: {0}")]
    StoreError(String),

    #[error("Queue history already exists for appointment {0}")]
    DuplicateEntry(Uuid),

    #[error("Queue history not found for appointment {0}")]
    EntryNotFound(Uuid),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SupabaseError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid queue configuration: {0}")]
    ConfigError(#[from] ConfigError),
}
