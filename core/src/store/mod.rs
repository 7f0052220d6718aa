//! Durable account registry shared by all connections

pub mod backend;

pub use backend::{MemoryAccountStore, SledAccountStore};

use crate::identity::ClientId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("record serialization error: {0}")]
    Serialization(String),
    #[error("no account for the given id")]
    UnknownAccount,
    #[error("account name already taken")]
    NameTaken,
}

/// Lookup outcome. Distinct from `StoreError` so a failed lookup is never
/// confusable with an absent account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Exists,
    Absent,
}

/// One received file, as recorded against an account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub path: String,
    pub succeeded: bool,
}

/// Persisted account state. The wrapped key is the only key material that
/// ever reaches the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountRecord {
    pub name: String,
    pub public_key: Option<Vec<u8>>,
    pub wrapped_key: Option<Vec<u8>>,
    pub last_seen: u64,
    pub files: Vec<FileRecord>,
}

impl AccountRecord {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            public_key: None,
            wrapped_key: None,
            last_seen: 0,
            files: Vec::new(),
        }
    }
}

/// The shared account registry. Implementations must be safe to call from
/// many connection tasks at once.
pub trait AccountStore: Send + Sync {
    /// Does any account with this name exist?
    fn account_exists(&self, name: &str) -> Result<Existence, StoreError>;

    /// Does an account with this id exist, and does its stored name match?
    fn account_exists_with_id(&self, id: &ClientId, name: &str) -> Result<Existence, StoreError>;

    fn create_account(&self, id: &ClientId, name: &str) -> Result<(), StoreError>;

    fn set_public_key(&self, id: &ClientId, der: &[u8]) -> Result<(), StoreError>;
    fn get_public_key(&self, id: &ClientId) -> Result<Option<Vec<u8>>, StoreError>;

    fn set_wrapped_key(&self, id: &ClientId, wrapped: &[u8]) -> Result<(), StoreError>;
    fn get_wrapped_key(&self, id: &ClientId) -> Result<Option<Vec<u8>>, StoreError>;

    fn touch_last_seen(&self, id: &ClientId) -> Result<(), StoreError>;

    fn record_file(
        &self,
        id: &ClientId,
        name: &str,
        path: &str,
        succeeded: bool,
    ) -> Result<(), StoreError>;
}

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
