//! Account store backends — sled for deployment, in-memory for tests

use super::{unix_now, AccountRecord, AccountStore, Existence, StoreError};
use crate::identity::ClientId;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

const ACCOUNTS_TREE: &str = "accounts";
const NAMES_TREE: &str = "names";

/// Sled-backed account registry. One tree maps client id to the bincode
/// account record, a second tree maps account name to client id so that
/// duplicate-name registration can be decided atomically.
pub struct SledAccountStore {
    accounts: sled::Tree,
    names: sled::Tree,
}

impl SledAccountStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(backend_err)?;
        Ok(Self {
            accounts: db.open_tree(ACCOUNTS_TREE).map_err(backend_err)?,
            names: db.open_tree(NAMES_TREE).map_err(backend_err)?,
        })
    }

    fn load(&self, id: &ClientId) -> Result<Option<AccountRecord>, StoreError> {
        match self.accounts.get(id).map_err(backend_err)? {
            Some(raw) => {
                let record = bincode::deserialize(&raw)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn save(&self, id: &ClientId, record: &AccountRecord) -> Result<(), StoreError> {
        let raw =
            bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.accounts.insert(id, raw).map_err(backend_err)?;
        self.accounts.flush().map_err(backend_err)?;
        Ok(())
    }

    fn update<F>(&self, id: &ClientId, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut AccountRecord),
    {
        let mut record = self.load(id)?.ok_or(StoreError::UnknownAccount)?;
        mutate(&mut record);
        self.save(id, &record)
    }
}

impl AccountStore for SledAccountStore {
    fn account_exists(&self, name: &str) -> Result<Existence, StoreError> {
        match self.names.contains_key(name.as_bytes()).map_err(backend_err)? {
            true => Ok(Existence::Exists),
            false => Ok(Existence::Absent),
        }
    }

    fn account_exists_with_id(&self, id: &ClientId, name: &str) -> Result<Existence, StoreError> {
        match self.load(id)? {
            Some(record) if record.name == name => Ok(Existence::Exists),
            _ => Ok(Existence::Absent),
        }
    }

    fn create_account(&self, id: &ClientId, name: &str) -> Result<(), StoreError> {
        // Claim the name first; compare_and_swap serializes racing
        // registrations for the same name.
        let claimed = self
            .names
            .compare_and_swap(name.as_bytes(), None::<&[u8]>, Some(&id[..]))
            .map_err(backend_err)?;
        if claimed.is_err() {
            return Err(StoreError::NameTaken);
        }
        self.save(id, &AccountRecord::new(name))
    }

    fn set_public_key(&self, id: &ClientId, der: &[u8]) -> Result<(), StoreError> {
        self.update(id, |record| record.public_key = Some(der.to_vec()))
    }

    fn get_public_key(&self, id: &ClientId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.load(id)?.and_then(|record| record.public_key))
    }

    fn set_wrapped_key(&self, id: &ClientId, wrapped: &[u8]) -> Result<(), StoreError> {
        self.update(id, |record| record.wrapped_key = Some(wrapped.to_vec()))
    }

    fn get_wrapped_key(&self, id: &ClientId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.load(id)?.and_then(|record| record.wrapped_key))
    }

    fn touch_last_seen(&self, id: &ClientId) -> Result<(), StoreError> {
        self.update(id, |record| record.last_seen = unix_now())
    }

    fn record_file(
        &self,
        id: &ClientId,
        name: &str,
        path: &str,
        succeeded: bool,
    ) -> Result<(), StoreError> {
        self.update(id, |record| {
            record.files.push(super::FileRecord {
                name: name.to_string(),
                path: path.to_string(),
                succeeded,
            })
        })
    }
}

fn backend_err(e: sled::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// In-memory account registry for tests.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<ClientId, AccountRecord>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<T, F>(&self, id: &ClientId, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut AccountRecord) -> T,
    {
        let mut accounts = self.accounts.write().unwrap();
        let record = accounts.get_mut(id).ok_or(StoreError::UnknownAccount)?;
        Ok(f(record))
    }
}

impl AccountStore for MemoryAccountStore {
    fn account_exists(&self, name: &str) -> Result<Existence, StoreError> {
        let accounts = self.accounts.read().unwrap();
        match accounts.values().any(|record| record.name == name) {
            true => Ok(Existence::Exists),
            false => Ok(Existence::Absent),
        }
    }

    fn account_exists_with_id(&self, id: &ClientId, name: &str) -> Result<Existence, StoreError> {
        let accounts = self.accounts.read().unwrap();
        match accounts.get(id) {
            Some(record) if record.name == name => Ok(Existence::Exists),
            _ => Ok(Existence::Absent),
        }
    }

    fn create_account(&self, id: &ClientId, name: &str) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().unwrap();
        if accounts.values().any(|record| record.name == name) {
            return Err(StoreError::NameTaken);
        }
        accounts.insert(*id, AccountRecord::new(name));
        Ok(())
    }

    fn set_public_key(&self, id: &ClientId, der: &[u8]) -> Result<(), StoreError> {
        self.with_record(id, |record| record.public_key = Some(der.to_vec()))
    }

    fn get_public_key(&self, id: &ClientId) -> Result<Option<Vec<u8>>, StoreError> {
        let accounts = self.accounts.read().unwrap();
        Ok(accounts.get(id).and_then(|record| record.public_key.clone()))
    }

    fn set_wrapped_key(&self, id: &ClientId, wrapped: &[u8]) -> Result<(), StoreError> {
        self.with_record(id, |record| record.wrapped_key = Some(wrapped.to_vec()))
    }

    fn get_wrapped_key(&self, id: &ClientId) -> Result<Option<Vec<u8>>, StoreError> {
        let accounts = self.accounts.read().unwrap();
        Ok(accounts.get(id).and_then(|record| record.wrapped_key.clone()))
    }

    fn touch_last_seen(&self, id: &ClientId) -> Result<(), StoreError> {
        self.with_record(id, |record| record.last_seen = unix_now())
    }

    fn record_file(
        &self,
        id: &ClientId,
        name: &str,
        path: &str,
        succeeded: bool,
    ) -> Result<(), StoreError> {
        self.with_record(id, |record| {
            record.files.push(super::FileRecord {
                name: name.to_string(),
                path: path.to_string(),
                succeeded,
            })
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
