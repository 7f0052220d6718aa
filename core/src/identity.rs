//! Deterministic client identifiers
//!
//! A client id is the 16 bytes of a name-based (v5) UUID over the account
//! name. Registering the same name always yields the same id, which keeps
//! the id stable for the life of the account.

use crate::protocol::CLIENT_ID_LEN;
use uuid::Uuid;

pub type ClientId = [u8; CLIENT_ID_LEN];

/// Derive the stable 16-byte client id for an account name.
pub fn derive_client_id(name: &str) -> ClientId {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).into_bytes()
}

/// Hex rendering for log lines.
pub fn client_id_hex(id: &ClientId) -> String {
    hex::encode(id)
}
