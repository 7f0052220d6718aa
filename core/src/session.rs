//! Per-connection session state
//!
//! Exactly one `Session` exists per accepted connection, owned by that
//! connection's task. Nothing here is shared; the account store is the
//! only cross-connection resource.

use crate::identity::ClientId;
use zeroize::Zeroizing;

/// Mutable state for one client connection.
pub struct Session {
    /// 16-byte client id, set on registration or taken from the login
    /// request header.
    pub client_id: Option<ClientId>,
    /// Account name, set once registration or login succeeds.
    pub name: Option<String>,
    /// Negotiated 32-byte symmetric key. Held only in process memory and
    /// wiped on drop; the store only ever sees the RSA-wrapped form.
    pub session_key: Option<Zeroizing<[u8; 32]>>,
    /// The read loop runs while this is set.
    pub active: bool,
    /// Packets received for the file currently in flight. Reset to zero
    /// when a transfer completes.
    pub chunk_count: u16,
}

impl Session {
    pub fn new() -> Self {
        Self {
            client_id: None,
            name: None,
            session_key: None,
            active: true,
            chunk_count: 0,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
