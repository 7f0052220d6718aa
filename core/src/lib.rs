//! dropvault-core — authenticated, encrypted file-upload server
//!
//! A client registers (or logs back in), sends its RSA public key, gets a
//! fresh AES session key back wrapped under that public key, streams a
//! file as fixed-size encrypted chunks, and confirms the transfer once
//! the server's CRC report matches its own. One connection carries
//! exactly one session and at most one confirmed file.

pub mod checksum;
pub mod connection;
pub mod crypto;
pub mod identity;
pub mod ingest;
pub mod protocol;
pub mod server;
pub mod session;
pub mod store;

pub use connection::Connection;
pub use identity::{derive_client_id, ClientId};
pub use ingest::FileIngest;
pub use server::{run, ServerConfig};
pub use session::Session;
pub use store::{AccountStore, Existence, MemoryAccountStore, SledAccountStore, StoreError};
