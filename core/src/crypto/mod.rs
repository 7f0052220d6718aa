//! Session-key lifecycle and chunk decryption

pub mod chunk;
pub mod keywrap;

pub use chunk::{decrypt_chunk, strip_zero_padding};
pub use keywrap::{generate_session_key, wrap_session_key};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid RSA public key: {0}")]
    InvalidPublicKey(String),
    #[error("RSA wrap failed: {0}")]
    WrapFailed(String),
    #[error("ciphertext length {0} is not a whole number of AES blocks")]
    InvalidChunkLength(usize),
    #[error("AES decryption failed")]
    DecryptFailed,
}
