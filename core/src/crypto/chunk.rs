//! AES-256-CBC chunk decryption
//!
//! The deployed client encrypts every 1024-byte chunk with the session key
//! and an all-zero IV, for every chunk of every transfer. The IV is part
//! of the wire contract and cannot change without breaking existing
//! clients; see DESIGN.md for the tradeoff.

use super::CryptoError;
use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// IV fixed by the client implementation.
const ZERO_IV: [u8; 16] = [0u8; 16];

/// Decrypt one ciphertext chunk with the session key.
pub fn decrypt_chunk(key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(CryptoError::InvalidChunkLength(ciphertext.len()));
    }
    let mut buf = ciphertext.to_vec();
    Aes256CbcDec::new(key.into(), (&ZERO_IV).into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| CryptoError::DecryptFailed)?;
    Ok(buf)
}

/// Strip the trailing zero bytes the client pads the final packet with.
pub fn strip_zero_padding(mut plaintext: Vec<u8>) -> Vec<u8> {
    let end = plaintext
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |pos| pos + 1);
    plaintext.truncate(end);
    plaintext
}
