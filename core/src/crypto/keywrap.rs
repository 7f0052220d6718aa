//! Session-key generation and RSA-OAEP wrapping
//!
//! The server mints a fresh 32-byte key per exchange and hands it to the
//! client encrypted under the client's RSA public key (OAEP, SHA-1 digest
//! to match the deployed client). The plaintext key lives only in the
//! session; the store persists the wrapped form.

use super::CryptoError;
use rand::RngCore;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha1::Sha1;
use zeroize::Zeroizing;

/// Generate a fresh 32-byte session key from the OS RNG.
pub fn generate_session_key() -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    rand::rngs::OsRng.fill_bytes(&mut *key);
    key
}

/// Encrypt a session key under the client's DER-encoded RSA public key.
pub fn wrap_session_key(public_key_der: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let public_key = RsaPublicKey::from_public_key_der(public_key_der)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    public_key
        .encrypt(&mut rand::rngs::OsRng, Oaep::new::<Sha1>(), key)
        .map_err(|e| CryptoError::WrapFailed(e.to_string()))
}
