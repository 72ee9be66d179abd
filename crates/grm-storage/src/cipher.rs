use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use crate::machine_key::KeyMaterial;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Encrypted value and the nonce it was sealed with, both base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: String,
    pub nonce: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("cipher init failed: {0}")]
    Init(String),
    #[error("encrypt failed")]
    Encrypt,
    #[error("{field} decode failed: {reason}")]
    Decode { field: &'static str, reason: String },
    #[error("nonce must be 12 bytes, got {0}")]
    NonceLength(usize),
    /// Tag mismatch: tampered data, wrong nonce or a key from another machine.
    #[error("decrypt failed: value was not sealed with this machine's key")]
    Authentication,
    #[error("decrypted value is not valid UTF-8")]
    Utf8,
}

/// Seal `plaintext` under a fresh random nonce.
pub fn encrypt(plaintext: &str, key: &KeyMaterial) -> Result<Sealed, CipherError> {
    let cipher = build_cipher(key)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| CipherError::Encrypt)?;

    Ok(Sealed {
        ciphertext: STANDARD.encode(ciphertext),
        nonce: STANDARD.encode(nonce.as_slice()),
    })
}

/// Open a value produced by [`encrypt`]. Never returns unauthenticated data.
pub fn decrypt(ciphertext: &str, nonce: &str, key: &KeyMaterial) -> Result<String, CipherError> {
    let cipher = build_cipher(key)?;

    let nonce_bytes = STANDARD.decode(nonce).map_err(|e| CipherError::Decode {
        field: "nonce",
        reason: e.to_string(),
    })?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(CipherError::NonceLength(nonce_bytes.len()));
    }
    let nonce = Nonce::from_slice(&nonce_bytes);

    let data = STANDARD
        .decode(ciphertext)
        .map_err(|e| CipherError::Decode {
            field: "ciphertext",
            reason: e.to_string(),
        })?;

    let plaintext = cipher
        .decrypt(nonce, data.as_ref())
        .map_err(|_| CipherError::Authentication)?;
    String::from_utf8(plaintext).map_err(|_| CipherError::Utf8)
}

fn build_cipher(material: &KeyMaterial) -> Result<Aes256Gcm, CipherError> {
    Aes256Gcm::new_from_slice(&material.bytes).map_err(|e| CipherError::Init(e.to_string()))
}
