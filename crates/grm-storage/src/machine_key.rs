use std::fmt;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Key material used to encrypt stored credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Identifier for logging (never log key bytes).
    pub id: String,
    /// 256-bit symmetric key.
    pub bytes: [u8; 32],
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("id", &self.id)
            .field("bytes", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("could not determine machine id: {0}")]
    MachineId(String),
}

/// Source of the stable, OS-provided machine identifier.
pub trait MachineIdProvider {
    fn machine_id(&self) -> Result<String, KeyError>;
}

/// Reads the identifier the operating system assigns to this machine
/// (systemd/dbus machine id, `IOPlatformUUID`, `MachineGuid`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMachineId;

impl MachineIdProvider for SystemMachineId {
    fn machine_id(&self) -> Result<String, KeyError> {
        machine_uid::get().map_err(|e| KeyError::MachineId(e.to_string()))
    }
}

/// Fixed identifier for tests.
#[derive(Debug, Clone)]
pub struct StaticMachineId(String);

impl StaticMachineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl MachineIdProvider for StaticMachineId {
    fn machine_id(&self) -> Result<String, KeyError> {
        Ok(self.0.clone())
    }
}

/// SHA-256 of the raw machine identifier. Deterministic per machine, so
/// ciphertext written on one machine cannot be opened on another.
pub fn derive_key(machine_id: &str) -> KeyMaterial {
    let digest = Sha256::digest(machine_id.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    KeyMaterial {
        id: "machine".to_string(),
        bytes,
    }
}

/// Derive the local key from a provider's machine id.
pub fn machine_key<P: MachineIdProvider + ?Sized>(provider: &P) -> Result<KeyMaterial, KeyError> {
    let id = provider.machine_id()?;
    if id.trim().is_empty() {
        return Err(KeyError::MachineId("empty machine id".to_string()));
    }
    Ok(derive_key(id.trim()))
}
