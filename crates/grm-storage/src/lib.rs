//! File persistence, export/import and credential encryption for grm.
//! Credentials are sealed with AES-GCM under a key derived from the machine id.

pub mod cipher;
pub mod credentials;
pub mod file_backend;
pub mod format;
pub mod machine_key;
pub mod transfer;
