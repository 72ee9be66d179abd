use std::fmt;

use grm_core::{ConfigBackend, ConfigStore, Key, StoreError, REMOTE};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    cipher::{self, CipherError},
    machine_key::KeyMaterial,
};

/// GitHub login of a remote. The password only exists in plaintext in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("remote '{name}' is not configured")]
    UnknownRemote { name: String },
    #[error("remote '{name}' has a stored password but no salt")]
    MissingSalt { name: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// Encrypt the password with the machine key and store username, password and
/// salt of remote `name` in a single write.
#[instrument(skip(store, credentials, key))]
pub fn store_credentials<B: ConfigBackend>(
    store: &mut ConfigStore<B>,
    name: &str,
    credentials: &Credentials,
    key: &KeyMaterial,
) -> Result<(), CredentialError> {
    if !store.contains_named(name, REMOTE) {
        return Err(CredentialError::UnknownRemote {
            name: name.to_string(),
        });
    }

    let sealed = cipher::encrypt(&credentials.password, key)?;
    store.apply_changes(|m| {
        m.named_set(name, REMOTE, Key::USERNAME, "", &credentials.username)?;
        m.named_set(name, REMOTE, Key::PASSWORD, "", &sealed.ciphertext)?;
        m.named_set(name, REMOTE, Key::SALT, "", &sealed.nonce)
    })?;
    debug!(key_id = %key.id, "credentials stored");
    Ok(())
}

/// Decrypt the stored credentials of remote `name`; `None` when no password is stored.
#[instrument(skip(store, key))]
pub fn load_credentials<B: ConfigBackend>(
    store: &ConfigStore<B>,
    name: &str,
    key: &KeyMaterial,
) -> Result<Option<Credentials>, CredentialError> {
    let Some(ciphertext) = store.named_get(name, REMOTE, Key::PASSWORD, "") else {
        return Ok(None);
    };
    let nonce = store
        .named_get(name, REMOTE, Key::SALT, "")
        .ok_or_else(|| CredentialError::MissingSalt {
            name: name.to_string(),
        })?;

    let password = cipher::decrypt(&ciphertext, &nonce, key)?;
    Ok(Some(Credentials {
        username: store
            .named_get(name, REMOTE, Key::USERNAME, "")
            .unwrap_or_default(),
        password,
    }))
}

/// Remove username, password and salt of remote `name`; returns whether anything was removed.
pub fn clear_credentials<B: ConfigBackend>(
    store: &mut ConfigStore<B>,
    name: &str,
) -> Result<bool, StoreError> {
    store.apply_changes(|m| {
        let mut removed = false;
        for key in [Key::USERNAME, Key::PASSWORD, Key::SALT] {
            removed |= m.named_unset(name, REMOTE, key, "");
        }
        Ok(removed)
    })
}

#[cfg(test)]
mod tests {
    use grm_core::InMemoryBackend;

    use super::*;
    use crate::machine_key::derive_key;

    fn store_with_remote(name: &str) -> ConfigStore<InMemoryBackend> {
        let mut store = ConfigStore::open(InMemoryBackend::new()).expect("open");
        store
            .apply_changes(|m| m.ensure_named(name, REMOTE))
            .expect("add remote");
        store
    }

    fn bob() -> Credentials {
        Credentials {
            username: "bob".into(),
            password: "hunter2".into(),
        }
    }

    #[test]
    fn stored_credentials_reload_and_decrypt() {
        let key = derive_key("machine-a");
        let mut store = store_with_remote("acme");
        store_credentials(&mut store, "acme", &bob(), &key).expect("store");
        assert_eq!(store.backend().writes(), 2);

        let reloaded = ConfigStore::open(store.backend().clone()).expect("reopen");
        assert_eq!(
            reloaded.named_get("acme", REMOTE, Key::USERNAME, ""),
            Some("bob".to_string())
        );
        assert_ne!(
            reloaded.named_get("acme", REMOTE, Key::PASSWORD, ""),
            Some("hunter2".to_string())
        );
        assert_eq!(
            load_credentials(&reloaded, "acme", &key).expect("load"),
            Some(bob())
        );
        assert_eq!(reloaded.named_get("other", REMOTE, Key::USERNAME, ""), None);
    }

    #[test]
    fn other_machine_cannot_decrypt() {
        let mut store = store_with_remote("acme");
        store_credentials(&mut store, "acme", &bob(), &derive_key("machine-a")).expect("store");

        let err = load_credentials(&store, "acme", &derive_key("machine-b"))
            .expect_err("should fail");
        assert!(matches!(
            err,
            CredentialError::Cipher(CipherError::Authentication)
        ));
    }

    #[test]
    fn missing_pieces() {
        let key = derive_key("machine-a");
        let mut store = store_with_remote("acme");
        assert!(load_credentials(&store, "acme", &key).expect("load").is_none());

        let err = store_credentials(&mut store, "nobody", &bob(), &key).expect_err("unknown");
        assert!(matches!(err, CredentialError::UnknownRemote { .. }));

        store
            .apply_changes(|m| m.named_set("acme", REMOTE, Key::PASSWORD, "", "abcd"))
            .expect("apply");
        let err = load_credentials(&store, "acme", &key).expect_err("no salt");
        assert!(matches!(err, CredentialError::MissingSalt { .. }));
    }

    #[test]
    fn clear_removes_all_three_keys() {
        let key = derive_key("machine-a");
        let mut store = store_with_remote("acme");
        store
            .apply_changes(|m| m.named_set("acme", REMOTE, Key::REMOTE_USER, "", "acme-inc"))
            .expect("apply");
        store_credentials(&mut store, "acme", &bob(), &key).expect("store");

        assert!(clear_credentials(&mut store, "acme").expect("clear"));
        assert!(!clear_credentials(&mut store, "acme").expect("clear again"));
        let section = store.named_section("acme", REMOTE);
        assert_eq!(section.keys().collect::<Vec<_>>(), vec!["user"]);
    }

    #[test]
    fn debug_hides_password() {
        let rendered = format!("{:?}", bob());
        assert!(rendered.contains("bob"));
        assert!(!rendered.contains("hunter2"));
    }
}
