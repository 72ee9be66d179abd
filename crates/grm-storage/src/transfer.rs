//! Sharing a remote's settings between machines. Artifacts use the config
//! text format and never contain credentials.

use std::{
    fs,
    path::{Path, PathBuf},
};

use grm_core::{
    ConfigBackend, ConfigStore, Entries, NamedSection, RawSections, SectionId, StoreError,
};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::{
    file_backend::write_atomic,
    format::{self, ParseError},
};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("'{name}' is not configured")]
    UnknownSection { name: String },
    #[error("could not read '{path}': {reason}")]
    Read { path: String, reason: String },
    #[error("could not parse '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },
    #[error("could not write '{path}': {reason}")]
    Write { path: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `<name>.config` in the current directory.
pub fn default_export_path(name: &str) -> PathBuf {
    PathBuf::from(format!("{name}.config"))
}

/// Write the exportable entries of instance `name` to `path`. Returns the number
/// of entries written.
#[instrument(skip(store))]
pub fn export_to_file<B: ConfigBackend>(
    store: &ConfigStore<B>,
    name: &str,
    section: NamedSection,
    path: &Path,
) -> Result<usize, TransferError> {
    if !store.contains_named(name, section) {
        return Err(TransferError::UnknownSection {
            name: name.to_string(),
        });
    }

    let entries = store.export_named(name, section);
    let count = entries.len();
    let artifact = RawSections::from([(section.instance(name).to_string(), entries)]);
    write_atomic(path, format::render(&artifact).as_bytes()).map_err(|e| {
        TransferError::Write {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
    })?;

    info!(count, "exported configuration");
    Ok(count)
}

/// Import an artifact into instance `target`, creating it if needed.
///
/// Entries of every section built from the same template are merged in header
/// order, later sections winning, with a warning when there is more than one.
/// The instance name recorded in the artifact is ignored.
#[instrument(skip(store))]
pub fn import_from_file<B: ConfigBackend>(
    store: &mut ConfigStore<B>,
    path: &Path,
    target: &str,
    section: NamedSection,
) -> Result<usize, TransferError> {
    let text = fs::read_to_string(path).map_err(|e| TransferError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let artifact = format::parse(&text).map_err(|source| TransferError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    let mut entries = Entries::new();
    let mut merged = 0;
    for (header, values) in artifact {
        match SectionId::parse(&header) {
            Some(SectionId::Named(found, _)) if found == section => {
                merged += 1;
                if merged > 1 {
                    warn!(%header, "merging another matching section; its entries win");
                }
                entries.extend(values);
            }
            _ => warn!(%header, "ignoring section that does not match the import target"),
        }
    }

    let imported = store.apply_changes(|m| {
        m.ensure_named(target, section)?;
        m.import_named(target, section, &entries)
    })?;
    info!(imported, "imported configuration");
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use grm_core::{InMemoryBackend, Key, REMOTE};

    use super::*;

    fn source_store() -> ConfigStore<InMemoryBackend> {
        let mut store = ConfigStore::open(InMemoryBackend::new()).expect("open");
        store
            .apply_changes(|m| {
                m.named_set("acme", REMOTE, Key::USERNAME, "", "bob")?;
                m.named_set("acme", REMOTE, Key::PASSWORD, "", "Y2lwaGVy")?;
                m.named_set("acme", REMOTE, Key::SALT, "", "bm9uY2U=")?;
                m.named_set("acme", REMOTE, Key::REMOTE_USER, "", "acme-inc")?;
                m.named_set("acme", REMOTE, Key::SHOW_PRIVATE, "", "true")?;
                m.named_set("acme", REMOTE, Key::DOWNLOAD_URL, "", "https://dl/{tag}")?;
                m.named_set("acme", REMOTE, Key::DOWNLOAD_URL, "cli", "https://cli/{tag}")?;
                m.named_set("acme", REMOTE, Key::REPOSITORY_BLACKLISTED, "legacy", "true")
            })
            .expect("apply");
        store
    }

    #[test]
    fn export_then_import_reproduces_exportable_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shared").join("acme.config");
        let source = source_store();

        let exported = export_to_file(&source, "acme", REMOTE, &path).expect("export");
        assert_eq!(exported, 5);
        let text = fs::read_to_string(&path).expect("read");
        assert!(text.starts_with("[Remote \"acme\"]\n"));
        for secret in ["bob", "Y2lwaGVy", "bm9uY2U=", "password", "salt", "username"] {
            assert!(!text.contains(secret), "{secret} leaked into export");
        }

        let mut target = ConfigStore::open(InMemoryBackend::new()).expect("open");
        let imported = import_from_file(&mut target, &path, "copy", REMOTE).expect("import");
        assert_eq!(imported, 5);
        assert_eq!(
            target.named_section("copy", REMOTE),
            source.export_named("acme", REMOTE)
        );
        assert_eq!(target.named_get("copy", REMOTE, Key::PASSWORD, ""), None);
        assert_eq!(target.named_get("copy", REMOTE, Key::SALT, ""), None);
        assert_eq!(target.backend().writes(), 1);
    }

    #[test]
    fn reimport_overwrites_instead_of_accumulating() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("acme.config");
        let mut store = source_store();
        export_to_file(&store, "acme", REMOTE, &path).expect("export");

        store
            .apply_changes(|m| {
                m.named_set("acme", REMOTE, Key::REMOTE_USER, "", "renamed")?;
                m.named_set("acme", REMOTE, Key::MILESTONE_PATTERN, "", "^m")
            })
            .expect("edit");
        import_from_file(&mut store, &path, "acme", REMOTE).expect("import");
        import_from_file(&mut store, &path, "acme", REMOTE).expect("import twice");

        let section = store.named_section("acme", REMOTE);
        assert_eq!(section["user"], "acme-inc");
        assert_eq!(section["milestone-pattern"], "^m");
        assert_eq!(section["username"], "bob");
        assert_eq!(section.len(), 9);
    }

    #[test]
    fn import_ignores_foreign_sections_and_artifact_instance_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("team.config");
        fs::write(
            &path,
            concat!(
                "[Remote \"someone-else\"]\n\tuser = team\n\tpassword = nope\n\n",
                "[Defaults]\n\tshow-private = true\n",
            ),
        )
        .expect("write");

        let mut store = ConfigStore::open(InMemoryBackend::new()).expect("open");
        let imported = import_from_file(&mut store, &path, "team", REMOTE).expect("import");

        assert_eq!(imported, 1);
        assert_eq!(
            store.named_section("team", REMOTE),
            Entries::from([("user".to_string(), "team".to_string())])
        );
        assert!(!store.contains_named("someone-else", REMOTE));
    }

    #[test]
    fn several_matching_sections_merge_in_header_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("team.config");
        fs::write(
            &path,
            concat!(
                "[Remote \"alpha\"]\n\tuser = one\n\tshow-private = true\n\n",
                "[Remote \"beta\"]\n\tuser = two\n",
            ),
        )
        .expect("write");

        let mut store = ConfigStore::open(InMemoryBackend::new()).expect("open");
        let imported = import_from_file(&mut store, &path, "team", REMOTE).expect("import");

        assert_eq!(imported, 2);
        assert_eq!(
            store.named_section("team", REMOTE),
            Entries::from([
                ("show-private".to_string(), "true".to_string()),
                ("user".to_string(), "two".to_string()),
            ])
        );
    }

    #[test]
    fn failures_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = source_store();
        let err = export_to_file(&store, "missing", REMOTE, &dir.path().join("x.config"))
            .expect_err("unknown remote");
        assert!(matches!(err, TransferError::UnknownSection { .. }));

        let mut store = source_store();
        let err = import_from_file(&mut store, &dir.path().join("absent.config"), "x", REMOTE)
            .expect_err("missing file");
        assert!(matches!(err, TransferError::Read { .. }));

        let bad = dir.path().join("bad.config");
        fs::write(&bad, "user = orphan\n").expect("write");
        let err = import_from_file(&mut store, &bad, "x", REMOTE).expect_err("bad file");
        assert!(matches!(err, TransferError::Parse { .. }));
        assert!(!store.contains_named("x", REMOTE));
    }

    #[test]
    fn default_path_uses_remote_name() {
        assert_eq!(default_export_path("acme"), PathBuf::from("acme.config"));
    }
}
