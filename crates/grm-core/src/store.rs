use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, instrument, warn};

use crate::{
    backend::{ConfigBackend, RawSections, StoreError},
    schema::{Key, NamedSection, SectionId, UnnamedSection, DEFAULTS, REMOTE},
};

/// Raw `entry -> value` pairs of one section, where an entry is `key` or `key:specifier`.
pub type Entries = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct State {
    sections: BTreeMap<SectionId, Entries>,
    /// Sections the schema does not know; written back untouched.
    foreign: BTreeMap<String, Entries>,
}

impl State {
    fn from_raw(raw: RawSections) -> Self {
        let mut state = State::default();
        for (header, entries) in raw {
            match SectionId::parse(&header) {
                Some(id) => state.sections.entry(id).or_default().extend(entries),
                None => {
                    warn!(%header, "keeping unrecognized config section as-is");
                    state.foreign.insert(header, entries);
                }
            }
        }
        state
    }

    fn to_raw(&self) -> RawSections {
        let mut raw = self.foreign.clone();
        for (id, entries) in &self.sections {
            raw.insert(id.to_string(), entries.clone());
        }
        raw
    }
}

/// In-memory view of the configuration file.
///
/// Loaded once through a [`ConfigBackend`]; every change goes through
/// [`ConfigStore::apply_changes`], which persists the whole store once per call.
pub struct ConfigStore<B: ConfigBackend> {
    backend: B,
    state: State,
}

impl<B: ConfigBackend> ConfigStore<B> {
    /// Load the persisted configuration, or start empty when none exists.
    #[instrument(skip_all)]
    pub fn open(backend: B) -> Result<Self, StoreError> {
        let state = match backend.load()? {
            Some(raw) => State::from_raw(raw),
            None => {
                debug!("no persisted configuration, starting empty");
                State::default()
            }
        };
        Ok(Self { backend, state })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// All raw entries of an unnamed section (empty when absent).
    pub fn section(&self, section: UnnamedSection) -> Entries {
        self.raw(&SectionId::Unnamed(section))
    }

    /// All raw entries of one instance of a named section (empty when absent).
    pub fn named_section(&self, name: &str, section: NamedSection) -> Entries {
        self.raw(&section.instance(name))
    }

    /// Resolve `key` in an unnamed section: `key:specifier` first for
    /// overloadable keys, then `key`.
    pub fn get(&self, section: UnnamedSection, key: Key, specifier: &str) -> Option<String> {
        resolve(self.state.sections.get(&SectionId::Unnamed(section)), key, specifier)
    }

    pub fn named_get(
        &self,
        name: &str,
        section: NamedSection,
        key: Key,
        specifier: &str,
    ) -> Option<String> {
        resolve(
            self.state.sections.get(&section.instance(name)),
            key,
            specifier,
        )
    }

    /// Every `key:specifier` value of an unnamed section, keyed by specifier.
    pub fn overrides(&self, section: UnnamedSection, key: Key) -> BTreeMap<String, String> {
        overrides_of(self.state.sections.get(&SectionId::Unnamed(section)), key)
    }

    pub fn named_overrides(
        &self,
        name: &str,
        section: NamedSection,
        key: Key,
    ) -> BTreeMap<String, String> {
        overrides_of(self.state.sections.get(&section.instance(name)), key)
    }

    /// Distinct instance names present for a named section template.
    pub fn named_sections(&self, section: NamedSection) -> BTreeSet<String> {
        self.state
            .sections
            .keys()
            .filter_map(|id| match id {
                SectionId::Named(s, name) if *s == section => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn contains_named(&self, name: &str, section: NamedSection) -> bool {
        self.state.sections.contains_key(&section.instance(name))
    }

    /// Value a remote effectively uses: the remote's own value first, then the
    /// `Defaults` section. The override rule applies at each level.
    pub fn effective(&self, name: &str, key: Key, specifier: &str) -> Option<String> {
        self.named_get(name, REMOTE, key, specifier)
            .or_else(|| self.get(DEFAULTS, key, specifier))
    }

    /// Exportable entries (base values and overrides) of one named instance.
    /// Credentials never appear in the result.
    pub fn export_named(&self, name: &str, section: NamedSection) -> Entries {
        self.named_section(name, section)
            .into_iter()
            .filter(|(entry, _)| match Key::parse_entry(entry) {
                Some((key, specifier)) if empty_specifier(entry, key, specifier) => {
                    warn!(%entry, "skipping entry with an empty specifier during export");
                    false
                }
                Some((key, _)) => key.exportable(),
                None => false,
            })
            .collect()
    }

    /// Run a batch of edits and persist the result exactly once.
    ///
    /// Edits apply to a working copy. If `edit` or the write fails, the store
    /// keeps its previous content and the error is returned.
    #[instrument(skip_all)]
    pub fn apply_changes<T, F>(&mut self, edit: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Mutator<'_>) -> Result<T, StoreError>,
    {
        let mut working = self.state.clone();
        let output = edit(&mut Mutator {
            state: &mut working,
        })?;
        self.backend.save(&working.to_raw())?;
        self.state = working;
        info!("configuration written");
        Ok(output)
    }

    fn raw(&self, id: &SectionId) -> Entries {
        self.state.sections.get(id).cloned().unwrap_or_default()
    }
}

/// Override rule: an overloadable key with a non-empty specifier tries
/// `key:specifier` first; everything falls back to the bare key.
fn resolve(entries: Option<&Entries>, key: Key, specifier: &str) -> Option<String> {
    let entries = entries?;
    if key.overloadable() && !specifier.is_empty() {
        if let Some(value) = entries.get(&key.entry(specifier)) {
            return Some(value.clone());
        }
    }
    entries.get(key.name()).cloned()
}

/// `key:` with nothing after the colon: neither the base value nor an override.
fn empty_specifier(entry: &str, key: Key, specifier: Option<&str>) -> bool {
    specifier.is_none() && entry != key.name()
}

fn overrides_of(entries: Option<&Entries>, key: Key) -> BTreeMap<String, String> {
    let prefix = format!("{}:", key.name());
    entries
        .into_iter()
        .flatten()
        .filter_map(|(entry, value)| {
            entry
                .strip_prefix(&prefix)
                .filter(|specifier| !specifier.is_empty())
                .map(|specifier| (specifier.to_string(), value.clone()))
        })
        .collect()
}

/// Edit handle passed to [`ConfigStore::apply_changes`].
pub struct Mutator<'a> {
    state: &'a mut State,
}

impl Mutator<'_> {
    /// Set `key` (or `key:specifier` when `specifier` is non-empty) in an unnamed section.
    pub fn set(
        &mut self,
        section: UnnamedSection,
        key: Key,
        specifier: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        self.put(SectionId::Unnamed(section), key, specifier, value)
    }

    /// Remove an entry; returns whether it existed.
    pub fn unset(&mut self, section: UnnamedSection, key: Key, specifier: &str) -> bool {
        self.remove(&SectionId::Unnamed(section), key, specifier)
    }

    /// Drop an unnamed section with all its entries.
    pub fn delete_section(&mut self, section: UnnamedSection) -> bool {
        self.state
            .sections
            .remove(&SectionId::Unnamed(section))
            .is_some()
    }

    pub fn named_set(
        &mut self,
        name: &str,
        section: NamedSection,
        key: Key,
        specifier: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        check_instance(name)?;
        self.put(section.instance(name), key, specifier, value)
    }

    pub fn named_unset(
        &mut self,
        name: &str,
        section: NamedSection,
        key: Key,
        specifier: &str,
    ) -> bool {
        self.remove(&section.instance(name), key, specifier)
    }

    /// Drop one instance of a named section with all its entries.
    pub fn delete_named(&mut self, name: &str, section: NamedSection) -> bool {
        self.state
            .sections
            .remove(&section.instance(name))
            .is_some()
    }

    /// Create an empty instance if it does not exist yet.
    pub fn ensure_named(&mut self, name: &str, section: NamedSection) -> Result<(), StoreError> {
        check_instance(name)?;
        self.state
            .sections
            .entry(section.instance(name))
            .or_default();
        Ok(())
    }

    /// Write exportable entries into the `target` instance, overwriting keys that
    /// are present and leaving all others untouched. Entries that are unknown,
    /// credentials or not representable are skipped. Returns how many were written.
    pub fn import_named(
        &mut self,
        target: &str,
        section: NamedSection,
        entries: &Entries,
    ) -> Result<usize, StoreError> {
        check_instance(target)?;
        let mut imported = 0;
        for (entry, value) in entries {
            let Some((key, specifier)) = Key::parse_entry(entry) else {
                warn!(%entry, "skipping unknown key during import");
                continue;
            };
            if empty_specifier(entry, key, specifier) {
                warn!(%entry, "skipping entry with an empty specifier during import");
                continue;
            }
            if !key.exportable() {
                warn!(key = key.name(), "skipping credential entry during import");
                continue;
            }
            match self.put(section.instance(target), key, specifier.unwrap_or(""), value) {
                Ok(()) => imported += 1,
                Err(err) => warn!(%entry, %err, "skipping invalid entry during import"),
            }
        }
        debug!(instance = target, imported, "imported entries");
        Ok(imported)
    }

    fn put(
        &mut self,
        id: SectionId,
        key: Key,
        specifier: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        if !specifier.is_empty() {
            if !key.overloadable() {
                return Err(StoreError::NotOverloadable { key: key.name() });
            }
            check_specifier(specifier)?;
        }
        check_value(value)?;
        self.state
            .sections
            .entry(id)
            .or_default()
            .insert(key.entry(specifier), value.to_string());
        Ok(())
    }

    fn remove(&mut self, id: &SectionId, key: Key, specifier: &str) -> bool {
        self.state
            .sections
            .get_mut(id)
            .and_then(|entries| entries.remove(&key.entry(specifier)))
            .is_some()
    }
}

fn invalid(what: &'static str, value: &str, reason: &'static str) -> StoreError {
    StoreError::InvalidInput {
        what,
        value: value.to_string(),
        reason,
    }
}

fn has_line_break(s: &str) -> bool {
    s.contains(['\n', '\r'])
}

fn check_instance(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(invalid("section name", name, "must not be empty"));
    }
    if name.trim() != name {
        return Err(invalid(
            "section name",
            name,
            "must not start or end with whitespace",
        ));
    }
    if has_line_break(name) || name.contains(['"', '[', ']']) {
        return Err(invalid(
            "section name",
            name,
            "must not contain quotes, brackets or line breaks",
        ));
    }
    Ok(())
}

fn check_specifier(specifier: &str) -> Result<(), StoreError> {
    if specifier.trim() != specifier {
        return Err(invalid(
            "specifier",
            specifier,
            "must not start or end with whitespace",
        ));
    }
    if has_line_break(specifier) || specifier.contains('=') {
        return Err(invalid(
            "specifier",
            specifier,
            "must not contain '=' or line breaks",
        ));
    }
    Ok(())
}

fn check_value(value: &str) -> Result<(), StoreError> {
    if has_line_break(value) {
        return Err(invalid("value", value, "must not contain line breaks"));
    }
    if value.trim() != value {
        return Err(invalid(
            "value",
            value,
            "must not start or end with whitespace",
        ));
    }
    Ok(())
}
