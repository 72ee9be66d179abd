use std::{fmt, str::FromStr};

use thiserror::Error;

/// A section that exists exactly once in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnnamedSection {
    name: &'static str,
}

/// A section template instantiated once per instance name (e.g. one per remote account).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamedSection {
    name: &'static str,
}

impl UnnamedSection {
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl NamedSection {
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Concrete identifier for one instance of this template.
    pub fn instance(self, name: impl Into<String>) -> SectionId {
        SectionId::Named(self, name.into())
    }
}

/// One GitHub account being monitored.
pub const REMOTE: NamedSection = NamedSection { name: "Remote" };

/// Fallback values shared by every remote.
pub const DEFAULTS: UnnamedSection = UnnamedSection { name: "Defaults" };

/// Either kind of section; only produced by reverse lookups over persisted headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Unnamed(UnnamedSection),
    Named(NamedSection),
}

const SECTIONS: [Section; 2] = [Section::Named(REMOTE), Section::Unnamed(DEFAULTS)];

impl Section {
    pub const fn name(&self) -> &'static str {
        match self {
            Section::Unnamed(section) => section.name,
            Section::Named(section) => section.name,
        }
    }

    pub const fn is_named(&self) -> bool {
        matches!(self, Section::Named(_))
    }

    /// Resolve a raw header (`Defaults` or `Remote "acme"`) to its template.
    pub fn lookup(header: &str) -> Option<Section> {
        SectionId::parse(header).map(|id| id.section())
    }

    fn by_name(name: &str) -> Option<Section> {
        SECTIONS.iter().copied().find(|s| s.name() == name)
    }
}

/// Structured identifier of a concrete section. Rendered to header text only
/// when the store is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionId {
    Unnamed(UnnamedSection),
    Named(NamedSection, String),
}

impl SectionId {
    /// Parse a header as written between `[` and `]`.
    ///
    /// Returns `None` for unknown templates and for headers whose shape does not
    /// match the template kind (`Remote` without an instance, `Defaults "x"`).
    pub fn parse(header: &str) -> Option<SectionId> {
        let header = header.trim();
        match header.split_once(' ') {
            None => match Section::by_name(header)? {
                Section::Unnamed(section) => Some(SectionId::Unnamed(section)),
                Section::Named(_) => None,
            },
            Some((name, rest)) => {
                let Section::Named(section) = Section::by_name(name)? else {
                    return None;
                };
                let instance = rest
                    .trim()
                    .strip_prefix('"')
                    .and_then(|r| r.strip_suffix('"'))?;
                if instance.is_empty() || instance.contains('"') {
                    return None;
                }
                Some(SectionId::Named(section, instance.to_string()))
            }
        }
    }

    pub fn section(&self) -> Section {
        match self {
            SectionId::Unnamed(section) => Section::Unnamed(*section),
            SectionId::Named(section, _) => Section::Named(*section),
        }
    }

    pub fn instance(&self) -> Option<&str> {
        match self {
            SectionId::Unnamed(_) => None,
            SectionId::Named(_, name) => Some(name),
        }
    }
}

impl From<UnnamedSection> for SectionId {
    fn from(section: UnnamedSection) -> Self {
        SectionId::Unnamed(section)
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionId::Unnamed(section) => f.write_str(section.name),
            SectionId::Named(section, name) => write!(f, "{} \"{}\"", section.name, name),
        }
    }
}

/// A configuration key and its behavior flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    name: &'static str,
    overloadable: bool,
    exportable: bool,
}

impl Key {
    pub const USERNAME: Key = Key::new("username", false, false);
    pub const PASSWORD: Key = Key::new("password", false, false);
    /// Nonce belonging to the encrypted password.
    pub const SALT: Key = Key::new("salt", false, false);
    /// GitHub user or organisation whose repositories are monitored.
    pub const REMOTE_USER: Key = Key::new("user", false, true);
    pub const SHOW_PRIVATE: Key = Key::new("show-private", false, true);
    pub const REPOSITORY_PATTERN: Key = Key::new("repository-pattern", false, true);
    pub const RELEASE_PATTERN: Key = Key::new("release-pattern", true, true);
    pub const MILESTONE_PATTERN: Key = Key::new("milestone-pattern", true, true);
    pub const REPOSITORY_BLACKLISTED: Key = Key::new("repository-blacklisted", true, true);
    pub const DOWNLOAD_URL: Key = Key::new("download-url", true, true);

    /// Every key the store understands.
    pub const ALL: [Key; 10] = [
        Key::USERNAME,
        Key::PASSWORD,
        Key::SALT,
        Key::REMOTE_USER,
        Key::SHOW_PRIVATE,
        Key::REPOSITORY_PATTERN,
        Key::RELEASE_PATTERN,
        Key::MILESTONE_PATTERN,
        Key::REPOSITORY_BLACKLISTED,
        Key::DOWNLOAD_URL,
    ];

    const fn new(name: &'static str, overloadable: bool, exportable: bool) -> Self {
        Self {
            name,
            overloadable,
            exportable,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the key accepts `key:specifier` overrides.
    pub const fn overloadable(&self) -> bool {
        self.overloadable
    }

    /// Whether the key may leave the machine through export.
    pub const fn exportable(&self) -> bool {
        self.exportable
    }

    pub fn lookup(name: &str) -> Option<Key> {
        Key::ALL.iter().copied().find(|k| k.name == name)
    }

    /// Split a raw entry name into its key and optional specifier.
    ///
    /// `release-pattern:api` yields `(RELEASE_PATTERN, Some("api"))`; an empty
    /// specifier is treated as absent.
    pub fn parse_entry(raw: &str) -> Option<(Key, Option<&str>)> {
        match raw.split_once(':') {
            Some((name, specifier)) => {
                let key = Key::lookup(name)?;
                Some((key, Some(specifier).filter(|s| !s.is_empty())))
            }
            None => Key::lookup(raw).map(|key| (key, None)),
        }
    }

    /// Entry name under which a value is stored: bare name or `name:specifier`.
    pub fn entry(&self, specifier: &str) -> String {
        if specifier.is_empty() {
            self.name.to_string()
        } else {
            format!("{}:{}", self.name, specifier)
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown configuration key: {0}")]
pub struct UnknownKey(pub String);

impl FromStr for Key {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::lookup(s).ok_or_else(|| UnknownKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_header() {
        let id = SectionId::parse(r#"Remote "acme""#).expect("named header");
        assert_eq!(id, REMOTE.instance("acme"));
        assert_eq!(id.to_string(), r#"Remote "acme""#);
        assert_eq!(Section::lookup(r#"Remote "acme""#), Some(Section::Named(REMOTE)));
    }

    #[test]
    fn parses_unnamed_header() {
        assert_eq!(SectionId::parse("Defaults"), Some(SectionId::Unnamed(DEFAULTS)));
        assert_eq!(SectionId::Unnamed(DEFAULTS).to_string(), "Defaults");
    }

    #[test]
    fn rejects_kind_mismatch_and_unknown_headers() {
        assert_eq!(SectionId::parse("Remote"), None);
        assert_eq!(SectionId::parse(r#"Defaults "x""#), None);
        assert_eq!(SectionId::parse(r#"Remote """#), None);
        assert_eq!(SectionId::parse(r#"Remote acme"#), None);
        assert_eq!(Section::lookup("core"), None);
    }

    #[test]
    fn splits_entry_and_specifier() {
        assert_eq!(
            Key::parse_entry("release-pattern:api"),
            Some((Key::RELEASE_PATTERN, Some("api")))
        );
        assert_eq!(Key::parse_entry("username"), Some((Key::USERNAME, None)));
        assert_eq!(
            Key::parse_entry("download-url:"),
            Some((Key::DOWNLOAD_URL, None))
        );
        assert_eq!(Key::parse_entry("nope:api"), None);
    }

    #[test]
    fn specifier_keeps_everything_after_first_colon() {
        assert_eq!(
            Key::parse_entry("download-url:org:repo"),
            Some((Key::DOWNLOAD_URL, Some("org:repo")))
        );
    }

    #[test]
    fn credentials_are_not_exportable() {
        for key in [Key::USERNAME, Key::PASSWORD, Key::SALT] {
            assert!(!key.exportable(), "{key} must stay local");
        }
        assert!(Key::ALL
            .iter()
            .filter(|k| k.overloadable())
            .all(|k| k.exportable()));
    }

    #[test]
    fn key_from_str() {
        assert_eq!("show-private".parse::<Key>(), Ok(Key::SHOW_PRIVATE));
        assert_eq!(
            "bogus".parse::<Key>(),
            Err(UnknownKey("bogus".to_string()))
        );
    }
}
