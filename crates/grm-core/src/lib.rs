//! Core configuration model for grm: the fixed section/key schema, the
//! persistence contract and the override-aware configuration store.
//! No file or crypto dependencies live here.

pub mod backend;
pub mod schema;
pub mod store;

pub use backend::{ConfigBackend, InMemoryBackend, RawSections, StoreError};
pub use schema::{
    Key, NamedSection, Section, SectionId, UnknownKey, UnnamedSection, DEFAULTS, REMOTE,
};
pub use store::{ConfigStore, Entries, Mutator};
