use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use grm_core::{ConfigBackend, RawSections, StoreError};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use crate::format;

/// Directory created under the user's home.
pub const APP_DIR: &str = "github-release-monitor";
pub const CONFIG_FILE: &str = "config";

/// Config file on disk in the flat section format.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<home>/github-release-monitor/config`
    pub fn in_home(home: impl AsRef<Path>) -> Self {
        Self::new(home.as_ref().join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }
}

impl ConfigBackend for FileBackend {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn load(&self) -> Result<Option<RawSections>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("config file does not exist yet");
                return Ok(None);
            }
            Err(err) => {
                return Err(StoreError::Read {
                    path: self.display(),
                    reason: err.to_string(),
                })
            }
        };

        let sections = format::parse(&text).map_err(|err| StoreError::Parse {
            path: self.display(),
            line: err.line,
            reason: err.reason,
        })?;
        debug!(sections = sections.len(), "config file loaded");
        Ok(Some(sections))
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn save(&self, sections: &RawSections) -> Result<(), StoreError> {
        write_atomic(&self.path, format::render(sections).as_bytes()).map_err(|err| {
            StoreError::Write {
                path: self.display(),
                reason: err.to_string(),
            }
        })
    }
}

/// Write through a temporary file in the target directory, creating the
/// directory first.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
