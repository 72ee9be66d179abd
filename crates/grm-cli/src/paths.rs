use std::path::{Path, PathBuf};

use color_eyre::Result;
use dirs::home_dir;

/// Base directory holding `github-release-monitor/`: the `--home` flag, else the user's home.
pub fn resolve_home(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(home) = flag {
        return Ok(home.to_path_buf());
    }
    home_dir().ok_or_else(|| color_eyre::eyre::eyre!("no home directory available; pass --home"))
}
