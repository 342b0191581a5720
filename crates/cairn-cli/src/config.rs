//! Optional workspace configuration from `cairn.toml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use cairn_core::errors::{CairnError, CairnResult};

/// Workspace configuration, all fields optional. CLI flags take
/// precedence over everything declared here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CairnConfig {
    /// Recipe directory; defaults to `recipes` in the current directory.
    #[serde(default)]
    pub recipes: Option<PathBuf>,

    /// Default compiler as `name@version`.
    #[serde(default)]
    pub compiler: Option<String>,
}

impl CairnConfig {
    /// Load `cairn.toml` from the current directory, if present.
    pub fn load() -> CairnResult<Self> {
        Self::from_path(Path::new("cairn.toml"))
    }

    pub fn from_path(path: &Path) -> CairnResult<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CairnError::Config {
            message: format!("failed to parse {}: {e}", path.display()),
        })
    }
}
