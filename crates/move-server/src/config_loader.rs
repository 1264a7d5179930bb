use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;

/// Locates and parses TOML config files.
///
/// Search order:
/// 1) `TICTACTOE_CONFIG_DIR/<relative_path>`
/// 2) `./<relative_path>`
/// 3) `<crate_root>/../../config/<relative_path>` (repo-local convenience)
pub struct ConfigLoader;

impl ConfigLoader {
    /// Parses the first file found for `relative_path`. No file is `Ok(None)`.
    pub fn parse_optional_file<T: DeserializeOwned>(
        relative_path: &str,
    ) -> anyhow::Result<Option<T>> {
        let Some(path) = Self::resolve_path(relative_path) else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        Self::parse_from_str(&text)
            .with_context(|| format!("Invalid config at {}", path.display()))
            .map(Some)
    }

    pub fn parse_from_str<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
        toml::from_str(text).with_context(|| "Failed to parse TOML")
    }

    fn resolve_path(relative_path: &str) -> Option<PathBuf> {
        let rel = Path::new(relative_path);

        if let Some(root) = env::var_os("TICTACTOE_CONFIG_DIR") {
            let candidate = PathBuf::from(root).join(rel);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        if let Ok(cwd) = env::current_dir() {
            let candidate = cwd.join(rel);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        // This crate lives at <repo_root>/crates/move-server.
        let candidate = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .ancestors()
            .nth(2)?
            .join("config")
            .join(rel);
        candidate.is_file().then_some(candidate)
    }
}
