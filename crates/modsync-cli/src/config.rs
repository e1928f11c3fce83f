//! Host-layer settings: known installations and the current selection.

use std::path::PathBuf;

use anyhow::{Context, Result};
use modsync_core::{Installation, paths};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub installations: Vec<Installation>,
    /// Path of the selected installation.
    #[serde(default)]
    pub selected: Option<PathBuf>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::settings_path())
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&paths::settings_path())
    }

    fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings
            .installations
            .push(Installation::new("/games/satisfactory", 365306, "default"));
        settings.selected = Some(PathBuf::from("/games/satisfactory"));
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.installations.len(), 1);
        assert_eq!(loaded.selected, settings.selected);
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::load_from(&dir.path().join("settings.json")).unwrap();
        assert!(loaded.installations.is_empty());
        assert!(loaded.selected.is_none());
    }
}
