//! Default on-disk locations for modsync state.
//!
//! ```text
//! <data>/modsync/
//! ├── profiles/       # One JSON file per profile
//! ├── registry.json   # Local mod registry index
//! └── settings.json   # Host-layer settings (installations, selection)
//! ```

use std::path::PathBuf;

/// Root data directory, `~/.local/share/modsync` or platform equivalent.
pub fn data_dir() -> PathBuf {
    dirs::data_dir().map_or_else(|| PathBuf::from(".modsync"), |d| d.join("modsync"))
}

/// Directory holding profile files.
pub fn profiles_dir() -> PathBuf {
    data_dir().join("profiles")
}

/// Local registry index location.
pub fn registry_path() -> PathBuf {
    data_dir().join("registry.json")
}

/// Host-layer settings location.
pub fn settings_path() -> PathBuf {
    data_dir().join("settings.json")
}
