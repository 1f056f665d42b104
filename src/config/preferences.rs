//! Editor preferences persisted between runs
//!
//! A small TOML file under the platform config directory. The store is
//! created once at startup and handed to whoever needs it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{error, info, warn};

use crate::constants::config::{APP_DIR, FILENAME, THEME_ENV};

/// Colour scheme of the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    /// Follow the operating system
    #[default]
    System,
}

impl Theme {
    /// Concrete theme to render; `System` follows `prefers_dark`
    pub fn effective(self, prefers_dark: bool) -> Theme {
        match self {
            Theme::System if prefers_dark => Theme::Dark,
            Theme::System => Theme::Light,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            other => anyhow::bail!("unknown theme '{other}' (expected light, dark or system)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
}

/// Preference repository with explicit get/set
pub struct PreferenceStore {
    /// `None` keeps everything in memory
    path: Option<PathBuf>,
    prefs: Preferences,
    /// Set when the file on disk could not be parsed; it is never overwritten
    preserve_file: bool,
}

impl PreferenceStore {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push(FILENAME);
        path
    }

    /// Load from the default location, applying the environment override
    pub fn load() -> Self {
        let mut store = Self::load_from(Self::default_path());
        store.apply_override(std::env::var(THEME_ENV).ok().as_deref());
        store
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load_from(path: PathBuf) -> Self {
        let mut store = Self {
            path: None,
            prefs: Preferences::default(),
            preserve_file: false,
        };

        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Preferences>(&contents) {
                Ok(prefs) => {
                    info!(path = %path.display(), theme = %prefs.theme, "loaded preferences");
                    store.prefs = prefs;
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to parse preferences file");
                    error!(path = %path.display(), "The file has been preserved; using defaults for this session.");
                    store.preserve_file = true;
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no preferences file found, using defaults");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read preferences file");
            }
        }

        store.path = Some(path);
        store
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            prefs: Preferences::default(),
            preserve_file: false,
        }
    }

    /// Apply a theme name from the environment; invalid names are ignored
    pub fn apply_override(&mut self, value: Option<&str>) {
        let Some(value) = value else {
            return;
        };
        match value.parse::<Theme>() {
            Ok(theme) => {
                info!(theme = %theme, "theme overridden from environment");
                self.prefs.theme = theme;
            }
            Err(e) => warn!(value = %value, error = %e, "ignoring invalid theme override"),
        }
    }

    pub fn theme(&self) -> Theme {
        self.prefs.theme
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.prefs.theme = theme;
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if self.preserve_file {
            warn!(path = %path.display(), "not overwriting unparsable preferences file");
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(&self.prefs)
            .context("Failed to serialize preferences to TOML")?;
        fs::write(path, contents)
            .context(format!("Failed to write preferences file to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_system_theme() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::load_from(dir.path().join("preferences.toml"));
        assert_eq!(store.theme(), Theme::System);
    }

    #[test]
    fn test_set_theme_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.toml");

        let mut store = PreferenceStore::load_from(path.clone());
        store.set_theme(Theme::Dark).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("theme = \"dark\""));
        assert_eq!(PreferenceStore::load_from(path).theme(), Theme::Dark);
    }

    #[test]
    fn test_unparsable_file_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        fs::write(&path, "theme = [broken").unwrap();

        let mut store = PreferenceStore::load_from(path.clone());
        assert_eq!(store.theme(), Theme::System);
        store.set_theme(Theme::Light).unwrap();
        assert_eq!(store.theme(), Theme::Light);
        assert_eq!(fs::read_to_string(&path).unwrap(), "theme = [broken");
    }

    #[test]
    fn test_override_applies_valid_values_only() {
        let mut store = PreferenceStore::in_memory();
        store.apply_override(Some("DARK"));
        assert_eq!(store.theme(), Theme::Dark);
        store.apply_override(Some("purple"));
        assert_eq!(store.theme(), Theme::Dark);
        store.apply_override(None);
        assert_eq!(store.theme(), Theme::Dark);
    }

    #[test]
    fn test_effective_theme() {
        assert_eq!(Theme::System.effective(true), Theme::Dark);
        assert_eq!(Theme::System.effective(false), Theme::Light);
        assert_eq!(Theme::Light.effective(true), Theme::Light);
    }
}
