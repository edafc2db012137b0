//! Settings and configuration utilities.
//!
//! This module reads settings from $HOME/.omni-gen/settings.json and uses
//! them as a fallback for environment variables.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Settings loaded from $HOME/.omni-gen/settings.json.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Environment variable overrides.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Settings {
    /// Loads settings from the default location.
    pub fn load() -> Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Self::load_from_path(&settings_path)
    }

    /// Loads settings from a specific path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        serde_json::from_str::<Self>(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Returns the default settings path.
    pub fn get_settings_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

        Ok(home_dir.join(".omni-gen").join("settings.json"))
    }

    /// Returns an environment variable with fallback to settings.
    pub fn get_env_var(&self, key: &str) -> Option<String> {
        env::var(key).ok().or_else(|| self.env.get(key).cloned())
    }
}

/// Returns an environment variable with fallback to settings.
pub fn get_env_var(key: &str) -> Result<String> {
    if let Ok(value) = env::var(key) {
        return Ok(value);
    }

    match Settings::load() {
        Ok(settings) => settings
            .env
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Environment variable not found: {key}")),
        // If settings are unreadable, still report the missing variable
        Err(err) => Err(anyhow::anyhow!("Environment variable not found: {key}").context(err)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn settings_load_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("settings.json");

        let settings_json = r#"{
            "env": {
                "OMNI_GEN_API_KEY": "test_api_key",
                "OMNI_GEN_BASE_URL": "https://gen.test/api"
            }
        }"#;
        fs::write(&settings_path, settings_json).unwrap();

        let settings = Settings::load_from_path(&settings_path).unwrap();

        assert_eq!(settings.env.get("OMNI_GEN_API_KEY").unwrap(), "test_api_key");
        assert_eq!(
            settings.env.get("OMNI_GEN_BASE_URL").unwrap(),
            "https://gen.test/api"
        );
    }

    #[test]
    fn missing_settings_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from_path(temp_dir.path().join("absent.json")).unwrap();
        assert!(settings.env.is_empty());
    }

    #[test]
    fn malformed_settings_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("settings.json");
        fs::write(&settings_path, "{ env: ").unwrap();

        let err = Settings::load_from_path(&settings_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings file"));
    }

    #[test]
    fn environment_takes_precedence_over_settings() {
        let temp_dir = TempDir::new().unwrap();
        let settings_path = temp_dir.path().join("settings.json");
        fs::write(
            &settings_path,
            r#"{"env": {"OMNI_GEN_SETTINGS_TEST_VAR": "from_settings"}}"#,
        )
        .unwrap();
        let settings = Settings::load_from_path(&settings_path).unwrap();

        env::set_var("OMNI_GEN_SETTINGS_TEST_VAR", "from_env");
        assert_eq!(
            settings.get_env_var("OMNI_GEN_SETTINGS_TEST_VAR").unwrap(),
            "from_env"
        );

        env::remove_var("OMNI_GEN_SETTINGS_TEST_VAR");
        assert_eq!(
            settings.get_env_var("OMNI_GEN_SETTINGS_TEST_VAR").unwrap(),
            "from_settings"
        );
    }
}
