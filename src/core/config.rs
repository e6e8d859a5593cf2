//! Project configuration loaded from `janitor.json`.
//!
//! Every field is optional in the file; missing fields take the defaults
//! below. A missing file is the all-defaults configuration. Secrets are
//! never read from this file, only the name of the environment variable
//! that holds them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::utils::io;

pub const CONFIG_FILE: &str = "janitor.json";

fn default_roots() -> Vec<String> {
    vec!["src".to_string(), "supabase/functions".to_string()]
}

fn default_key_env() -> String {
    "SUPABASE_SERVICE_ROLE_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JanitorConfig {
    #[serde(default = "default_roots")]
    pub roots: Vec<String>,
    #[serde(default)]
    pub migration: MigrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_key_env")]
    pub key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            roots: default_roots(),
            migration: MigrationConfig::default(),
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            url: None,
            key_env: default_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl JanitorConfig {
    /// Loads `janitor.json` from `dir`. A missing file yields defaults;
    /// an unparsable file is an error.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = io::read_file(&path, "load config")?;
        serde_json::from_str(&content)
            .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = setup_dir("janitor_config_test_missing");

        let config = JanitorConfig::load(&dir).unwrap();
        assert_eq!(config.roots, vec!["src", "supabase/functions"]);
        assert_eq!(config.migration.key_env, "SUPABASE_SERVICE_ROLE_KEY");
        assert_eq!(config.migration.timeout_secs, 60);
        assert!(config.migration.url.is_none());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults_for_absent_fields() {
        let dir = setup_dir("janitor_config_test_partial");
        fs::write(
            dir.join(CONFIG_FILE),
            r#"{ "migration": { "url": "https://db.example.com" } }"#,
        )
        .unwrap();

        let config = JanitorConfig::load(&dir).unwrap();
        assert_eq!(config.roots, vec!["src", "supabase/functions"]);
        assert_eq!(
            config.migration.url.as_deref(),
            Some("https://db.example.com")
        );
        assert_eq!(config.migration.timeout_secs, 60);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn full_file_overrides_defaults() {
        let dir = setup_dir("janitor_config_test_full");
        fs::write(
            dir.join(CONFIG_FILE),
            r#"{
                "roots": ["app"],
                "migration": {
                    "url": "https://db.example.com",
                    "keyEnv": "MY_KEY",
                    "timeoutSecs": 30
                }
            }"#,
        )
        .unwrap();

        let config = JanitorConfig::load(&dir).unwrap();
        assert_eq!(config.roots, vec!["app"]);
        assert_eq!(config.migration.key_env, "MY_KEY");
        assert_eq!(config.migration.timeout_secs, 30);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let dir = setup_dir("janitor_config_test_invalid");
        fs::write(dir.join(CONFIG_FILE), "{ not json").unwrap();

        let err = JanitorConfig::load(&dir).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_json");

        fs::remove_dir_all(&dir).unwrap();
    }
}
