//! Configuration management for the schema compiler
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (typed-schemas.toml)
//! - Environment variables (TYPED_SCHEMAS__*)
//!
//! ## Example config file (typed-schemas.toml):
//! ```toml
//! [compiler]
//! strict = false
//! max_definitions = 512
//! default_root = "Root"
//!
//! [store]
//! path = "./schemas"
//! global_namespace = ["schemas"]
//! user_suffix = "schemas"
//!
//! [output]
//! format = "pretty"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::store::Namespace;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub compiler: CompilerSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub output: OutputSettings,
}

/// Compiler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerSettings {
    /// Treat any warning as a compile error
    #[serde(default)]
    pub strict: bool,

    /// Upper bound on definitions per document
    #[serde(default = "default_max_definitions")]
    pub max_definitions: Option<usize>,

    /// Root type name when the caller gives none
    #[serde(default = "default_root")]
    pub default_root: String,
}

/// Schema store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Root directory of the directory-backed store
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Namespace searched when the user namespace has no match
    #[serde(default = "default_global_namespace")]
    pub global_namespace: Vec<String>,

    /// Segment appended to a user id to form the user namespace
    #[serde(default = "default_user_suffix")]
    pub user_suffix: String,
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

impl OutputFormat {
    /// Render a JSON value in this format
    pub fn render(&self, value: &serde_json::Value) -> serde_json::Result<String> {
        match self {
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
            OutputFormat::Compact => serde_json::to_string(value),
        }
    }
}

// Default value functions
fn default_max_definitions() -> Option<usize> {
    Some(512)
}

fn default_root() -> String {
    "Root".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./schemas")
}

fn default_global_namespace() -> Vec<String> {
    vec!["schemas".to_string()]
}

fn default_user_suffix() -> String {
    "schemas".to_string()
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            strict: false,
            max_definitions: default_max_definitions(),
            default_root: default_root(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            global_namespace: default_global_namespace(),
            user_suffix: default_user_suffix(),
        }
    }
}

impl StoreSettings {
    /// Namespaces to search for `user_id`, most specific first
    pub fn search_path(&self, user_id: Option<&str>) -> Vec<Namespace> {
        let mut namespaces = Vec::with_capacity(2);
        if let Some(user) = user_id {
            namespaces.push(Namespace::new([user, self.user_suffix.as_str()]));
        }
        namespaces.push(Namespace::new(self.global_namespace.iter().map(String::as_str)));
        namespaces
    }
}

impl Settings {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "typed-schemas.toml",
            ".typed-schemas.toml",
            "config/typed-schemas.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "typed-schemas", "typed-schemas") {
            let xdg_config = config_dir.config_dir().join("typed-schemas.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // TYPED_SCHEMAS__COMPILER__STRICT=true
        builder = builder.add_source(
            Environment::with_prefix("TYPED_SCHEMAS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Store root, with relative paths resolved against the working directory
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            std::env::current_dir().unwrap_or_default().join(&self.store.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Settings::default();
        assert!(!config.compiler.strict);
        assert_eq!(config.compiler.max_definitions, Some(512));
        assert_eq!(config.compiler.default_root, "Root");
        assert_eq!(config.store.global_namespace, vec!["schemas"]);
        assert_eq!(config.output.format, OutputFormat::Pretty);
    }

    #[test]
    fn test_serialize_config() {
        let config = Settings::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[compiler]"));
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("[output]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[compiler]\nstrict = true\n\n[store]\nuser_suffix = \"models\"\n\n[output]\nformat = \"compact\"\n",
        )
        .unwrap();

        let config = Settings::load_from(path.to_str()).unwrap();
        assert!(config.compiler.strict);
        assert_eq!(config.compiler.max_definitions, Some(512));
        assert_eq!(config.store.user_suffix, "models");
        assert_eq!(config.output.format, OutputFormat::Compact);
    }

    #[test]
    fn test_search_path_order() {
        let store = StoreSettings::default();
        let namespaces = store.search_path(Some("u42"));
        assert_eq!(namespaces.len(), 2);
        assert_eq!(namespaces[0].segments(), ["u42", "schemas"]);
        assert_eq!(namespaces[1].segments(), ["schemas"]);

        assert_eq!(store.search_path(None).len(), 1);
    }

    #[test]
    fn test_compact_render() {
        let value = serde_json::json!({"a": 1});
        assert_eq!(OutputFormat::Compact.render(&value).unwrap(), "{\"a\":1}");
    }
}
