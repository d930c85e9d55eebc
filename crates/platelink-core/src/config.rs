use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Top-level configuration for the Platelink client.
///
/// Loaded from `~/.platelink/config.toml` by default. Each section covers
/// one concern; missing sections and fields fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatelinkConfig {
    pub general: GeneralConfig,
    pub engine: EngineConfig,
    pub session: SessionConfig,
}

impl PlatelinkConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PlatelinkConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Settings describing the external recognition engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Registry identifier of the engine service package.
    pub service_name: String,
    /// Directory of the local package registry the availability probe reads.
    pub registry_dir: String,
    /// Marketplace link surfaced to the user when the engine is absent.
    pub install_url: String,
    /// External configurator command and arguments. Launched as an opaque
    /// child process; the client only reacts to its exit.
    pub configure_command: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            service_name: "com.sdtoolkit.anprservice".to_string(),
            registry_dir: "~/.platelink/registry".to_string(),
            install_url: "market://details?id=com.sdtoolkit.anprservice".to_string(),
            configure_command: Vec::new(),
        }
    }
}

/// Session behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Issue a `setup` with the engine's own device params right after a
    /// successful open, unless recognition is already running.
    pub auto_setup: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { auto_setup: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = PlatelinkConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.engine.service_name, "com.sdtoolkit.anprservice");
        assert!(config.engine.configure_command.is_empty());
        assert!(config.session.auto_setup);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[engine]
service_name = "com.example.anpr"
registry_dir = "/var/lib/platelink/registry"
install_url = "https://example.com/anpr"
configure_command = ["anpr-settings", "--modal"]

[session]
auto_setup = false
"#;
        let file = create_temp_config(content);
        let config = PlatelinkConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.engine.service_name, "com.example.anpr");
        assert_eq!(config.engine.registry_dir, "/var/lib/platelink/registry");
        assert_eq!(
            config.engine.configure_command,
            vec!["anpr-settings".to_string(), "--modal".to_string()]
        );
        assert!(!config.session.auto_setup);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "warn"
"#;
        let file = create_temp_config(content);
        let config = PlatelinkConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.engine.service_name, "com.sdtoolkit.anprservice");
        assert!(config.session.auto_setup);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = PlatelinkConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(PlatelinkConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = PlatelinkConfig::default();
        config.engine.service_name = "com.example.engine".to_string();
        config.save(&path).unwrap();

        let reloaded = PlatelinkConfig::load(&path).unwrap();
        assert_eq!(reloaded.engine.service_name, "com.example.engine");
        assert_eq!(reloaded.general.log_level, config.general.log_level);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = PlatelinkConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert!(config.session.auto_setup);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = PlatelinkConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let rt: PlatelinkConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(rt.engine.install_url, config.engine.install_url);
        assert_eq!(rt.session.auto_setup, config.session.auto_setup);
    }
}
