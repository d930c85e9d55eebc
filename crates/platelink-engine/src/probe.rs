//! Engine availability probe.
//!
//! A synchronous, side-effect-free local check of whether the engine
//! package is installed and enabled. `false` is not an error: it tells the
//! consumer to trigger the external install flow and retry later.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Local query for engine presence. No IPC; safe to call repeatedly.
pub trait AvailabilityProbe: Send + Sync {
    fn is_available(&self) -> bool;
}

/// Probe double returning a preset answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub bool);

impl AvailabilityProbe for FixedProbe {
    fn is_available(&self) -> bool {
        self.0
    }
}

/// Registry entry format: `<registry_dir>/<service_name>.toml`.
#[derive(Debug, Deserialize)]
struct RegistryEntry {
    #[serde(default)]
    enabled: bool,
}

/// Checks the local package registry for the engine's service entry.
///
/// A package counts as available only when its entry file exists, parses,
/// and carries `enabled = true` — mirroring an installed-but-disabled
/// package being treated as absent.
#[derive(Debug, Clone)]
pub struct RegistryProbe {
    registry_dir: PathBuf,
    service_name: String,
}

impl RegistryProbe {
    pub fn new(registry_dir: impl Into<PathBuf>, service_name: impl Into<String>) -> Self {
        Self {
            registry_dir: registry_dir.into(),
            service_name: service_name.into(),
        }
    }

    fn entry_path(&self) -> PathBuf {
        self.registry_dir.join(format!("{}.toml", self.service_name))
    }

    fn read_entry(path: &Path) -> Option<RegistryEntry> {
        let content = std::fs::read_to_string(path).ok()?;
        toml::from_str(&content).ok()
    }
}

impl AvailabilityProbe for RegistryProbe {
    fn is_available(&self) -> bool {
        let path = self.entry_path();
        match Self::read_entry(&path) {
            Some(entry) => entry.enabled,
            None => {
                tracing::debug!(
                    service = %self.service_name,
                    path = %path.display(),
                    "No usable registry entry for engine service"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_entry(dir: &Path, service: &str, content: &str) {
        std::fs::write(dir.join(format!("{service}.toml")), content).unwrap();
    }

    #[test]
    fn test_fixed_probe() {
        assert!(FixedProbe(true).is_available());
        assert!(!FixedProbe(false).is_available());
    }

    #[test]
    fn test_registry_probe_enabled_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "com.example.anpr", "enabled = true\n");

        let probe = RegistryProbe::new(dir.path(), "com.example.anpr");
        assert!(probe.is_available());
    }

    #[test]
    fn test_registry_probe_disabled_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "com.example.anpr", "enabled = false\n");

        let probe = RegistryProbe::new(dir.path(), "com.example.anpr");
        assert!(!probe.is_available());
    }

    #[test]
    fn test_registry_probe_missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let probe = RegistryProbe::new(dir.path(), "com.example.anpr");
        assert!(!probe.is_available());
    }

    #[test]
    fn test_registry_probe_enabled_defaults_to_false() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "com.example.anpr", "version = \"2.1\"\n");

        let probe = RegistryProbe::new(dir.path(), "com.example.anpr");
        assert!(!probe.is_available());
    }

    #[test]
    fn test_registry_probe_malformed_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "com.example.anpr", "not {{ toml");

        let probe = RegistryProbe::new(dir.path(), "com.example.anpr");
        assert!(!probe.is_available());
    }

    #[test]
    fn test_probe_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let probe = RegistryProbe::new(dir.path(), "com.example.anpr");
        assert!(!probe.is_available());

        // Installing the package flips the answer without rebuilding the probe.
        write_entry(dir.path(), "com.example.anpr", "enabled = true\n");
        assert!(probe.is_available());
        assert!(probe.is_available());
    }
}
