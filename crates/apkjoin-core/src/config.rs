//! Layered configuration.
//!
//! Defaults, then `~/.apkjoin/config.toml`, then whatever the caller (the
//! CLI, from flags and `APKJOIN_*` variables) overrides on top.
//!
//! ```toml
//! [toolchain]
//! build_tools = "/opt/android-sdk/build-tools/34.0.0"
//! timeout_secs = 120
//!
//! [signing]
//! keystore = "/home/me/release.jks"
//! key_alias = "release"
//! keystore_pass = "env:KS_PASS"
//!
//! [merge]
//! jobs = 4
//! strip_signatures = true
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::signing::Keystore;

/// Default limit for a single external tool invocation.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External toolchain settings.
    pub toolchain: ToolchainConfig,
    /// Signing settings.
    pub signing: SigningConfig,
    /// Merge behaviour.
    pub merge: MergeConfig,
}

/// `[toolchain]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Explicit build-tools directory holding `aapt`, `zipalign`, `apksigner`.
    pub build_tools: Option<PathBuf>,
    /// Per-invocation timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            build_tools: None,
            timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
        }
    }
}

/// `[signing]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Keystore file handed to the signer.
    pub keystore: Option<PathBuf>,
    /// Key alias inside the keystore.
    pub key_alias: Option<String>,
    /// Password spec passed through verbatim (`pass:...`, `env:...`, `file:...`).
    pub keystore_pass: Option<String>,
}

/// `[merge]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Concurrent classification tasks; defaults to the logical CPU count.
    pub jobs: Option<usize>,
    /// Drop stale v1 signature files from the merged archive.
    pub strip_signatures: bool,
    /// Parent directory for the temporary work area.
    pub work_dir: Option<PathBuf>,
}

impl Config {
    /// Read a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Load the user configuration if one exists.
    ///
    /// A missing file yields the defaults. A malformed file also yields the
    /// defaults, together with a message describing why it was ignored.
    pub fn load_or_default(path: Option<&Path>) -> (Self, Option<String>) {
        let Some(path) = path.filter(|p| p.exists()) else {
            return (Self::default(), None);
        };
        match Self::load(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(format!("{e:#}; using defaults"))),
        }
    }

    /// Timeout applied to every external tool invocation.
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.toolchain.timeout_secs.max(1))
    }

    /// Effective classification concurrency (at least one).
    pub fn jobs(&self) -> usize {
        self.merge.jobs.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Keystore to sign with, if one is configured.
    pub fn keystore(&self) -> Option<Keystore> {
        self.signing.keystore.as_ref().map(|path| Keystore {
            path: path.clone(),
            alias: self.signing.key_alias.clone(),
            password: self.signing.keystore_pass.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let (config, warning) = Config::load_or_default(Some(&dir.path().join("config.toml")));
        assert!(warning.is_none());
        assert_eq!(config.toolchain.timeout_secs, DEFAULT_TOOL_TIMEOUT_SECS);
        assert!(config.keystore().is_none());
        assert!(config.jobs() >= 1);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
                [signing]
                keystore = "/keys/release.jks"
                key_alias = "release"

                [merge]
                jobs = 3
            "#,
        )
        .unwrap();

        let (config, warning) = Config::load_or_default(Some(&path));
        assert!(warning.is_none());
        assert_eq!(config.jobs(), 3);
        assert_eq!(config.toolchain.timeout_secs, DEFAULT_TOOL_TIMEOUT_SECS);
        let ks = config.keystore().unwrap();
        assert_eq!(ks.path, PathBuf::from("/keys/release.jks"));
        assert_eq!(ks.alias.as_deref(), Some("release"));
        assert!(ks.password.is_none());
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[merge\njobs = ").unwrap();

        let (config, warning) = Config::load_or_default(Some(&path));
        assert!(warning.unwrap().contains("using defaults"));
        assert!(!config.merge.strip_signatures);
    }

    #[test]
    fn test_zero_jobs_is_clamped() {
        let mut config = Config::default();
        config.merge.jobs = Some(0);
        assert_eq!(config.jobs(), 1);
    }
}
