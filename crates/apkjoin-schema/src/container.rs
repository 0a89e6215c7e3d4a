//! The optional `manifest.json` descriptor carried by split containers.
//!
//! Purely informational: member classification never depends on it. It is
//! used to cross-check the base identity and to list expansion files.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{PackageName, VersionCode};

/// File name of the descriptor at the container root.
pub const CONTAINER_MANIFEST: &str = "manifest.json";

/// Errors that can occur when reading a [`ContainerManifest`].
#[derive(thiserror::Error, Debug)]
pub enum ContainerManifestError {
    /// The descriptor is not valid JSON or has the wrong shape.
    #[error("Malformed {CONTAINER_MANIFEST}: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Top-level container descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerManifest {
    /// Descriptor format revision, when present.
    pub xapk_version: Option<u32>,
    /// Application id.
    pub package_name: PackageName,
    /// Display name.
    pub name: String,
    /// Human-readable version.
    pub version_name: String,
    /// Version code; containers write it as a string or a number.
    #[serde(deserialize_with = "lenient_version_code")]
    pub version_code: VersionCode,
    /// Minimum SDK, verbatim.
    pub min_sdk_version: Option<String>,
    /// Target SDK, verbatim.
    pub target_sdk_version: Option<String>,
    /// Permissions listed by the packager.
    pub permissions: Vec<String>,
    /// Split configuration ids (e.g. `config.arm64_v8a`).
    pub split_configs: Vec<String>,
    /// Package members, in packager order.
    pub split_apks: Vec<SplitDescriptor>,
    /// Expansion (OBB) files shipped next to the members.
    pub expansions: Vec<ExpansionDescriptor>,
}

/// One package member listed in the descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitDescriptor {
    /// Member file name inside the container.
    pub file: String,
    /// Split identifier (`base`, `config.xxhdpi`, ...).
    pub id: String,
}

/// One expansion file listed in the descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionDescriptor {
    /// Path of the file inside the container.
    pub file: String,
    /// Install location flag (e.g. `EXTERNAL_STORAGE`).
    pub install_location: String,
    /// Device path the file is meant for.
    pub install_path: Option<String>,
}

impl ContainerManifest {
    /// Parse a descriptor from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerManifestError::Malformed`] if the JSON is invalid.
    pub fn parse(json: &str) -> Result<Self, ContainerManifestError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn lenient_version_code<'de, D>(deserializer: D) -> Result<VersionCode, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => VersionCode::new(n),
        Some(Raw::Text(s)) => VersionCode::parse_lenient(&s),
        None => VersionCode::UNKNOWN,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_string_version_code() {
        let manifest = ContainerManifest::parse(
            r#"{
                "xapk_version": 2,
                "package_name": "com.example.game",
                "name": "Game",
                "version_code": "42",
                "version_name": "1.4.2",
                "split_apks": [
                    {"file": "base.apk", "id": "base"},
                    {"file": "split.config.arm64_v8a.apk", "id": "config.arm64_v8a"}
                ],
                "expansions": [
                    {"file": "Android/obb/com.example.game/main.42.com.example.game.obb",
                     "install_location": "EXTERNAL_STORAGE"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.package_name, "com.example.game");
        assert_eq!(manifest.version_code, VersionCode::new(42));
        assert_eq!(manifest.split_apks.len(), 2);
        assert_eq!(manifest.split_apks[1].id, "config.arm64_v8a");
        assert_eq!(manifest.expansions[0].install_location, "EXTERNAL_STORAGE");
        assert!(manifest.expansions[0].install_path.is_none());
    }

    #[test]
    fn test_parse_numeric_version_code() {
        let manifest =
            ContainerManifest::parse(r#"{"package_name": "a.b", "version_code": 7}"#).unwrap();
        assert_eq!(manifest.version_code, VersionCode::new(7));
        assert!(manifest.split_apks.is_empty());
    }

    #[test]
    fn test_missing_fields_default() {
        let manifest = ContainerManifest::parse("{}").unwrap();
        assert!(manifest.package_name.is_empty());
        assert!(!manifest.version_code.is_known());
    }

    #[test]
    fn test_malformed_json() {
        assert!(ContainerManifest::parse("{ not json").is_err());
    }
}
