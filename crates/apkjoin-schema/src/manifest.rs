use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{PackageName, VersionCode};

/// Kind of a component declared under `<application>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    /// `<activity>`
    Activity,
    /// `<activity-alias>`
    ActivityAlias,
    /// `<service>`
    Service,
    /// `<receiver>`
    Receiver,
    /// `<provider>`
    Provider,
}

impl ComponentKind {
    /// Map a manifest element name to a component kind.
    pub fn from_element(name: &str) -> Option<Self> {
        match name {
            "activity" => Some(Self::Activity),
            "activity-alias" => Some(Self::ActivityAlias),
            "service" => Some(Self::Service),
            "receiver" => Some(Self::Receiver),
            "provider" => Some(Self::Provider),
            _ => None,
        }
    }

    /// Manifest element name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::ActivityAlias => "activity-alias",
            Self::Service => "service",
            Self::Receiver => "receiver",
            Self::Provider => "provider",
        }
    }
}

/// One declared component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Element kind.
    pub kind: ComponentKind,
    /// `android:name`, verbatim.
    pub name: String,
    /// `android:exported`, when declared.
    pub exported: Option<bool>,
}

/// Decoded view of the base member's binary `AndroidManifest.xml`.
///
/// Only used for display; the merged archive carries the base manifest
/// bytes unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestDescriptor {
    /// `package` attribute.
    pub package: PackageName,
    /// `android:versionCode`.
    pub version_code: VersionCode,
    /// `android:versionName`.
    pub version_name: Option<String>,
    /// `uses-sdk/@minSdkVersion`.
    pub min_sdk: Option<String>,
    /// `uses-sdk/@targetSdkVersion`.
    pub target_sdk: Option<String>,
    /// Attributes of `<application>` keyed without the `android:` prefix.
    pub application: BTreeMap<String, String>,
    /// `uses-permission` names.
    pub permissions: Vec<String>,
    /// `uses-feature` names.
    pub features: Vec<String>,
    /// Components in declaration order.
    pub components: Vec<Component>,
}

impl ManifestDescriptor {
    /// Count declared components of one kind.
    pub fn count(&self, kind: ComponentKind) -> usize {
        self.components.iter().filter(|c| c.kind == kind).count()
    }

    /// `true` if `<application android:hasCode="false">` is declared.
    pub fn has_no_code(&self) -> bool {
        self.application
            .get("hasCode")
            .is_some_and(|v| v == "false" || v == "0x0")
    }
}
