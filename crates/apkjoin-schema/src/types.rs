use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Android application id (e.g. `com.example.game`).
///
/// Unlike most identifiers in this workspace the value is kept verbatim:
/// Android package names are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    /// Create a package name from a string, trimming surrounding whitespace.
    pub fn new(name: &str) -> Self {
        Self(name.trim().to_string())
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when no name is known.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Monotonic `android:versionCode`. Zero means "unknown".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct VersionCode(u64);

impl VersionCode {
    /// The "not known" sentinel.
    pub const UNKNOWN: Self = Self(0);

    /// Wrap a raw version code.
    pub const fn new(code: u64) -> Self {
        Self(code)
    }

    /// Raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// `true` if the code carries identity information.
    pub const fn is_known(self) -> bool {
        self.0 != 0
    }

    /// Parse a decimal or `0x`-prefixed hexadecimal code.
    ///
    /// Returns [`VersionCode::UNKNOWN`] for anything unparseable.
    pub fn parse_lenient(raw: &str) -> Self {
        let raw = raw.trim();
        let parsed = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
            u64::from_str_radix(hex, 16).ok()
        } else {
            raw.parse::<u64>().ok()
        };
        Self(parsed.unwrap_or(0))
    }
}

impl std::fmt::Display for VersionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_known() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("?")
        }
    }
}

/// What part a member plays in the split set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Primary code and default manifest.
    Base,
    /// Feature or density/ABI split (`split.*`, `split_*`).
    Split,
    /// Configuration split (`config.*`).
    Config,
}

impl Role {
    /// Lowercase label used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Split => "split",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a [`Role`] was decided, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// The member itself declared its split name.
    Declared,
    /// A file-naming convention matched.
    Convention,
    /// Nothing matched; the default role was assumed.
    Fallback,
}

impl Confidence {
    /// `true` for anything stronger than [`Confidence::Fallback`].
    pub fn is_confident(self) -> bool {
        !matches!(self, Self::Fallback)
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Declared => "declared",
            Self::Convention => "convention",
            Self::Fallback => "fallback",
        })
    }
}

/// Where a member's identity fields came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSource {
    /// Parsed from the toolchain's badging output.
    Badging,
    /// Guessed from the file name.
    FileName,
}

/// One physical package file inside a container, after classification.
///
/// Members are built once by the classifier and only read afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMember {
    /// Location of the `.apk` on disk.
    pub path: PathBuf,
    /// File name including extension (e.g. `split.config.arm64_v8a.apk`).
    pub file_name: String,
    /// Size of the member file in bytes.
    pub size_bytes: u64,

    /// Declared package name; empty when unknown.
    pub package: PackageName,
    /// Human-readable version; empty when unknown.
    pub version_name: String,
    /// Identity version code; [`VersionCode::UNKNOWN`] when unknown.
    pub version_code: VersionCode,
    /// `minSdkVersion`, verbatim.
    pub min_sdk: Option<String>,
    /// `targetSdkVersion`, verbatim.
    pub target_sdk: Option<String>,
    /// Application label, when the member declares one.
    pub label: Option<String>,

    /// `uses-permission` names.
    pub permissions: BTreeSet<String>,
    /// `uses-feature` names.
    pub features: BTreeSet<String>,
    /// ABIs found under `lib/<abi>/`, in order of first appearance.
    pub architectures: Vec<String>,

    /// Classified role.
    pub role: Role,
    /// Split name; empty for [`Role::Base`].
    pub split_name: String,
    /// Strength of the role decision.
    pub confidence: Confidence,
    /// Where the identity fields came from.
    pub source: MetadataSource,
    /// Non-fatal problems hit while classifying this member.
    pub warnings: Vec<String>,
}

impl PackageMember {
    /// File name without the trailing extension.
    pub fn stem(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map_or(self.file_name.as_str(), |(stem, _)| stem)
    }

    /// `true` for the base member.
    pub fn is_base(&self) -> bool {
        self.role == Role::Base
    }

    /// Short label for reports: split name, or `base`.
    pub fn display_name(&self) -> &str {
        if self.split_name.is_empty() {
            self.role.as_str()
        } else {
            &self.split_name
        }
    }
}
