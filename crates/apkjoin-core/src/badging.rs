//! Parser for `aapt dump badging` output.
//!
//! The format is line oriented, `key: attr='value' attr='value'` or
//! `key:'value'`. Every field is optional; unknown lines are ignored.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use apkjoin_schema::{PackageName, VersionCode};
use regex::Regex;
use thiserror::Error;

static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z][\w-]*)='((?:[^'\\]|\\.)*)'").expect("valid attribute regex")
});

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'((?:[^'\\]|\\.)*)'").expect("valid quoted regex"));

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BadgingError {
    #[error("badging output has no 'package:' line with a name")]
    NoPackage,
}

/// Fields recovered from badging text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Badging {
    pub package: PackageName,
    pub version_code: VersionCode,
    pub version_name: String,
    /// `split='...'` on the package line, for split members.
    pub split: Option<String>,
    pub min_sdk: Option<String>,
    pub target_sdk: Option<String>,
    pub label: Option<String>,
    pub permissions: BTreeSet<String>,
    pub features: BTreeSet<String>,
    /// ABIs from `native-code:` / `alt-native-code:`.
    pub native_code: Vec<String>,
}

impl Badging {
    /// Parse badging text.
    ///
    /// # Errors
    ///
    /// Returns [`BadgingError::NoPackage`] if the output does not name a
    /// package, which is the only field treated as mandatory.
    pub fn parse(text: &str) -> Result<Self, BadgingError> {
        let mut badging = Self::default();

        for line in text.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let rest = rest.trim();

            match key {
                "package" => {
                    for (name, value) in attributes(rest) {
                        match name {
                            "name" => badging.package = PackageName::new(value),
                            "versionCode" => {
                                badging.version_code = VersionCode::parse_lenient(value);
                            }
                            "versionName" => badging.version_name = value.to_string(),
                            "split" if !value.is_empty() => {
                                badging.split = Some(value.to_string());
                            }
                            _ => {}
                        }
                    }
                }
                "sdkVersion" | "minSdkVersion" => badging.min_sdk = first_quoted(rest),
                "targetSdkVersion" => badging.target_sdk = first_quoted(rest),
                "application-label" => badging.label = first_quoted(rest),
                "application" if badging.label.is_none() => {
                    badging.label = attributes(rest)
                        .find(|(n, _)| *n == "label")
                        .map(|(_, v)| v.to_string())
                        .filter(|v| !v.is_empty());
                }
                "uses-permission" | "uses-permission-sdk-23" | "uses-permission-sdk-m" => {
                    if let Some(name) = name_or_quoted(rest) {
                        badging.permissions.insert(name);
                    }
                }
                "uses-feature" | "uses-feature-not-required" => {
                    if let Some(name) = name_or_quoted(rest) {
                        badging.features.insert(name);
                    }
                }
                "native-code" | "alt-native-code" => {
                    for abi in QUOTED.captures_iter(rest).map(|c| c[1].to_string()) {
                        if !badging.native_code.contains(&abi) {
                            badging.native_code.push(abi);
                        }
                    }
                }
                _ => {}
            }
        }

        if badging.package.is_empty() {
            return Err(BadgingError::NoPackage);
        }
        Ok(badging)
    }
}

fn attributes(rest: &str) -> impl Iterator<Item = (&str, &str)> {
    ATTR.captures_iter(rest).filter_map(|c| {
        let name = c.get(1)?.as_str();
        let value = c.get(2)?.as_str();
        Some((name, value))
    })
}

fn first_quoted(rest: &str) -> Option<String> {
    QUOTED
        .captures(rest)
        .map(|c| c[1].to_string())
        .filter(|v| !v.is_empty())
}

// Old aapt prints `uses-permission:'x'`, newer prints `uses-permission: name='x'`.
fn name_or_quoted(rest: &str) -> Option<String> {
    attributes(rest)
        .find(|(n, _)| *n == "name")
        .map(|(_, v)| v.to_string())
        .or_else(|| first_quoted(rest))
        .filter(|v| !v.is_empty())
}
