//! Member classification.
//!
//! Turns one package file into a [`PackageMember`]: identity from badging
//! (or the file name when badging is unavailable), native ABIs from the
//! file listing, and a role picked by an ordered decision table.
//!
//! Classification never fails. Every problem is recorded as a warning on the
//! member and the best available answer is returned.

use std::path::Path;
use std::sync::LazyLock;

use apkjoin_schema::{Confidence, MetadataSource, PackageMember, PackageName, Role, VersionCode};
use regex::Regex;

use crate::aapt::Inspector;
use crate::badging::Badging;
use crate::io::extract::list_entries;

/// `name.version`, `name_version` or `name-version`, matched against a lower-cased stem.
static FILE_NAME_IDENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z][a-z0-9_.]*?)[._-]v?(\d+(?:\.\d+)*)$").expect("valid file name regex")
});

/// Role decision, strongest rule first.
///
/// | # | Condition                                  | Role   | Confidence |
/// |---|--------------------------------------------|--------|------------|
/// | 1 | badging declares `split='config.*'`        | Config | Declared   |
/// | 1 | badging declares any other `split='...'`   | Split  | Declared   |
/// | 2 | stem is `base`                             | Base   | Convention |
/// | 3 | stem is the declared package name          | Base   | Convention |
/// | 4 | stem starts with `split.` / `split_`       | Split  | Convention |
/// | 5 | stem starts with `config.`                 | Config | Convention |
/// | 6 | anything else                              | Base   | Fallback   |
pub fn decide_role(
    stem: &str,
    declared_split: Option<&str>,
    package: &PackageName,
) -> (Role, String, Confidence) {
    if let Some(split) = declared_split.filter(|s| !s.is_empty()) {
        let role = if split.starts_with("config.") {
            Role::Config
        } else {
            Role::Split
        };
        return (role, split.to_string(), Confidence::Declared);
    }

    let lower = stem.to_lowercase();
    if lower == "base" || (!package.is_empty() && stem.eq_ignore_ascii_case(package.as_str())) {
        return (Role::Base, String::new(), Confidence::Convention);
    }
    if lower.starts_with("split.") || lower.starts_with("split_") {
        return (Role::Split, stem.to_string(), Confidence::Convention);
    }
    if lower.starts_with("config.") {
        return (Role::Config, stem.to_string(), Confidence::Convention);
    }
    (Role::Base, String::new(), Confidence::Fallback)
}

/// Guess `(package, version name)` from a file stem.
pub fn identity_from_file_name(stem: &str) -> Option<(PackageName, String)> {
    let lower = stem.to_lowercase();
    let caps = FILE_NAME_IDENTITY.captures(&lower)?;
    Some((PackageName::new(&caps[1]), caps[2].to_string()))
}

/// Collect distinct `<abi>` tokens from `lib/<abi>/...` paths, in first-seen order.
pub fn architectures_from_listing<'a>(entries: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut abis: Vec<String> = Vec::new();
    for entry in entries {
        let mut parts = entry.trim().split('/');
        if parts.next() != Some("lib") {
            continue;
        }
        let (Some(abi), Some(_)) = (parts.next(), parts.next()) else {
            continue;
        };
        if !abi.is_empty() && !abis.iter().any(|a| a == abi) {
            abis.push(abi.to_string());
        }
    }
    abis
}

/// Classify one member file.
pub fn classify(path: &Path, inspector: &dyn Inspector) -> PackageMember {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut warnings = Vec::new();

    let size_bytes = match std::fs::metadata(path) {
        Ok(m) => m.len(),
        Err(e) => {
            warnings.push(format!("Cannot stat {file_name}: {e}"));
            0
        }
    };

    let badging = match inspector.badging(path) {
        Ok(text) => match Badging::parse(&text) {
            Ok(b) => Some(b),
            Err(e) => {
                warnings.push(format!("Unusable badging for {file_name}: {e}"));
                None
            }
        },
        Err(e) => {
            warnings.push(format!("No badging for {file_name}: {e}"));
            None
        }
    };

    let (badging, source) = match badging {
        Some(b) => (b, MetadataSource::Badging),
        None => {
            let mut guessed = Badging::default();
            if let Some((package, version_name)) = identity_from_file_name(&stem) {
                tracing::debug!("{file_name}: identity from file name: {package} {version_name}");
                guessed.package = package;
                guessed.version_name = version_name;
            }
            (guessed, MetadataSource::FileName)
        }
    };

    let listing = match inspector.list(path) {
        Ok(text) => Some(text.lines().map(str::to_string).collect::<Vec<_>>()),
        Err(e) => {
            tracing::debug!("{file_name}: listing tool unavailable ({e}), reading archive directly");
            match list_entries(path) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    warnings.push(format!("Cannot list {file_name}: {e}"));
                    None
                }
            }
        }
    };
    let mut architectures = listing
        .as_deref()
        .map(|entries| architectures_from_listing(entries.iter().map(String::as_str)))
        .unwrap_or_default();
    for abi in &badging.native_code {
        if !architectures.contains(abi) {
            architectures.push(abi.clone());
        }
    }

    let (role, split_name, confidence) =
        decide_role(&stem, badging.split.as_deref(), &badging.package);

    for warning in &warnings {
        tracing::warn!("{warning}");
    }

    PackageMember {
        path: path.to_path_buf(),
        file_name,
        size_bytes,
        package: badging.package,
        version_name: badging.version_name,
        version_code: if source == MetadataSource::Badging {
            badging.version_code
        } else {
            VersionCode::UNKNOWN
        },
        min_sdk: badging.min_sdk,
        target_sdk: badging.target_sdk,
        label: badging.label,
        permissions: badging.permissions,
        features: badging.features,
        architectures,
        role,
        split_name,
        confidence,
        source,
        warnings,
    }
}
