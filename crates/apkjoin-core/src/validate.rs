//! Cross-member consistency checks.
//!
//! This is the only gate before merge I/O: nothing is extracted until
//! [`validate`] has passed.

use apkjoin_schema::{ContainerManifest, PackageName, VersionCode};
use thiserror::Error;

use crate::members::MemberSet;
use crate::reporter::Reporter;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No base member found; cannot merge splits without one")]
    MissingBase,

    #[error("More than one member could be the base: {}", candidates.join(", "))]
    AmbiguousBase { candidates: Vec<String> },

    #[error("{member} belongs to package '{found}', expected '{expected}'")]
    IdentityMismatch {
        member: String,
        expected: PackageName,
        found: PackageName,
    },

    #[error("{member} has version code {found}, expected {expected}")]
    VersionMismatch {
        member: String,
        expected: VersionCode,
        found: VersionCode,
    },
}

/// Check that every member belongs to the base's package and version.
///
/// Members whose identity fields are unknown are exempt, as is everything
/// when the base's own field is unknown.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found, in member order.
pub fn validate(set: &MemberSet, reporter: &dyn Reporter) -> Result<(), ValidationError> {
    let base = set.base().ok_or(ValidationError::MissingBase)?;

    for member in set.non_base() {
        if !base.package.is_empty() && !member.package.is_empty() && member.package != base.package {
            return Err(ValidationError::IdentityMismatch {
                member: member.file_name.clone(),
                expected: base.package.clone(),
                found: member.package.clone(),
            });
        }
        if base.version_code.is_known()
            && member.version_code.is_known()
            && member.version_code != base.version_code
        {
            return Err(ValidationError::VersionMismatch {
                member: member.file_name.clone(),
                expected: base.version_code,
                found: member.version_code,
            });
        }
    }

    let package = if base.package.is_empty() {
        "<unknown package>"
    } else {
        base.package.as_str()
    };
    let version = if base.version_name.is_empty() {
        base.version_code.to_string()
    } else {
        base.version_name.clone()
    };
    tracing::info!("Validated {} members of {package} {version}", set.len());
    reporter.success(&format!(
        "{} members agree on {package} {version}",
        set.len()
    ));
    Ok(())
}

/// Compare the container descriptor against the classified set.
///
/// Disagreements are returned as warnings; the descriptor never decides
/// anything.
pub fn check_container(set: &MemberSet, manifest: &ContainerManifest) -> Vec<String> {
    let mut warnings = Vec::new();
    let Some(base) = set.base() else {
        return warnings;
    };

    if !manifest.package_name.is_empty()
        && !base.package.is_empty()
        && manifest.package_name != base.package
    {
        warnings.push(format!(
            "Container descriptor names package '{}' but the base member is '{}'",
            manifest.package_name, base.package
        ));
    }
    if manifest.version_code.is_known()
        && base.version_code.is_known()
        && manifest.version_code != base.version_code
    {
        warnings.push(format!(
            "Container descriptor names version code {} but the base member has {}",
            manifest.version_code, base.version_code
        ));
    }
    for split in &manifest.split_apks {
        if split.file.is_empty() {
            continue;
        }
        if !set.iter().any(|m| m.file_name == split.file) {
            warnings.push(format!(
                "Container descriptor lists {} but no such member was found",
                split.file
            ));
        }
    }
    for expansion in &manifest.expansions {
        tracing::debug!(
            "Expansion file {} ({}) is not part of the merged package",
            expansion.file,
            expansion.install_location
        );
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::fixtures::member;
    use crate::reporter::NullReporter;
    use apkjoin_schema::{Role, SplitDescriptor};

    fn set(members: Vec<apkjoin_schema::PackageMember>) -> MemberSet {
        MemberSet::new(members).unwrap()
    }

    #[test]
    fn test_consistent_set_is_valid() {
        let s = set(vec![
            member("base.apk", Role::Base, "", "com.example.game", 42),
            member("split.config.arm64_v8a.apk", Role::Split, "split.config.arm64_v8a", "com.example.game", 42),
            member("config.xxhdpi.apk", Role::Config, "config.xxhdpi", "com.example.game", 42),
        ]);
        assert_eq!(validate(&s, &NullReporter), Ok(()));
    }

    #[test]
    fn test_missing_base() {
        let s = set(vec![
            member("split.a.apk", Role::Split, "split.a", "com.example.game", 42),
            member("config.en.apk", Role::Config, "config.en", "com.example.game", 42),
        ]);
        assert_eq!(validate(&s, &NullReporter), Err(ValidationError::MissingBase));
    }

    #[test]
    fn test_identity_mismatch() {
        let s = set(vec![
            member("base.apk", Role::Base, "", "com.example.game", 42),
            member("split.a.apk", Role::Split, "split.a", "com.example.other", 42),
        ]);
        assert!(matches!(
            validate(&s, &NullReporter),
            Err(ValidationError::IdentityMismatch { ref member, .. }) if member == "split.a.apk"
        ));
    }

    #[test]
    fn test_version_mismatch() {
        let s = set(vec![
            member("base.apk", Role::Base, "", "com.example.game", 42),
            member("split.a.apk", Role::Split, "split.a", "com.example.game", 43),
        ]);
        assert_eq!(
            validate(&s, &NullReporter),
            Err(ValidationError::VersionMismatch {
                member: "split.a.apk".to_string(),
                expected: VersionCode::new(42),
                found: VersionCode::new(43),
            })
        );
    }

    #[test]
    fn test_unknown_fields_are_exempt() {
        let s = set(vec![
            member("base.apk", Role::Base, "", "com.example.game", 42),
            member("split.a.apk", Role::Split, "split.a", "", 0),
        ]);
        assert_eq!(validate(&s, &NullReporter), Ok(()));

        let s = set(vec![
            member("base.apk", Role::Base, "", "", 0),
            member("split.a.apk", Role::Split, "split.a", "com.example.other", 7),
        ]);
        assert_eq!(validate(&s, &NullReporter), Ok(()));
    }

    #[test]
    fn test_container_disagreement_is_warning() {
        let s = set(vec![
            member("base.apk", Role::Base, "", "com.example.game", 42),
            member("split.a.apk", Role::Split, "split.a", "com.example.game", 42),
        ]);
        let manifest = ContainerManifest {
            package_name: PackageName::new("com.example.other"),
            version_code: VersionCode::new(41),
            split_apks: vec![
                SplitDescriptor {
                    file: "base.apk".to_string(),
                    id: "base".to_string(),
                },
                SplitDescriptor {
                    file: "config.fr.apk".to_string(),
                    id: "config.fr".to_string(),
                },
            ],
            ..ContainerManifest::default()
        };

        let warnings = check_container(&s, &manifest);
        assert_eq!(warnings.len(), 3);
        assert!(warnings[2].contains("config.fr.apk"));
    }
}
