//! Line-oriented console reporter.
//!
//! Progress goes to stderr so stdout stays clean for `--json`. Warnings and
//! errors are printed even with `--quiet`.

use apkjoin_core::Reporter;
use apkjoin_schema::{MetadataSource, PackageMember};
use crossterm::style::Stylize;

use super::theme::{Icons, format_size};

/// [`Reporter`] that prints styled lines to stderr.
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter {
    quiet: bool,
    icons: Icons,
}

impl ConsoleReporter {
    /// Create a reporter; `quiet` hides everything but warnings and errors.
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            icons: Icons::default(),
        }
    }
}

/// One-line description of a classified member.
pub fn member_line(member: &PackageMember) -> String {
    let identity = if member.package.is_empty() {
        "unknown package".to_string()
    } else {
        format!("{} {}", member.package, member.version_code)
    };
    let guessed = if member.source == MetadataSource::FileName {
        ", from file name"
    } else {
        ""
    };
    format!(
        "{} as {} ({}{guessed}) {identity}, {}",
        member.file_name,
        member.display_name(),
        member.confidence,
        format_size(member.size_bytes)
    )
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        if !self.quiet {
            eprintln!("{} {}", self.icons.active.dark_grey(), title.bold());
        }
    }

    fn classified(&self, member: &PackageMember) {
        if !self.quiet {
            eprintln!("  {} {}", self.icons.success.green(), member_line(member));
        }
    }

    fn conflict(&self, path: &str, kept_from: &str, dropped_from: &str) {
        if !self.quiet {
            eprintln!(
                "  {} {} kept from {}, dropped from {}",
                self.icons.info.dark_grey(),
                path,
                kept_from.cyan(),
                dropped_from.dark_grey()
            );
        }
    }

    fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("  {} {msg}", self.icons.info.blue());
        }
    }

    fn success(&self, msg: &str) {
        if !self.quiet {
            eprintln!("  {} {msg}", self.icons.success.green());
        }
    }

    fn warning(&self, msg: &str) {
        eprintln!("  {} {}", self.icons.warning.yellow(), msg.yellow());
    }

    fn error(&self, msg: &str) {
        eprintln!("  {} {}", self.icons.error.red(), msg.red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apkjoin_schema::{Confidence, PackageName, Role, VersionCode};
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn member() -> PackageMember {
        PackageMember {
            path: PathBuf::from("split.config.arm64_v8a.apk"),
            file_name: "split.config.arm64_v8a.apk".to_string(),
            size_bytes: 2048,
            package: PackageName::new("com.example.game"),
            version_name: "1.4.2".to_string(),
            version_code: VersionCode::new(42),
            min_sdk: None,
            target_sdk: None,
            label: None,
            permissions: BTreeSet::new(),
            features: BTreeSet::new(),
            architectures: vec!["arm64-v8a".to_string()],
            role: Role::Split,
            split_name: "split.config.arm64_v8a".to_string(),
            confidence: Confidence::Convention,
            source: MetadataSource::Badging,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_member_line() {
        assert_eq!(
            member_line(&member()),
            "split.config.arm64_v8a.apk as split.config.arm64_v8a (convention) com.example.game 42, 2.0 KB"
        );
    }

    #[test]
    fn test_member_line_unknown_identity() {
        let mut m = member();
        m.package = PackageName::default();
        m.source = MetadataSource::FileName;
        assert!(member_line(&m).contains("from file name) unknown package"));
    }
}
