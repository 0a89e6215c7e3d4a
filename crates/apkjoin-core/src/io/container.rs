//! Opening the outer container and locating its package members.

use std::path::{Path, PathBuf};

use apkjoin_schema::{ANDROID_MANIFEST, CONTAINER_MANIFEST, ContainerManifest};

use super::extract::{extract_zip, is_zip};
use crate::error::MergeError;

/// An opened container: a directory holding the members plus the optional descriptor.
#[derive(Debug)]
pub struct Container {
    /// Directory the members live in (the input itself, or its extraction).
    pub root: PathBuf,
    /// Parsed `manifest.json`, if present and well-formed.
    pub manifest: Option<ContainerManifest>,
    /// Member files, sorted by path.
    pub members: Vec<PathBuf>,
    /// Problems with the descriptor; never fatal.
    pub warnings: Vec<String>,
}

impl Container {
    /// Open `input`, extracting it under `scratch` when it is an archive.
    ///
    /// A directory is used in place.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::UnrecognizedContainer`] if `input` is neither a
    /// directory nor a ZIP archive, or is a single package rather than a
    /// container, and [`MergeError::NoMembers`] if no `*.apk` is found.
    pub fn open(input: &Path, scratch: &Path) -> Result<Self, MergeError> {
        let root = if input.is_dir() {
            input.to_path_buf()
        } else if is_zip(input) {
            extract_zip(input, scratch)?;
            scratch.to_path_buf()
        } else {
            return Err(MergeError::UnrecognizedContainer {
                path: input.to_path_buf(),
                reason: "not a directory or ZIP archive".to_string(),
            });
        };

        let members = find_members(&root);
        if members.is_empty() {
            if root.join(ANDROID_MANIFEST).is_file() {
                return Err(MergeError::UnrecognizedContainer {
                    path: input.to_path_buf(),
                    reason: "it is a single package, not a set of splits".to_string(),
                });
            }
            return Err(MergeError::NoMembers(input.to_path_buf()));
        }

        let mut warnings = Vec::new();
        let manifest = match std::fs::read_to_string(root.join(CONTAINER_MANIFEST)) {
            Ok(json) => match ContainerManifest::parse(&json) {
                Ok(m) => Some(m),
                Err(e) => {
                    warnings.push(format!("Ignoring container descriptor: {e}"));
                    None
                }
            },
            Err(_) => None,
        };

        tracing::debug!(
            "Opened container {} ({} members, descriptor: {})",
            input.display(),
            members.len(),
            manifest.is_some()
        );

        Ok(Self {
            root,
            manifest,
            members,
            warnings,
        })
    }
}

fn find_members(root: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("apk"))
        })
        .map(walkdir::DirEntry::into_path)
        .collect()
}
