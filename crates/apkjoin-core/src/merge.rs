//! Content merge planning.
//!
//! A [`MergePlan`] decides, for every file of every extracted member, whether
//! it is copied into the merge root, skipped, or copied under a new
//! class-index name. Planning touches nothing; [`MergePlan::apply`] does the
//! copying and returns the [`MergeReport`].
//!
//! Rules:
//! - the base tree is copied whole, manifest and class-index files included;
//! - other members contribute `assets/`, `res/`, `lib/` and plain top-level
//!   files, first writer wins;
//! - every non-base `classes*.dex` takes the next free `classesN.dex` name.
//!
//! Class-index files are copied byte for byte. References between them are
//! not rewritten, so a renumbered index only works when the runtime loads
//! it by position alone.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use apkjoin_schema::{ANDROID_MANIFEST, PackageMember};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::members::MemberSet;
use crate::paths::{class_index, class_index_name, entry_name};
use crate::reporter::Reporter;

/// Subtrees a non-base member may contribute.
const MERGED_SUBTREES: [&str; 3] = ["assets", "res", "lib"];

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Cannot plan a merge without a base member")]
    NoBaseMember,

    #[error("Extracted tree for {member} not found at {path}")]
    MissingRoot { member: String, path: PathBuf },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PlanError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Why a file was left out of the merge root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// An earlier member already supplied this path.
    Taken { kept_from: String },
    /// Only the base member's manifest is used.
    ManifestFromBase,
    /// Outside the subtrees carried over from non-base members.
    NotMerged,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Taken { kept_from } => write!(f, "already provided by {kept_from}"),
            Self::ManifestFromBase => f.write_str("manifest is taken from the base member"),
            Self::NotMerged => f.write_str("outside the merged subtrees"),
        }
    }
}

/// What happens to one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Copy,
    Skip(SkipReason),
    Renumber(String),
}

/// One planned file operation.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// Display name of the contributing member.
    pub member: String,
    pub source: PathBuf,
    /// Forward-slash path relative to the member root.
    pub relative: String,
    pub resolution: Resolution,
}

impl PlanEntry {
    /// Destination entry name, if the file lands in the merge root.
    pub fn destination(&self) -> Option<&str> {
        match &self.resolution {
            Resolution::Copy => Some(&self.relative),
            Resolution::Renumber(name) => Some(name),
            Resolution::Skip(_) => None,
        }
    }
}

/// A path supplied by more than one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub path: String,
    pub kept_from: String,
    pub dropped_from: String,
    pub reason: String,
}

/// Where one class-index file ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexAssignment {
    pub member: String,
    pub original: String,
    pub output: String,
}

/// Outcome of [`MergePlan::apply`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeReport {
    pub root: PathBuf,
    pub copied: usize,
    pub conflicts: Vec<Conflict>,
    pub dex: Vec<DexAssignment>,
}

#[derive(Debug, Clone)]
pub struct MergePlan {
    root: PathBuf,
    entries: Vec<PlanEntry>,
}

/// Destination paths already owned by a member.
///
/// A file also blocks every path below it, and a directory blocks a file of
/// the same name, since neither can be created over the other.
#[derive(Debug, Default)]
struct Claims {
    files: HashMap<String, String>,
    dirs: HashMap<String, String>,
}

impl Claims {
    fn owner(&self, relative: &str) -> Option<&String> {
        self.files
            .get(relative)
            .or_else(|| self.dirs.get(relative))
            .or_else(|| parent_dirs(relative).find_map(|dir| self.files.get(dir)))
    }

    fn claim(&mut self, relative: &str, member: &str) {
        for dir in parent_dirs(relative) {
            self.dirs
                .entry(dir.to_string())
                .or_insert_with(|| member.to_string());
        }
        self.files.insert(relative.to_string(), member.to_string());
    }
}

/// `a/b/c` yields `a` then `a/b`.
fn parent_dirs(relative: &str) -> impl Iterator<Item = &str> {
    relative.match_indices('/').map(move |(i, _)| &relative[..i])
}

/// Files under `root`, sorted by path, as `(absolute, relative entry name)`.
fn member_files(root: &Path) -> Result<Vec<(PathBuf, String)>, PlanError> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            PlanError::io(&path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map(entry_name)
            .unwrap_or_default();
        files.push((entry.into_path(), relative));
    }
    Ok(files)
}

impl MergePlan {
    /// Plan the merge of `set` into `dest`.
    ///
    /// `roots[i]` is the extracted tree of the i-th member of `set`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::NoBaseMember`] if the set has no base, and
    /// [`PlanError::MissingRoot`] if a member has no extracted tree.
    pub fn build(set: &MemberSet, roots: &[PathBuf], dest: &Path) -> Result<Self, PlanError> {
        set.base().ok_or(PlanError::NoBaseMember)?;

        let mut entries = Vec::new();
        let mut claims = Claims::default();
        let mut pending_dex: Vec<PlanEntry> = Vec::new();

        for (i, member) in set.iter().enumerate() {
            let root = member_root(member, roots.get(i))?;
            let name = member.display_name().to_string();
            let mut member_dex = Vec::new();

            for (source, relative) in member_files(root)? {
                let top_level = !relative.contains('/');

                if member.is_base() {
                    claims.claim(&relative, &name);
                    entries.push(PlanEntry {
                        member: name.clone(),
                        source,
                        relative,
                        resolution: Resolution::Copy,
                    });
                    continue;
                }

                let resolution = if top_level && class_index(&relative).is_some() {
                    member_dex.push(PlanEntry {
                        member: name.clone(),
                        source,
                        relative,
                        resolution: Resolution::Copy,
                    });
                    continue;
                } else if top_level && relative == ANDROID_MANIFEST {
                    Resolution::Skip(SkipReason::ManifestFromBase)
                } else if !top_level
                    && !MERGED_SUBTREES
                        .iter()
                        .any(|dir| relative.split('/').next() == Some(*dir))
                {
                    Resolution::Skip(SkipReason::NotMerged)
                } else if let Some(owner) = claims.owner(&relative) {
                    Resolution::Skip(SkipReason::Taken {
                        kept_from: owner.clone(),
                    })
                } else {
                    claims.claim(&relative, &name);
                    Resolution::Copy
                };

                tracing::debug!("{name}: {relative} -> {resolution:?}");
                entries.push(PlanEntry {
                    member: name.clone(),
                    source,
                    relative,
                    resolution,
                });
            }

            member_dex.sort_by_key(|e| class_index(&e.relative));
            pending_dex.extend(member_dex);
        }

        let mut next = 1;
        for mut entry in pending_dex {
            while claims.owner(&class_index_name(next)).is_some() {
                next += 1;
            }
            let output = class_index_name(next);
            tracing::debug!("{}: {} renumbered to {output}", entry.member, entry.relative);
            claims.claim(&output, &entry.member);
            entry.resolution = Resolution::Renumber(output);
            entries.push(entry);
        }

        Ok(Self {
            root: dest.to_path_buf(),
            entries,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Copy every planned file into the merge root.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::Io`] if a directory cannot be created or a file
    /// cannot be copied.
    pub fn apply(self, reporter: &dyn Reporter) -> Result<MergeReport, PlanError> {
        fs::create_dir_all(&self.root).map_err(|e| PlanError::io(&self.root, e))?;

        let mut report = MergeReport {
            root: self.root.clone(),
            ..MergeReport::default()
        };

        for entry in &self.entries {
            let Some(destination) = entry.destination() else {
                if let Resolution::Skip(SkipReason::Taken { kept_from }) = &entry.resolution {
                    reporter.conflict(&entry.relative, kept_from, &entry.member);
                    report.conflicts.push(Conflict {
                        path: entry.relative.clone(),
                        kept_from: kept_from.clone(),
                        dropped_from: entry.member.clone(),
                        reason: SkipReason::Taken {
                            kept_from: kept_from.clone(),
                        }
                        .to_string(),
                    });
                }
                continue;
            };

            let target = self.root.join(destination);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| PlanError::io(parent, e))?;
            }
            fs::copy(&entry.source, &target).map_err(|e| PlanError::io(&entry.source, e))?;
            report.copied += 1;

            let is_dex = matches!(entry.resolution, Resolution::Renumber(_))
                || (!destination.contains('/') && class_index(destination).is_some());
            if is_dex {
                report.dex.push(DexAssignment {
                    member: entry.member.clone(),
                    original: entry.relative.clone(),
                    output: destination.to_string(),
                });
            }
        }

        tracing::info!(
            "Merged {} files into {} ({} conflicts)",
            report.copied,
            self.root.display(),
            report.conflicts.len()
        );
        Ok(report)
    }
}

fn member_root<'a>(member: &PackageMember, root: Option<&'a PathBuf>) -> Result<&'a Path, PlanError> {
    match root {
        Some(root) if root.is_dir() => Ok(root.as_path()),
        other => Err(PlanError::MissingRoot {
            member: member.file_name.clone(),
            path: other.cloned().unwrap_or_default(),
        }),
    }
}
