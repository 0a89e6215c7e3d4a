//! Domain-specific errors for the merge pipeline

use std::path::PathBuf;

use thiserror::Error;

use crate::io::extract::ExtractError;
use crate::merge::PlanError;
use crate::repackage::RepackageError;
use crate::validate::ValidationError;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("{path} is not a recognized split container: {reason}")]
    UnrecognizedContainer { path: PathBuf, reason: String },

    #[error("No package members (*.apk) found in {0}")]
    NoMembers(PathBuf),

    #[error("Member {member} is malformed: {reason}")]
    MalformedMember { member: String, reason: String },

    #[error("Merged archive is not a valid package: {0}")]
    MalformedOutput(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Merge failed: {0}")]
    Plan(#[from] PlanError),

    #[error("Repackaging failed: {0}")]
    Repackage(#[from] RepackageError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl MergeError {
    /// Wrap an I/O error with a description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
