//! Progress sink for the merge pipeline.
//!
//! The core never prints. Stage changes, per-member results and dropped
//! paths go through a [`Reporter`]; the binary supplies a console one.

use apkjoin_schema::PackageMember;

/// User-facing progress events. Shared across classification tasks.
pub trait Reporter: Send + Sync {
    /// Indicates a new stage has started (e.g. "Classifying", "Merging").
    fn section(&self, title: &str);

    /// A member finished classification.
    fn classified(&self, member: &PackageMember);

    /// A path was dropped because an earlier member already supplied it.
    fn conflict(&self, path: &str, kept_from: &str, dropped_from: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

/// Discards every event.
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn classified(&self, _: &PackageMember) {}
    fn conflict(&self, _: &str, _: &str, _: &str) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
}
