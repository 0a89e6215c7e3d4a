//! Metadata extraction through the asset packaging tool.
//!
//! The classifier only sees the [`Inspector`] trait, so tests (and hosts
//! without an SDK) can substitute their own source of badging text.

use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use crate::toolchain::{AaptFlavor, ToolError, ToolchainLocation};

/// Source of raw, tool-formatted metadata about one package file.
pub trait Inspector: Send + Sync {
    /// `dump badging` output.
    fn badging(&self, apk: &Path) -> Result<String, ToolError>;

    /// Internal file listing, one entry per line.
    fn list(&self, apk: &Path) -> Result<String, ToolError>;

    /// `dump xmltree` output for one XML entry.
    fn xmltree(&self, apk: &Path, entry: &str) -> Result<String, ToolError>;
}

/// [`Inspector`] backed by `aapt` / `aapt2`.
#[derive(Debug, Clone)]
pub struct Aapt {
    toolchain: Arc<ToolchainLocation>,
}

impl Aapt {
    /// Wrap a resolved toolchain.
    pub fn new(toolchain: Arc<ToolchainLocation>) -> Self {
        Self { toolchain }
    }

    fn tool(&self) -> Result<(&Path, AaptFlavor), ToolError> {
        self.toolchain
            .aapt()
            .ok_or_else(|| ToolError::NotFound("aapt".to_string()))
    }
}

impl Inspector for Aapt {
    fn badging(&self, apk: &Path) -> Result<String, ToolError> {
        let (tool, _) = self.tool()?;
        let args: Vec<OsString> = vec!["dump".into(), "badging".into(), apk.into()];
        self.toolchain.run(tool, &args)
    }

    fn list(&self, apk: &Path) -> Result<String, ToolError> {
        let (tool, flavor) = self.tool()?;
        if flavor == AaptFlavor::Aapt2 {
            return Err(ToolError::Unsupported {
                tool: "aapt2".to_string(),
                operation: "list".to_string(),
            });
        }
        let args: Vec<OsString> = vec!["list".into(), apk.into()];
        self.toolchain.run(tool, &args)
    }

    fn xmltree(&self, apk: &Path, entry: &str) -> Result<String, ToolError> {
        let (tool, flavor) = self.tool()?;
        let args: Vec<OsString> = match flavor {
            AaptFlavor::Aapt => vec!["dump".into(), "xmltree".into(), apk.into(), entry.into()],
            AaptFlavor::Aapt2 => vec![
                "dump".into(),
                "xmltree".into(),
                "--file".into(),
                entry.into(),
                apk.into(),
            ],
        };
        self.toolchain.run(tool, &args)
    }
}
