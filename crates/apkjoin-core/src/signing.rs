//! Final signing step.
//!
//! The unsigned archive is aligned with `zipalign` when that tool is
//! present, then signed with `apksigner`. Any signing problem ends in
//! [`SigningOutcome::UnsignedFallback`]: the unsigned archive is written to
//! the output path instead and the caller is told why.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reporter::Reporter;
use crate::toolchain::{ToolError, ToolchainLocation};

/// Keystore handed to the signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keystore {
    pub path: PathBuf,
    pub alias: Option<String>,
    /// Passed through verbatim (`pass:...`, `env:...`, `file:...`).
    pub password: Option<String>,
}

#[derive(Error, Debug)]
pub enum SigningError {
    #[error("no keystore configured")]
    NoKeystore,

    #[error("{0} not found")]
    ToolMissing(String),

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SigningError {
    fn from_tool(tool: &str, err: ToolError) -> Self {
        match err {
            ToolError::NotFound(name) => Self::ToolMissing(name),
            ToolError::Timeout { tool, secs } => Self::Timeout { tool, secs },
            ToolError::Io(e) => Self::Io(e),
            other => Self::ToolFailed {
                tool: tool.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// How the output artifact was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SigningOutcome {
    Signed { path: PathBuf },
    UnsignedFallback { path: PathBuf, reason: String },
}

impl SigningOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Signed { path } | Self::UnsignedFallback { path, .. } => path,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Signed { .. })
    }
}

/// Aligns and signs archives.
pub trait Signer: Send + Sync {
    /// Write an aligned copy of `input` to `output`.
    fn align(&self, input: &Path, output: &Path) -> Result<(), SigningError>;

    /// Write a signed copy of `input` to `output`.
    fn sign(&self, input: &Path, output: &Path, keystore: &Keystore) -> Result<(), SigningError>;
}

/// [`Signer`] backed by `zipalign` and `apksigner`.
#[derive(Debug, Clone)]
pub struct ApkSigner {
    toolchain: Arc<ToolchainLocation>,
}

impl ApkSigner {
    pub fn new(toolchain: Arc<ToolchainLocation>) -> Self {
        Self { toolchain }
    }
}

impl Signer for ApkSigner {
    fn align(&self, input: &Path, output: &Path) -> Result<(), SigningError> {
        let tool = self
            .toolchain
            .zipalign()
            .ok_or_else(|| SigningError::ToolMissing("zipalign".to_string()))?;
        let args: Vec<OsString> = vec![
            "-f".into(),
            "-p".into(),
            "4".into(),
            input.into(),
            output.into(),
        ];
        self.toolchain
            .run(tool, &args)
            .map_err(|e| SigningError::from_tool("zipalign", e))?;
        Ok(())
    }

    fn sign(&self, input: &Path, output: &Path, keystore: &Keystore) -> Result<(), SigningError> {
        let tool = self
            .toolchain
            .apksigner()
            .ok_or_else(|| SigningError::ToolMissing("apksigner".to_string()))?;
        self.toolchain
            .run(tool, &apksigner_args(input, output, keystore))
            .map_err(|e| SigningError::from_tool("apksigner", e))?;
        Ok(())
    }
}

fn apksigner_args(input: &Path, output: &Path, keystore: &Keystore) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["sign".into(), "--ks".into(), keystore.path.clone().into()];
    if let Some(alias) = &keystore.alias {
        args.push("--ks-key-alias".into());
        args.push(alias.into());
    }
    if let Some(password) = &keystore.password {
        args.push("--ks-pass".into());
        args.push(password.into());
    }
    args.push("--out".into());
    args.push(output.into());
    args.push(input.into());
    args
}

/// Turn the unsigned archive into the final artifact at `output`.
///
/// # Errors
///
/// Fails if the directory of `output` cannot be created, or if the unsigned
/// archive cannot be copied to `output` after signing was given up.
pub fn finalize(
    signer: &dyn Signer,
    unsigned: &Path,
    output: &Path,
    keystore: Option<&Keystore>,
    reporter: &dyn Reporter,
) -> io::Result<SigningOutcome> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let aligned = unsigned.with_file_name("aligned.apk");
    let input = match signer.align(unsigned, &aligned) {
        Ok(()) => aligned.as_path(),
        Err(SigningError::ToolMissing(tool)) => {
            tracing::debug!("{tool} not available, signing the unaligned archive");
            unsigned
        }
        Err(e) => {
            reporter.warning(&format!("Alignment failed, continuing unaligned: {e}"));
            unsigned
        }
    };

    let result = match keystore {
        Some(keystore) => signer.sign(input, output, keystore),
        None => Err(SigningError::NoKeystore),
    };

    match result {
        Ok(()) => {
            tracing::info!("Signed {}", output.display());
            Ok(SigningOutcome::Signed {
                path: output.to_path_buf(),
            })
        }
        Err(e) => {
            std::fs::copy(input, output)?;
            let reason = e.to_string();
            tracing::warn!("Leaving {} unsigned: {reason}", output.display());
            Ok(SigningOutcome::UnsignedFallback {
                path: output.to_path_buf(),
                reason,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn keystore() -> Keystore {
        Keystore {
            path: PathBuf::from("/keys/release.jks"),
            alias: Some("release".to_string()),
            password: Some("env:KS_PASS".to_string()),
        }
    }

    #[test]
    fn test_apksigner_args() {
        let args = apksigner_args(Path::new("in.apk"), Path::new("out.apk"), &keystore());
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "sign",
                "--ks",
                "/keys/release.jks",
                "--ks-key-alias",
                "release",
                "--ks-pass",
                "env:KS_PASS",
                "--out",
                "out.apk",
                "in.apk"
            ]
        );

        let bare = Keystore {
            path: PathBuf::from("k.jks"),
            alias: None,
            password: None,
        };
        let args: Vec<_> = apksigner_args(Path::new("i"), Path::new("o"), &bare)
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["sign", "--ks", "k.jks", "--out", "o", "i"]);
    }

    #[test]
    fn test_no_keystore_falls_back() {
        let dir = tempdir().unwrap();
        let unsigned = dir.path().join("unsigned.apk");
        fs::write(&unsigned, b"archive").unwrap();
        let output = dir.path().join("out").join("game.apk");

        let signer = ApkSigner::new(Arc::new(ToolchainLocation::empty(Duration::from_secs(1))));
        let outcome = finalize(&signer, &unsigned, &output, None, &NullReporter).unwrap();

        assert!(matches!(
            outcome,
            SigningOutcome::UnsignedFallback { ref reason, .. } if reason == "no keystore configured"
        ));
        assert_eq!(fs::read(&output).unwrap(), b"archive");
    }

    #[test]
    fn test_missing_apksigner_falls_back() {
        let dir = tempdir().unwrap();
        let unsigned = dir.path().join("unsigned.apk");
        fs::write(&unsigned, b"archive").unwrap();
        let output = dir.path().join("game.apk");

        let signer = ApkSigner::new(Arc::new(ToolchainLocation::empty(Duration::from_secs(1))));
        let outcome = finalize(&signer, &unsigned, &output, Some(&keystore()), &NullReporter).unwrap();

        assert!(!outcome.is_signed());
        assert_eq!(outcome.path(), output);
        assert!(matches!(
            outcome,
            SigningOutcome::UnsignedFallback { ref reason, .. } if reason.contains("apksigner")
        ));
    }

    /// Signs by copying, like a tool that never creates directories.
    struct CopySigner;

    impl Signer for CopySigner {
        fn align(&self, _input: &Path, _output: &Path) -> Result<(), SigningError> {
            Err(SigningError::ToolMissing("zipalign".to_string()))
        }

        fn sign(&self, input: &Path, output: &Path, _keystore: &Keystore) -> Result<(), SigningError> {
            fs::copy(input, output)?;
            Ok(())
        }
    }

    #[test]
    fn test_signs_into_missing_output_directory() {
        let dir = tempdir().unwrap();
        let unsigned = dir.path().join("unsigned.apk");
        fs::write(&unsigned, b"archive").unwrap();
        let output = dir.path().join("out").join("nested").join("game.apk");

        let outcome =
            finalize(&CopySigner, &unsigned, &output, Some(&keystore()), &NullReporter).unwrap();

        assert!(outcome.is_signed());
        assert_eq!(outcome.path(), output);
        assert_eq!(fs::read(&output).unwrap(), b"archive");
    }

    #[test]
    fn test_outcome_serializes_with_status() {
        let outcome = SigningOutcome::Signed {
            path: PathBuf::from("game.apk"),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"status":"signed","path":"game.apk"}"#);
    }
}
