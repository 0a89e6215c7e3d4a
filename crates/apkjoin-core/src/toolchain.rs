//! Android build-tools discovery and invocation.
//!
//! The tool paths are resolved once, up front, into an immutable
//! [`ToolchainLocation`] that is handed to whichever adapter needs it.
//! Every tool is optional: a missing one degrades the stage that wanted it
//! rather than failing the run.
//!
//! Resolution order for each tool:
//!
//! 1. An explicit build-tools directory (`--build-tools`, `APKJOIN_BUILD_TOOLS`
//!    or `[toolchain] build_tools`).
//! 2. The highest `build-tools/<version>` under `ANDROID_HOME` or
//!    `ANDROID_SDK_ROOT`.
//! 3. `PATH`.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use wait_timeout::ChildExt;

use crate::config::DEFAULT_TOOL_TIMEOUT_SECS;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("'{0}' not found. Install the Android SDK build-tools or pass --build-tools")]
    NotFound(String),

    #[error("Failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("{tool} exited with status {code:?}: {stderr}")]
    Failed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} does not support '{operation}'")]
    Unsupported { tool: String, operation: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which flavour of the asset packaging tool was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AaptFlavor {
    /// Legacy `aapt`: supports `dump badging`, `dump xmltree`, `list`.
    Aapt,
    /// `aapt2`: no `list`, and `dump xmltree` takes `--file`.
    Aapt2,
}

/// Resolved paths of the external tools, fixed for the whole run.
#[derive(Debug, Clone)]
pub struct ToolchainLocation {
    aapt: Option<(PathBuf, AaptFlavor)>,
    zipalign: Option<PathBuf>,
    apksigner: Option<PathBuf>,
    timeout: Duration,
}

impl Default for ToolchainLocation {
    fn default() -> Self {
        Self::empty(Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS))
    }
}

impl ToolchainLocation {
    /// A location with no tools at all. Every toolchain-backed stage falls back.
    pub fn empty(timeout: Duration) -> Self {
        Self {
            aapt: None,
            zipalign: None,
            apksigner: None,
            timeout,
        }
    }

    /// Discover the tools. See the [module-level documentation](self) for the order.
    pub fn resolve(explicit: Option<&Path>, timeout: Duration) -> Self {
        let mut dirs: Vec<PathBuf> = Vec::new();
        if let Some(dir) = explicit {
            dirs.push(dir.to_path_buf());
        }
        for var in ["ANDROID_HOME", "ANDROID_SDK_ROOT"] {
            if let Some(sdk) = std::env::var_os(var) {
                if let Some(dir) = latest_build_tools(Path::new(&sdk)) {
                    dirs.push(dir);
                }
            }
        }

        let find = |name: &str| -> Option<PathBuf> {
            dirs.iter()
                .flat_map(|d| candidates(d, name))
                .find(|p| p.is_file())
                .or_else(|| which::which(name).ok())
        };

        let aapt = find("aapt")
            .map(|p| (p, AaptFlavor::Aapt))
            .or_else(|| find("aapt2").map(|p| (p, AaptFlavor::Aapt2)));

        let location = Self {
            aapt,
            zipalign: find("zipalign"),
            apksigner: find("apksigner"),
            timeout,
        };
        tracing::debug!(?location, "Resolved toolchain");
        location
    }

    /// Path and flavour of the packaging tool, if found.
    pub fn aapt(&self) -> Option<(&Path, AaptFlavor)> {
        self.aapt.as_ref().map(|(p, f)| (p.as_path(), *f))
    }

    /// Path of `zipalign`, if found.
    pub fn zipalign(&self) -> Option<&Path> {
        self.zipalign.as_deref()
    }

    /// Path of `apksigner`, if found.
    pub fn apksigner(&self) -> Option<&Path> {
        self.apksigner.as_deref()
    }

    /// Per-invocation timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a tool to completion and return its standard output.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Timeout`] if the tool outlives the configured
    /// timeout (it is killed), [`ToolError::Failed`] on a non-zero exit, and
    /// [`ToolError::NotFound`] / [`ToolError::Spawn`] if it cannot start.
    pub fn run(&self, program: &Path, args: &[OsString]) -> Result<String, ToolError> {
        run_with_timeout(program, args, self.timeout)
    }
}

fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    let mut paths = vec![dir.join(name)];
    if cfg!(windows) {
        paths.push(dir.join(format!("{name}.exe")));
        paths.push(dir.join(format!("{name}.bat")));
    }
    paths
}

/// Pick the numerically highest `build-tools/<version>` directory of an SDK.
pub fn latest_build_tools(sdk: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(sdk.join("build-tools")).ok()?;
    entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let key: Option<Vec<u64>> = name.split(['.', '-']).map(|p| p.parse().ok()).collect();
            key.map(|k| (k, e.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
}

fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .map_or_else(|| program.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn run_with_timeout(
    program: &Path,
    args: &[OsString],
    timeout: Duration,
) -> Result<String, ToolError> {
    let tool = tool_name(program);
    tracing::debug!("Running {} {:?}", program.display(), args);

    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ToolError::NotFound(tool));
        }
        Err(e) => return Err(ToolError::Spawn { tool, source: e }),
    };

    // Drain both pipes on their own threads so a chatty tool cannot block
    // on a full pipe while we wait on it.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let Some(status) = child.wait_timeout(timeout)? else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(ToolError::Timeout {
            tool,
            secs: timeout.as_secs(),
        });
    };

    let stdout = collect(stdout);
    let stderr = collect(stderr);

    if !status.success() {
        return Err(ToolError::Failed {
            tool,
            code: status.code(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<std::thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
