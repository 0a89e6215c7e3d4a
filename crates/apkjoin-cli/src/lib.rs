//! apkjoin - merge split Android packages
//!
//! Reassembles a split application (a base package plus density, ABI and
//! locale splits shipped together as `.xapk`, `.apks` or `.apkm`) into one
//! installable package.
//!
//! # Pipeline
//!
//! ```text
//! container ─► classify (parallel) ─► validate ─► extract ─► merge ─► repackage ─► sign
//! ```
//!
//! # Directory Layout
//!
//! ```text
//! ~/.apkjoin/
//! └── config.toml   # optional defaults for toolchain, signing and merge
//! ```

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub mod cmd;
pub mod ui;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface.
#[derive(Debug, Parser)]
#[command(name = "apkjoin")]
#[command(author, version = env!("APKJOIN_VERSION"), about = "apkjoin - merge split Android packages into one APK")]
pub struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.apkjoin/config.toml)
    #[arg(long, global = true, env = "APKJOIN_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Android build-tools directory holding aapt, zipalign and apksigner
    #[arg(long, global = true, env = "APKJOIN_BUILD_TOOLS", value_name = "DIR")]
    pub build_tools: Option<PathBuf>,

    /// Concurrent classification jobs (default: logical CPUs)
    #[arg(short, long, global = true, env = "APKJOIN_JOBS", value_name = "N")]
    pub jobs: Option<usize>,

    /// Parent directory for the temporary work area
    #[arg(long, global = true, env = "APKJOIN_TMPDIR", value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Merge a split container into a single APK
    Merge {
        /// Container archive (.xapk, .apks, .apkm) or directory of APKs
        input: PathBuf,
        /// Output APK (default: <input>.merged.apk next to the input)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Keystore to sign the result with
        #[arg(long, env = "APKJOIN_KEYSTORE", value_name = "FILE")]
        keystore: Option<PathBuf>,
        /// Key alias inside the keystore
        #[arg(long, value_name = "ALIAS")]
        ks_key_alias: Option<String>,
        /// Keystore password, passed to apksigner verbatim (pass:..., env:..., file:...)
        #[arg(long, env = "APKJOIN_KS_PASS", hide_env_values = true, value_name = "SPEC")]
        ks_pass: Option<String>,
        /// Drop v1 signature files inherited from the base APK
        #[arg(long)]
        strip_signatures: bool,
        /// Print the merge summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Classify and validate a container without merging
    Inspect {
        /// Container archive or directory of APKs
        input: PathBuf,
        /// Print the inspection as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
