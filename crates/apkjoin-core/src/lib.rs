pub mod aapt;
pub mod badging;
pub mod classify;
pub mod config;
pub mod error;
pub mod io;
pub mod members;
pub mod merge;
pub mod paths;
pub mod pipeline;
pub mod repackage;
pub mod signing;
pub mod toolchain;
pub mod validate;
pub mod xmltree;

pub mod reporter;

pub use config::Config;
pub use error::MergeError;
pub use members::MemberSet;
pub use paths::*;
pub use pipeline::{Inspection, MergeRequest, MergeSummary, Pipeline};
pub use reporter::{NullReporter, Reporter};
pub use signing::{Keystore, SigningOutcome};
pub use toolchain::ToolchainLocation;
