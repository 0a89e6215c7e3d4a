//! Shared types for apkjoin.
//!
//! Everything here is plain data: members of a split package set, their
//! roles, the container's optional descriptor and the decoded manifest view.
//! Behaviour lives in `apkjoin-core`.

pub mod container;
/// Decoded manifest view.
pub mod manifest;
/// Member identity and classification types.
pub mod types;

// Re-exports
pub use container::{
    CONTAINER_MANIFEST, ContainerManifest, ContainerManifestError, ExpansionDescriptor,
    SplitDescriptor,
};
pub use manifest::{Component, ComponentKind, ManifestDescriptor};
pub use types::*;

/// Entry name of the binary manifest inside every package member.
pub const ANDROID_MANIFEST: &str = "AndroidManifest.xml";

/// Entry name of the compiled resource table.
pub const RESOURCE_TABLE: &str = "resources.arsc";
