//! Archive repackaging.
//!
//! Serializes a merge root into one package archive. Traversal is sorted by
//! file name and every entry carries the same fixed timestamp, so equal trees
//! produce equal archives.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use apkjoin_schema::{ANDROID_MANIFEST, RESOURCE_TABLE};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::paths::{class_index, entry_name};

/// Alignment of uncompressed entries in general.
const DEFAULT_ALIGNMENT: u16 = 4;
/// Alignment of native libraries, so they can be mapped in place.
const PAGE_ALIGNMENT: u16 = 4096;

#[derive(Error, Debug)]
pub enum RepackageError {
    #[error("Cannot create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot write entry {entry}: {message}")]
    Write { entry: String, message: String },

    #[error("Cannot finish archive {path}: {message}")]
    Finish { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RepackageOptions {
    /// Leave out v1 signature files inherited from the base member.
    pub strip_signatures: bool,
}

/// The archive written by [`repackage`].
#[derive(Debug, Clone)]
pub struct Repackaged {
    pub path: PathBuf,
    /// Entry names, in archive order.
    pub entries: Vec<String>,
}

impl Repackaged {
    /// Why the archive is not an installable package, if it is not.
    pub fn structural_problem(&self) -> Option<String> {
        if !self.entries.iter().any(|e| e == ANDROID_MANIFEST) {
            return Some(format!("no {ANDROID_MANIFEST}"));
        }
        if !self.entries.iter().any(|e| class_index(e).is_some()) {
            return Some("no classes*.dex".to_string());
        }
        None
    }
}

/// Stale v1 signature material: `META-INF/MANIFEST.MF` and the signature
/// block files next to it.
pub fn is_signature_file(entry: &str) -> bool {
    let Some(name) = entry.strip_prefix("META-INF/") else {
        return false;
    };
    if name.contains('/') {
        return false;
    }
    if name == "MANIFEST.MF" {
        return true;
    }
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        ["SF", "RSA", "DSA", "EC"]
            .iter()
            .any(|sig| ext.eq_ignore_ascii_case(sig))
    })
}

/// Compression and alignment for one entry.
fn entry_options(entry: &str) -> SimpleFileOptions {
    let base = SimpleFileOptions::default().last_modified_time(zip::DateTime::default());
    if entry == RESOURCE_TABLE {
        base.compression_method(CompressionMethod::Stored)
            .with_alignment(DEFAULT_ALIGNMENT)
    } else if entry.starts_with("lib/") && entry.ends_with(".so") {
        base.compression_method(CompressionMethod::Stored)
            .with_alignment(PAGE_ALIGNMENT)
    } else {
        base.compression_method(CompressionMethod::Deflated)
    }
}

/// Write every file under `root` into a new archive at `output`.
///
/// # Errors
///
/// Returns [`RepackageError::Create`] if `output` cannot be created, and
/// [`RepackageError::Write`] / [`RepackageError::Finish`] if the archive
/// cannot be written.
pub fn repackage(
    root: &Path,
    output: &Path,
    options: RepackageOptions,
) -> Result<Repackaged, RepackageError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| RepackageError::Create {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = File::create(output).map_err(|source| RepackageError::Create {
        path: output.to_path_buf(),
        source,
    })?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let mut entries = Vec::new();

    for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .strip_prefix(root)
            .map(entry_name)
            .unwrap_or_default();
        if options.strip_signatures && is_signature_file(&name) {
            tracing::debug!("Dropping stale signature file {name}");
            continue;
        }

        zip.start_file(name.as_str(), entry_options(&name))
            .map_err(|e| RepackageError::Write {
                entry: name.clone(),
                message: e.to_string(),
            })?;
        let mut source = File::open(entry.path())?;
        io::copy(&mut source, &mut zip).map_err(|e| RepackageError::Write {
            entry: name.clone(),
            message: e.to_string(),
        })?;
        entries.push(name);
    }

    let writer = zip.finish().map_err(|e| RepackageError::Finish {
        path: output.to_path_buf(),
        message: e.to_string(),
    })?;
    writer.into_inner().map_err(|e| RepackageError::Finish {
        path: output.to_path_buf(),
        message: e.to_string(),
    })?;

    tracing::info!("Wrote {} entries to {}", entries.len(), output.display());
    Ok(Repackaged {
        path: output.to_path_buf(),
        entries,
    })
}
