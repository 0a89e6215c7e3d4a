//! Archive extraction module
//!
//! Containers and package members are both plain ZIP archives.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;

/// Local file header magic (`PK\x03\x04`).
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error in {path}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("Entry '{entry}' in {path} escapes the extraction root")]
    UnsafePath { path: PathBuf, entry: String },
}

impl ExtractError {
    fn archive(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Archive {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Check the first bytes of a file for the ZIP local header magic.
pub fn is_zip(path: &Path) -> bool {
    let mut f = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    let mut magic = [0u8; 4];
    if f.read_exact(&mut magic).is_err() {
        return false;
    }
    magic == ZIP_MAGIC
}

/// Extract a zip archive and return the number of files written.
///
/// Entries whose names would escape `dest_dir` abort the extraction.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<usize, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::archive(archive_path, e))?;

    fs::create_dir_all(dest_dir)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::archive(archive_path, e))?;
        let relative_path = match file.enclosed_name() {
            Some(path) => path.to_owned(),
            None => {
                return Err(ExtractError::UnsafePath {
                    path: archive_path.to_path_buf(),
                    entry: file.name().to_string(),
                });
            }
        };

        if file.is_dir() {
            fs::create_dir_all(dest_dir.join(&relative_path))?;
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;
        drop(outfile);

        // Keep the recorded mode but never lose owner read access, or the
        // merge stage could not copy the file back out.
        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(
                &absolute_path,
                fs::Permissions::from_mode((mode & 0o777) | 0o400),
            )?;
        }

        written += 1;
    }

    Ok(written)
}

/// Entry names of a zip archive, in central-directory order.
pub fn list_entries(archive_path: &Path) -> Result<Vec<String>, ExtractError> {
    let file = File::open(archive_path)?;
    let archive = ZipArchive::new(file).map_err(|e| ExtractError::archive(archive_path, e))?;
    Ok(archive.file_names().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_zip_roundtrip() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("member.apk");
        write_zip(
            &src,
            &[
                ("AndroidManifest.xml", b"manifest"),
                ("lib/arm64-v8a/libgame.so", b"\x7fELF"),
            ],
        );

        let dest = dir.path().join("out");
        assert_eq!(extract_zip(&src, &dest).unwrap(), 2);
        assert_eq!(
            fs::read(dest.join("lib/arm64-v8a/libgame.so")).unwrap(),
            b"\x7fELF"
        );
    }

    #[test]
    fn test_is_zip() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("a.apk");
        write_zip(&zip_path, &[("classes.dex", b"dex\n035")]);
        let text_path = dir.path().join("notes.txt");
        fs::write(&text_path, "hello").unwrap();

        assert!(is_zip(&zip_path));
        assert!(!is_zip(&text_path));
        assert!(!is_zip(&dir.path().join("missing")));
    }

    #[test]
    fn test_list_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.apk");
        write_zip(&path, &[("AndroidManifest.xml", b"m"), ("res/raw/a.txt", b"a")]);

        assert_eq!(
            list_entries(&path).unwrap(),
            vec!["AndroidManifest.xml", "res/raw/a.txt"]
        );
    }

    #[test]
    fn test_extract_rejects_traversal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evil.apk");
        write_zip(&path, &[("../outside.txt", b"x")]);
        let err = extract_zip(&path, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, ExtractError::UnsafePath { .. }));
        assert!(!dir.path().join("outside.txt").exists());
    }

    #[test]
    fn test_extract_rejects_non_zip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bogus.apk");
        fs::write(&path, "not a zip").unwrap();
        let err = extract_zip(&path, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, ExtractError::Archive { .. }));
    }
}
