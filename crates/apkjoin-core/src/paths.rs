use dirs::home_dir;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static CLASS_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^classes(\d*)\.dex$").expect("valid class index regex"));

/// Returns the apkjoin home directory, or None if the user's home cannot be resolved.
///
/// `APKJOIN_HOME` overrides the default `~/.apkjoin`.
pub fn try_apkjoin_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("APKJOIN_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".apkjoin"))
}

/// User configuration file: ~/.apkjoin/config.toml
pub fn config_path() -> Option<PathBuf> {
    try_apkjoin_home().map(|h| h.join("config.toml"))
}

/// Default output location for a merge: `<dir>/<stem>.merged.apk` next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "output".into(), |s| s.to_string_lossy().into_owned());
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{stem}.merged.apk"))
}

/// Convert a relative filesystem path to a forward-slash archive entry name.
pub fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Position of a top-level class-index entry: `classes.dex` is 1 and
/// `classesN.dex` is N.
///
/// Only these names are loaded by the runtime. Anything else, such as
/// `classes-feature.dex` or a nested `classes.dex`, is an ordinary file.
pub fn class_index(entry: &str) -> Option<u32> {
    let caps = CLASS_INDEX.captures(entry)?;
    match &caps[1] {
        "" => Some(1),
        digits => digits.parse().ok(),
    }
}

/// Entry name for class-index position `index`.
pub fn class_index_name(index: u32) -> String {
    if index <= 1 {
        "classes.dex".to_string()
    } else {
        format!("classes{index}.dex")
    }
}
