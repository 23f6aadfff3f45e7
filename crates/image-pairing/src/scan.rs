//! Flat directory scanning by format token

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PairingError, Result};

/// Format token used when none is given
pub const DEFAULT_FORMAT: &str = "JPG";

/// How a file name is tested against a format token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Token anywhere in the file name (`DJI_0001.JPG`, but also `JPG_notes.txt`)
    #[default]
    Substring,
    /// Token equals the file extension
    Extension,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    pub match_mode: MatchMode,
    pub ignore_case: bool,
}

impl ScanOptions {
    /// Check whether a file name carries the given format token
    pub fn matches(&self, file_name: &str, token: &str) -> bool {
        let fold = |s: &str| if self.ignore_case { s.to_lowercase() } else { s.to_string() };
        let token = fold(token);

        match self.match_mode {
            MatchMode::Substring => fold(file_name).contains(&token),
            MatchMode::Extension => Path::new(file_name)
                .extension()
                .map(|ext| fold(&ext.to_string_lossy()) == token)
                .unwrap_or(false),
        }
    }
}

/// List regular files directly inside `dir` whose name carries `token`,
/// sorted lexicographically. Symlinks to files count as files.
pub fn scan_directory(dir: &Path, token: &str, options: &ScanOptions) -> Result<Vec<PathBuf>> {
    let io_error = |source| PairingError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if options.matches(&entry.file_name().to_string_lossy(), token) {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

/// [`scan_directory`] with substring matching
pub fn list_images(dir: &Path, token: &str) -> Result<Vec<PathBuf>> {
    scan_directory(dir, token, &ScanOptions::default())
}

/// File name without its extension
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
