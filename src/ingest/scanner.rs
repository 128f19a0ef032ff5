use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::media::mimetype;

/// Directory listings with more media files than this only sample the
/// first, middle and last file.
const MAX_SAMPLED_FILES: usize = 3;

/// Media files to take screenshots from, for a file or a directory input.
pub fn resolve_media_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "{:?} is neither a file nor a directory",
            input
        )));
    }

    let files = scan_media_files(input)?;
    if files.is_empty() {
        return Err(Error::EmptyPool(format!("directory {:?} has no media files", input)));
    }
    info!(
        "found {} media file{}",
        files.len(),
        if files.len() == 1 { "" } else { "s" }
    );
    Ok(sample_media_files(files))
}

pub fn scan_media_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if is_hidden(&entry) {
            continue;
        }
        if entry.file_type().is_file() && mimetype::is_video(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Keeps the first, middle and last entries of long listings.
pub fn sample_media_files(files: Vec<PathBuf>) -> Vec<PathBuf> {
    let n = files.len();
    if n <= MAX_SAMPLED_FILES {
        return files;
    }
    files
        .into_iter()
        .enumerate()
        .filter(|(i, _)| *i == 0 || *i == n / 2 || *i == n - 1)
        .map(|(_, path)| path)
        .collect()
}

/// Captured screenshots in `dir`, ordered by their index.
pub fn scan_candidates(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(index) = entry.file_name().to_str().and_then(candidate_index) {
            found.push((index, entry.path().to_path_buf()));
        }
    }

    found.sort();
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

/// Parses `pre_<NNN>.png`, requiring at least three digits.
pub fn candidate_index(name: &str) -> Option<usize> {
    let digits = name.strip_prefix("pre_")?.strip_suffix(".png")?;
    if digits.len() < 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}
