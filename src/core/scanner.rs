use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },
}

/// Which files a batch job picks up.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Walk subdirectories instead of listing only the top level
    pub recursive: bool,
    /// Accepted extensions, lowercase and without the dot; empty accepts every file
    pub extensions: Vec<String>,
    /// Directory names pruned from recursive walks
    pub exclude_dirs: Vec<String>,
}

impl ScanOptions {
    pub fn flat(extensions: &[&str]) -> Self {
        Self {
            recursive: false,
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_dirs: vec!["cache".to_string()],
        }
    }

    pub fn recursive(extensions: &[&str]) -> Self {
        Self {
            recursive: true,
            ..Self::flat(extensions)
        }
    }

    pub fn matches_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| self.exclude_dirs.iter().any(|d| d == name))
                .unwrap_or(false)
    }
}

/// Walk `dir` and return matching image files, sorted by path.
pub fn discover_files(dir: &Path, options: &ScanOptions) -> Result<Vec<PathBuf>, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::InvalidPath {
            path: dir.to_string_lossy().to_string(),
        });
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Scanning for images…");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let mut images = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !options.is_excluded(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        // Symlinked files count when their target is a regular file
        let path = entry.path();
        let is_file = entry.file_type().is_file() || (entry.path_is_symlink() && path.is_file());
        if is_file && options.matches_extension(path) {
            images.push(path.to_path_buf());
        }
        spinner.tick();
    }
    spinner.finish_and_clear();

    images.sort();
    Ok(images)
}
