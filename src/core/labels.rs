use log::info;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_LABELS_URL: &str = "https://raw.githubusercontent.com/anishathalye/imagenet-simple-labels/master/imagenet-simple-labels.json";

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Label file is not a JSON array of strings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to download labels: {0}")]
    Download(#[from] reqwest::Error),

    #[error("Label set is empty")]
    Empty,
}

/// Class names of the classification model, indexed by output class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Result<Self, LabelError> {
        if labels.is_empty() {
            return Err(LabelError::Empty);
        }
        Ok(Self { labels })
    }

    pub fn from_json(content: &str) -> Result<Self, LabelError> {
        Self::new(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, LabelError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Load the cached label file, downloading it from `url` first if it is missing.
    pub fn load_or_fetch(path: &Path, url: &str) -> Result<Self, LabelError> {
        if !path.exists() {
            info!("Downloading labels from {} to {}", url, path.display());
            let body = reqwest::blocking::get(url)?.error_for_status()?.text()?;

            // Validate before caching so a bad response is not reused next run
            Self::from_json(&body)?;

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, body)?;
        }
        Self::load(path)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
