use clap::ValueEnum;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path has no file name: {path}")]
    NoFileName { path: String },
}

/// How catalog entries are keyed.
///
/// The two strategies are not interchangeable: hashing treats renamed copies as
/// the same image, while file names treat identical bytes under different
/// names as distinct images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum KeyStrategy {
    /// Lowercase hex SHA-256 of the file contents
    #[default]
    ContentHash,
    /// Bare file name, without directories
    FileName,
}

impl KeyStrategy {
    pub fn key_for(&self, file_path: &Path) -> Result<String, IdentityError> {
        match self {
            KeyStrategy::ContentHash => {
                let mut reader = BufReader::new(File::open(file_path)?);
                let mut hasher = Sha256::new();
                io::copy(&mut reader, &mut hasher)?;
                Ok(format!("{:x}", hasher.finalize()))
            }
            KeyStrategy::FileName => file_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| IdentityError::NoFileName {
                    path: file_path.to_string_lossy().to_string(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_content_hash_known_value() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, b"Hello, World!").unwrap();

        let hash = KeyStrategy::ContentHash.key_for(&file_path).unwrap();
        assert_eq!(
            hash,
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_identical_files_same_hash_different_names() {
        let temp_dir = TempDir::new().unwrap();
        let file1 = temp_dir.path().join("file1.png");
        let file2 = temp_dir.path().join("file2.png");
        fs::write(&file1, b"Identical content").unwrap();
        fs::write(&file2, b"Identical content").unwrap();

        let by_hash = KeyStrategy::ContentHash;
        assert_eq!(by_hash.key_for(&file1).unwrap(), by_hash.key_for(&file2).unwrap());

        let by_name = KeyStrategy::FileName;
        assert_eq!(by_name.key_for(&file1).unwrap(), "file1.png");
        assert_ne!(by_name.key_for(&file1).unwrap(), by_name.key_for(&file2).unwrap());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = KeyStrategy::ContentHash.key_for(Path::new("/nonexistent/file.png"));
        assert!(matches!(result, Err(IdentityError::Io(_))));
    }
}
