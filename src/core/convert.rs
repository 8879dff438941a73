use crate::core::scanner::{ScanError, ScanOptions, discover_files};
use image::ImageFormat;
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConvertReport {
    pub converted: usize,
    pub failed: usize,
}

fn png_path(output_dir: &Path, file: &Path) -> PathBuf {
    let mut name = file.file_stem().unwrap_or_default().to_os_string();
    name.push(".png");
    output_dir.join(name)
}

fn convert_file(file: &Path, target: &Path) -> Result<(), image::ImageError> {
    let img = image::open(file)?;
    img.save_with_format(target, ImageFormat::Png)
}

/// Convert the top-level `.jpg`/`.jpeg` files of `input_dir` to PNG in `output_dir`.
pub fn convert_jpegs(input_dir: &Path, output_dir: &Path) -> Result<ConvertReport, ConvertError> {
    fs::create_dir_all(output_dir)?;
    let files = discover_files(input_dir, &ScanOptions::flat(&["jpg", "jpeg"]))?;

    let mut report = ConvertReport::default();
    for file in files {
        let target = png_path(output_dir, &file);
        match convert_file(&file, &target) {
            Ok(()) => {
                info!("Converted {} to {}", file.display(), target.display());
                report.converted += 1;
            }
            Err(e) => {
                error!("Error converting {}: {}", file.display(), e);
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_converts_jpegs_only() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path();
        let output = input.join("png");

        let img: RgbImage = ImageBuffer::from_pixel(16, 9, Rgb([10, 20, 30]));
        img.save(input.join("sunset.jpg")).unwrap();
        img.save(input.join("forest.JPEG")).unwrap();
        img.save(input.join("already.png")).unwrap();
        fs::write(input.join("fake.jpg"), b"not a jpeg").unwrap();

        let report = convert_jpegs(input, &output).unwrap();
        assert_eq!(report, ConvertReport { converted: 2, failed: 1 });

        let converted = image::open(output.join("sunset.png")).unwrap();
        assert_eq!((converted.width(), converted.height()), (16, 9));
        assert!(output.join("forest.png").exists());
        assert!(!output.join("already.png").exists());
        assert!(!output.join("fake.png").exists());
    }
}
