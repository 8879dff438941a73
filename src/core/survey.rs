use crate::core::catalog::{Platform, Resolution, to_pretty_json};
use crate::core::scanner::{ScanError, ScanOptions, discover_files};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyEntry {
    pub name: String,
    pub resolution: Resolution,
    pub tag: Platform,
}

/// Resolution and orientation of every readable image below `dir`.
pub fn survey_directory(dir: &Path) -> Result<Vec<SurveyEntry>, SurveyError> {
    let files = discover_files(dir, &ScanOptions::recursive(&[]))?;

    let mut entries = Vec::new();
    for file in files {
        match image::image_dimensions(&file) {
            Ok((width, height)) => {
                let resolution = Resolution::new(width, height);
                entries.push(SurveyEntry {
                    name: file
                        .file_name()
                        .unwrap_or_default()
                        .to_string_lossy()
                        .into_owned(),
                    resolution,
                    tag: resolution.platform(),
                });
            }
            Err(e) => warn!("Skipping {}: {}", file.display(), e),
        }
    }
    Ok(entries)
}

pub fn write_survey(entries: &[SurveyEntry], output: &Path) -> Result<(), SurveyError> {
    fs::write(output, to_pretty_json(&entries)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_survey_reports_orientation() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("phone")).unwrap();
        fs::create_dir_all(root.join("cache")).unwrap();

        let wide: RgbImage = ImageBuffer::from_pixel(160, 90, Rgb([0, 0, 0]));
        let tall: RgbImage = ImageBuffer::from_pixel(90, 160, Rgb([0, 0, 0]));
        wide.save(root.join("desk.png")).unwrap();
        tall.save(root.join("phone/tall.jpg")).unwrap();
        tall.save(root.join("cache/ignored.png")).unwrap();
        fs::write(root.join("readme.txt"), b"hello").unwrap();

        let entries = survey_directory(root).unwrap();
        assert_eq!(
            entries,
            vec![
                SurveyEntry {
                    name: "desk.png".into(),
                    resolution: Resolution::new(160, 90),
                    tag: Platform::Desktop,
                },
                SurveyEntry {
                    name: "tall.jpg".into(),
                    resolution: Resolution::new(90, 160),
                    tag: Platform::Mobile,
                },
            ]
        );

        let output = root.join("image_analysis.json");
        write_survey(&entries, &output).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(json[1]["resolution"], "90x160");
        assert_eq!(json[1]["tag"], "Mobile");
    }
}
