// Per-image analysis pipeline
// Decoding -> identity check -> tagging -> categories -> color sampling

use crate::core::catalog::{Catalog, ImageRecord, Resolution};
use crate::core::category::CategoryRules;
use crate::core::identity::{IdentityError, KeyStrategy};
use crate::core::palette::ColorClassifier;
use crate::core::tagger::{TagError, Tagger};
use image::{DynamicImage, ImageReader, RgbImage};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Samples per side of the color grid, before rounding the stride.
const COLOR_GRID: u32 = 50;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Tagging failed: {0}")]
    Inference(#[from] TagError),

    #[error("Failed to compute identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal state of one discovered file.
#[derive(Debug)]
pub enum FileOutcome {
    /// Identity already present in the catalog
    Skipped { path: PathBuf, key: String },
    Cataloged {
        path: PathBuf,
        key: String,
        record: ImageRecord,
    },
    Failed { path: PathBuf, error: AnalysisError },
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        match self {
            FileOutcome::Skipped { path, .. }
            | FileOutcome::Cataloged { path, .. }
            | FileOutcome::Failed { path, .. } => path,
        }
    }
}

/// Everything needed to turn an image file into an [`ImageRecord`].
pub struct Analyzer {
    tagger: Arc<dyn Tagger>,
    rules: Option<CategoryRules>,
    colors: ColorClassifier,
    key_strategy: KeyStrategy,
}

impl Analyzer {
    pub fn new(
        tagger: Arc<dyn Tagger>,
        rules: Option<CategoryRules>,
        colors: ColorClassifier,
        key_strategy: KeyStrategy,
    ) -> Self {
        Self {
            tagger,
            rules,
            colors,
            key_strategy,
        }
    }

    /// Run the pipeline for one file, skipping it if `known` already holds its key.
    pub fn analyze_file(&self, path: &Path, known: &Catalog) -> FileOutcome {
        let path_buf = path.to_path_buf();
        match self.try_analyze_file(path, known) {
            Ok((key, None)) => FileOutcome::Skipped { path: path_buf, key },
            Ok((key, Some(record))) => FileOutcome::Cataloged {
                path: path_buf,
                key,
                record,
            },
            Err(error) => FileOutcome::Failed {
                path: path_buf,
                error,
            },
        }
    }

    fn try_analyze_file(
        &self,
        path: &Path,
        known: &Catalog,
    ) -> Result<(String, Option<ImageRecord>), AnalysisError> {
        // Header only; cheap enough to run before the skip check
        ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()?;

        let key = self.key_strategy.key_for(path)?;
        if known.contains(&key) {
            return Ok((key, None));
        }

        let mut reader = ImageReader::open(path)?.with_guessed_format()?;
        reader.no_limits();
        let image = reader.decode()?;

        let record = self.analyze_image(&image)?;
        Ok((key, Some(record)))
    }

    /// Tag, categorize and color-sample an already decoded image.
    pub fn analyze_image(&self, image: &DynamicImage) -> Result<ImageRecord, AnalysisError> {
        let rgb = image.to_rgb8();
        let resolution = Resolution::new(rgb.width(), rgb.height());

        let tags = self.tagger.tags(&rgb)?;
        let categories = self.rules.as_ref().map(|rules| rules.categorize(tags.as_slice()));
        let colors = sample_colors(&rgb, &self.colors);

        Ok(ImageRecord {
            tags,
            categories,
            colors,
            resolution,
            platform: resolution.platform(),
        })
    }
}

/// Classify an evenly spaced grid of pixels and return the distinct color names.
pub fn sample_colors(image: &RgbImage, classifier: &ColorClassifier) -> BTreeSet<String> {
    let (width, height) = image.dimensions();
    let step = (width.min(height) / COLOR_GRID).max(1) as usize;

    let mut colors = BTreeSet::new();
    for x in (0..width).step_by(step) {
        for y in (0..height).step_by(step) {
            colors.insert(classifier.classify(image.get_pixel(x, y).0));
        }
    }
    colors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::palette::ColorMode;
    use image::{ImageBuffer, Rgb};
    use std::fs;
    use tempfile::TempDir;

    struct FixedTagger(Vec<&'static str>);

    impl Tagger for FixedTagger {
        fn tags(&self, _image: &RgbImage) -> Result<Vec<String>, TagError> {
            Ok(self.0.iter().map(|t| t.to_string()).collect())
        }
    }

    struct FailingTagger;

    impl Tagger for FailingTagger {
        fn tags(&self, _image: &RgbImage) -> Result<Vec<String>, TagError> {
            Err(TagError::Other("model crashed".to_string()))
        }
    }

    fn analyzer(tagger: Arc<dyn Tagger>) -> Analyzer {
        Analyzer::new(
            tagger,
            Some(CategoryRules::default()),
            ColorClassifier::default(),
            KeyStrategy::ContentHash,
        )
    }

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
        ImageBuffer::from_pixel(width, height, Rgb(rgb))
    }

    #[test]
    fn test_solid_palette_color_samples_to_single_name() {
        let named = ColorClassifier::for_mode(ColorMode::Named);
        for (w, h) in [(2, 2), (3, 7), (300, 600), (1001, 64)] {
            let colors = sample_colors(&solid(w, h, [255, 215, 0]), &named);
            assert_eq!(colors.into_iter().collect::<Vec<_>>(), vec!["gold"]);
        }
    }

    #[test]
    fn test_sampling_sees_both_halves() {
        let img = ImageBuffer::from_fn(200, 100, |x, _| {
            if x < 100 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        });
        let colors = sample_colors(&img, &ColorClassifier::default());
        assert_eq!(colors.into_iter().collect::<Vec<_>>(), vec!["black", "white"]);
    }

    #[test]
    fn test_analyze_image_builds_record() {
        let analyzer = analyzer(Arc::new(FixedTagger(vec!["Race car", "tabby cat"])));
        let image = DynamicImage::ImageRgb8(solid(300, 600, [255, 0, 0]));

        let record = analyzer.analyze_image(&image).unwrap();
        assert_eq!(record.tags, vec!["Race car", "tabby cat"]);
        assert_eq!(
            record.categories.unwrap().into_iter().collect::<Vec<_>>(),
            vec!["Sports & Recreation", "Vehicles"]
        );
        assert!(record.colors.contains("red"));
        assert_eq!(record.resolution.to_string(), "300x600");
        assert_eq!(record.platform.to_string(), "Mobile");
    }

    #[test]
    fn test_known_key_is_skipped_without_tagging() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("red.png");
        solid(10, 10, [255, 0, 0]).save(&path).unwrap();

        let mut known = Catalog::new();
        let first = analyzer(Arc::new(FixedTagger(vec!["alp"]))).analyze_file(&path, &known);
        let (key, record) = match first {
            FileOutcome::Cataloged { key, record, .. } => (key, record),
            other => panic!("expected cataloged, got {:?}", other),
        };
        known.insert(key.clone(), record);

        // A failing tagger proves the second pass never reaches inference
        let second = analyzer(Arc::new(FailingTagger)).analyze_file(&path, &known);
        assert!(matches!(second, FileOutcome::Skipped { key: k, .. } if k == key));
    }

    #[test]
    fn test_corrupt_file_fails_with_decode_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.png");
        solid(64, 64, [0, 0, 255]).save(&path).unwrap();
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let outcome = analyzer(Arc::new(FixedTagger(vec!["alp"]))).analyze_file(&path, &Catalog::new());
        assert!(matches!(
            outcome,
            FileOutcome::Failed { error: AnalysisError::Decode(_), .. }
        ));
    }

    #[test]
    fn test_inference_failure_is_isolated_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ok.png");
        solid(8, 8, [0, 128, 0]).save(&path).unwrap();

        let outcome = analyzer(Arc::new(FailingTagger)).analyze_file(&path, &Catalog::new());
        assert!(matches!(
            outcome,
            FileOutcome::Failed { error: AnalysisError::Inference(_), .. }
        ));
    }
}
