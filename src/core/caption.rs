use crate::core::scanner::{ScanError, ScanOptions, discover_files};
use crate::core::tagger::{TagError, Tagger};
use image::RgbImage;
use indicatif::ProgressBar;
use log::{error, info, warn};
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use thiserror::Error;

/// Name used when a caption is too short to be meaningful.
pub const UNTITLED: &str = "Untitled Image";

static FILLER_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(photo|picture|image|of|a|an|the)\b").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\s]").unwrap());

#[derive(Debug, Error)]
pub enum RenameError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Captioning failed: {0}")]
    Caption(#[from] TagError),

    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Describes an image in a short phrase.
pub trait Captioner: Send + Sync {
    fn caption(&self, image: &RgbImage) -> Result<String, TagError>;
}

/// Builds captions from the two most confident classifier labels.
pub struct TagCaptioner {
    tagger: Arc<dyn Tagger>,
}

impl TagCaptioner {
    pub fn new(tagger: Arc<dyn Tagger>) -> Self {
        Self { tagger }
    }
}

impl Captioner for TagCaptioner {
    fn caption(&self, image: &RgbImage) -> Result<String, TagError> {
        let tags = self.tagger.tags(image)?;
        Ok(tags.iter().take(2).cloned().collect::<Vec<_>>().join(" and "))
    }
}

// Uppercase the first letter of every alphabetic run, lowercase the rest.
fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            result.push(c);
            in_word = false;
        }
    }
    result
}

/// Turn a caption into a human-friendly file stem.
pub fn format_caption(caption: &str) -> String {
    let caption = FILLER_WORDS.replace_all(caption, "");
    let caption = WHITESPACE.replace_all(caption.trim(), " ");
    let caption = NON_ALPHANUMERIC.replace_all(&caption, "");
    let caption = title_case(&caption);

    if caption.chars().count() < 5 {
        return UNTITLED.to_string();
    }
    caption
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenameReport {
    pub renamed: usize,
    pub unchanged: usize,
    pub conflicts: usize,
    pub failed: usize,
}

fn plan_for(file: &Path, captioner: &dyn Captioner) -> Result<RenamePlan, RenameError> {
    let image = image::open(file)?.to_rgb8();
    let caption = captioner.caption(&image)?;
    let new_name = format!("{}.png", format_caption(&caption));
    Ok(RenamePlan {
        from: file.to_path_buf(),
        to: file.with_file_name(new_name),
    })
}

/// Caption every top-level `.png` in `dir` on a pool of `workers` threads.
///
/// Files that cannot be captioned are logged and counted in the returned report.
pub fn plan_renames(
    dir: &Path,
    captioner: &dyn Captioner,
    workers: usize,
) -> Result<(Vec<RenamePlan>, RenameReport), RenameError> {
    let files = discover_files(dir, &ScanOptions::flat(&["png"]))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?;

    let progress = ProgressBar::new(files.len() as u64);
    let results: Vec<(PathBuf, Result<RenamePlan, RenameError>)> = pool.install(|| {
        files
            .par_iter()
            .map(|file| {
                let plan = plan_for(file, captioner);
                progress.inc(1);
                (file.clone(), plan)
            })
            .collect()
    });
    progress.finish_and_clear();

    let mut plans = Vec::new();
    let mut report = RenameReport::default();
    for (file, result) in results {
        match result {
            Ok(plan) if plan.from == plan.to => report.unchanged += 1,
            Ok(plan) => plans.push(plan),
            Err(e) => {
                error!("Error captioning {}: {}", file.display(), e);
                report.failed += 1;
            }
        }
    }
    Ok((plans, report))
}

/// Apply planned renames in order. Existing files are never overwritten.
pub fn apply_renames(plans: &[RenamePlan], dry_run: bool, mut report: RenameReport) -> RenameReport {
    let mut claimed: HashSet<&Path> = HashSet::new();

    for plan in plans {
        let from_name = plan.from.file_name().unwrap_or_default().to_string_lossy();
        let to_name = plan.to.file_name().unwrap_or_default().to_string_lossy();

        if plan.to.exists() || !claimed.insert(plan.to.as_path()) {
            warn!("Not renaming {}: {} already exists", from_name, to_name);
            report.conflicts += 1;
            continue;
        }

        if dry_run {
            info!("[dry-run] Rename: {} -> {}", from_name, to_name);
            report.renamed += 1;
            continue;
        }

        match fs::rename(&plan.from, &plan.to) {
            Ok(()) => {
                info!("Renamed: {} -> {}", from_name, to_name);
                report.renamed += 1;
            }
            Err(e) => {
                error!("Failed to rename {}: {}", from_name, e);
                report.failed += 1;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    struct FixedCaptioner(&'static str);

    impl Captioner for FixedCaptioner {
        fn caption(&self, _image: &RgbImage) -> Result<String, TagError> {
            Ok(self.0.to_string())
        }
    }

    struct FixedTagger;

    impl Tagger for FixedTagger {
        fn tags(&self, _image: &RgbImage) -> Result<Vec<String>, TagError> {
            Ok(vec!["lakeshore".into(), "boathouse".into(), "dock".into()])
        }
    }

    fn create_test_image(path: &Path) {
        let img: RgbImage = ImageBuffer::from_pixel(8, 8, Rgb([1, 2, 3]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_format_caption_removes_filler_words() {
        assert_eq!(
            format_caption("a photo of a dog on the beach"),
            "Dog On Beach"
        );
        assert_eq!(
            format_caption("there is an old car in the garage"),
            "There Is Old Car In Garage"
        );
    }

    #[test]
    fn test_format_caption_strips_punctuation_and_titles() {
        assert_eq!(format_caption("sunset, over  MOUNTAINS!"), "Sunset Over Mountains");
        assert_eq!(format_caption("3d render of city"), "3D Render City");
    }

    #[test]
    fn test_format_caption_short_results_are_untitled() {
        assert_eq!(format_caption("a photo of the"), UNTITLED);
        assert_eq!(format_caption("cat"), UNTITLED);
        assert_eq!(format_caption(""), UNTITLED);
    }

    #[test]
    fn test_tag_captioner_joins_top_labels() {
        let captioner = TagCaptioner::new(Arc::new(FixedTagger));
        let image: RgbImage = ImageBuffer::new(4, 4);
        assert_eq!(captioner.caption(&image).unwrap(), "lakeshore and boathouse");
    }

    #[test]
    fn test_rename_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        create_test_image(&dir.join("IMG_0001.png"));
        create_test_image(&dir.join("IMG_0002.png"));
        create_test_image(&dir.join("Mountain Lake View.png"));
        fs::write(dir.join("broken.png"), b"nope").unwrap();

        let captioner = FixedCaptioner("a picture of mountain lake view");
        let (plans, report) = plan_renames(dir, &captioner, 2).unwrap();
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(plans.len(), 2);

        let report = apply_renames(&plans, false, report);
        assert_eq!(report.renamed, 0);
        assert_eq!(report.conflicts, 2);
        assert!(dir.join("IMG_0001.png").exists());

        fs::remove_file(dir.join("Mountain Lake View.png")).unwrap();
        let report = apply_renames(&plans, false, RenameReport::default());
        assert_eq!(report.renamed, 1);
        assert_eq!(report.conflicts, 1);
        assert!(dir.join("Mountain Lake View.png").exists());
        assert!(!dir.join("IMG_0001.png").exists());
        assert!(dir.join("IMG_0002.png").exists());
    }

    #[test]
    fn test_dry_run_leaves_files_alone() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        create_test_image(&dir.join("IMG_0001.png"));

        let captioner = FixedCaptioner("a red sports car");
        let (plans, report) = plan_renames(dir, &captioner, 1).unwrap();
        assert_eq!(plans[0].to, dir.join("Red Sports Car.png"));

        let report = apply_renames(&plans, true, report);
        assert_eq!(report.renamed, 1);
        assert!(dir.join("IMG_0001.png").exists());
        assert!(!dir.join("Red Sports Car.png").exists());
    }
}
