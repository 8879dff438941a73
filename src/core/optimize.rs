use crate::core::scanner::{ScanError, ScanOptions, discover_files};
use clap::ValueEnum;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageReader, RgbImage};
use indicatif::ProgressBar;
use log::{error, info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Largest width or height libwebp accepts.
pub const WEBP_MAX_DIMENSION: u32 = 16383;

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Encoding at quality {quality} failed: {message}")]
    Encode { quality: u8, message: String },

    #[error("Gave up after {attempts} attempt(s), last quality {quality}")]
    Exhausted { attempts: usize, quality: u8 },

    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Webp,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn default_quality(&self) -> u8 {
        match self {
            OutputFormat::Webp => 40,
            OutputFormat::Jpeg => 25,
        }
    }

    /// WebP batches read the top-level `.png` files; JPEG batches walk every image below.
    pub fn default_scan(&self) -> ScanOptions {
        match self {
            OutputFormat::Webp => ScanOptions::flat(&["png"]),
            OutputFormat::Jpeg => {
                ScanOptions::recursive(&["png", "jpg", "jpeg", "bmp", "gif", "tiff", "tif", "webp"])
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    pub format: OutputFormat,
    pub scan: ScanOptions,
    pub quality: u8,
    pub min_quality: u8,
    pub quality_step: u8,
    pub max_attempts: usize,
    pub workers: usize,
}

impl OptimizeOptions {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            scan: format.default_scan(),
            quality: format.default_quality(),
            min_quality: 10,
            quality_step: 10,
            max_attempts: 8,
            workers: 8,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OptimizeReport {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum FileResult {
    Written(PathBuf),
    Skipped(PathBuf),
}

/// Qualities to try: `start`, then lower by `step` until `floor` has been tried.
pub fn quality_steps(start: u8, floor: u8, step: u8) -> Vec<u8> {
    let floor = floor.min(start);
    let mut steps = vec![start];
    let mut quality = start;
    while quality > floor && step > 0 {
        quality = quality.saturating_sub(step).max(floor);
        steps.push(quality);
    }
    steps
}

/// Run `encode` over the quality schedule until it succeeds or attempts run out.
pub fn encode_with_retry<F>(
    label: &str,
    options: &OptimizeOptions,
    mut encode: F,
) -> Result<Vec<u8>, OptimizeError>
where
    F: FnMut(u8) -> Result<Vec<u8>, OptimizeError>,
{
    let schedule = quality_steps(options.quality, options.min_quality, options.quality_step);
    let mut attempts = 0;
    let mut last_quality = options.quality;

    for quality in schedule.into_iter().take(options.max_attempts.max(1)) {
        if attempts > 0 {
            warn!("Retrying {} with reduced quality: {}", label, quality);
        }
        attempts += 1;
        last_quality = quality;

        match encode(quality) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => warn!("{}: {}", label, e),
        }
    }

    Err(OptimizeError::Exhausted {
        attempts,
        quality: last_quality,
    })
}

/// Shrink images that exceed the WebP dimension limit, keeping the aspect ratio.
pub fn fit_webp_limits(image: RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    if width <= WEBP_MAX_DIMENSION && height <= WEBP_MAX_DIMENSION {
        return image;
    }

    let scale = WEBP_MAX_DIMENSION as f64 / width.max(height) as f64;
    let new_width = ((width as f64 * scale) as u32).max(1);
    let new_height = ((height as f64 * scale) as u32).max(1);
    info!(
        "Resizing image from {}x{} to {}x{}",
        width, height, new_width, new_height
    );
    imageops::resize(&image, new_width, new_height, FilterType::Lanczos3)
}

fn encode(image: &RgbImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, OptimizeError> {
    match format {
        OutputFormat::Webp => {
            let encoder = webp::Encoder::from_rgb(image.as_raw(), image.width(), image.height());
            encoder
                .encode_simple(false, quality as f32)
                .map(|memory| memory.to_vec())
                .map_err(|e| OptimizeError::Encode {
                    quality,
                    message: format!("{:?}", e),
                })
        }
        OutputFormat::Jpeg => {
            let mut buffer = Vec::new();
            image.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))?;
            Ok(buffer)
        }
    }
}

/// Output location for `file`, mirroring its directory relative to `input_dir`.
pub fn target_path(input_dir: &Path, output_dir: &Path, file: &Path, format: OutputFormat) -> PathBuf {
    let relative = file.strip_prefix(input_dir).unwrap_or(file);
    let mut target = match relative.parent() {
        Some(parent) => output_dir.join(parent),
        None => output_dir.to_path_buf(),
    };
    let mut name = relative.file_stem().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(format.extension());
    target.push(name);
    target
}

fn optimize_file(
    input_dir: &Path,
    output_dir: &Path,
    file: &Path,
    options: &OptimizeOptions,
) -> Result<FileResult, OptimizeError> {
    let target = target_path(input_dir, output_dir, file, options.format);
    if target.exists() {
        return Ok(FileResult::Skipped(target));
    }

    let mut reader = ImageReader::open(file)?.with_guessed_format()?;
    reader.no_limits();
    let mut rgb = reader.decode()?.to_rgb8();
    if options.format == OutputFormat::Webp {
        rgb = fit_webp_limits(rgb);
    }

    let label = file.display().to_string();
    let bytes = encode_with_retry(&label, options, |quality| encode(&rgb, options.format, quality))?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, bytes)?;
    Ok(FileResult::Written(target))
}

/// Re-encode every matching image under `input_dir` into `output_dir`.
pub fn optimize_images(
    input_dir: &Path,
    output_dir: &Path,
    options: &OptimizeOptions,
) -> Result<OptimizeReport, OptimizeError> {
    fs::create_dir_all(output_dir)?;
    let files = discover_files(input_dir, &options.scan)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.max(1))
        .build()?;

    let progress = ProgressBar::new(files.len() as u64);
    let results: Vec<(PathBuf, Result<FileResult, OptimizeError>)> = pool.install(|| {
        files
            .par_iter()
            .map(|file| {
                let result = optimize_file(input_dir, output_dir, file, options);
                progress.inc(1);
                (file.clone(), result)
            })
            .collect()
    });
    progress.finish_and_clear();

    let mut report = OptimizeReport::default();
    for (file, result) in results {
        match result {
            Ok(FileResult::Written(target)) => {
                info!("Optimized and saved: {}", target.display());
                report.written += 1;
            }
            Ok(FileResult::Skipped(target)) => {
                info!("Skipping already optimized: {}", target.display());
                report.skipped += 1;
            }
            Err(e) => {
                error!("Skipping {}: {}", file.display(), e);
                report.failed += 1;
            }
        }
    }
    Ok(report)
}
