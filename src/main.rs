use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::Confirm;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use wallcat::core::analyzer::Analyzer;
use wallcat::core::caption::{TagCaptioner, apply_renames, plan_renames};
use wallcat::core::category::CategoryRules;
use wallcat::core::convert::convert_jpegs;
use wallcat::core::identity::KeyStrategy;
use wallcat::core::labels::{DEFAULT_LABELS_URL, LabelSet};
use wallcat::core::optimize::{OptimizeOptions, OutputFormat, optimize_images};
use wallcat::core::palette::{ColorClassifier, ColorMode};
use wallcat::core::runner::{BatchOptions, DEFAULT_WORKERS, run_batch};
use wallcat::core::scanner::ScanOptions;
use wallcat::core::survey::{survey_directory, write_survey};
use wallcat::core::tagger::{DEFAULT_TOP_K, OnnxTagger, Tagger};

#[derive(Parser, Debug)]
#[command(name = "wallcat", version, about = "Batch tools for wallpaper collections")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tag, categorize and color-index images into a JSON catalog
    Analyze {
        /// Directory to analyze
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Walk subdirectories too
        #[arg(short, long)]
        recursive: bool,
        /// Image extensions to pick up
        #[arg(long = "ext", value_name = "EXT", value_delimiter = ',', default_value = "png")]
        extensions: Vec<String>,
        /// Number of worker threads
        #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,
        /// Catalog file, created if missing
        #[arg(long, value_name = "FILE", default_value = "tags.json")]
        catalog: PathBuf,
        /// Append-only tag log
        #[arg(long, value_name = "FILE", default_value = "tags.txt")]
        tag_log: PathBuf,
        /// Append-only color log
        #[arg(long, value_name = "FILE", default_value = "colors.txt")]
        color_log: PathBuf,
        /// How catalog entries are keyed
        #[arg(long, value_enum, default_value_t = KeyStrategy::ContentHash)]
        key: KeyStrategy,
        /// Report palette names or folded color families
        #[arg(long, value_enum, default_value_t = ColorMode::Folded)]
        color_mode: ColorMode,
        /// Leave `categories` out of new records
        #[arg(long)]
        no_categories: bool,
        /// JSON file replacing the built-in category rules
        #[arg(long, value_name = "FILE", conflicts_with = "no_categories")]
        rules: Option<PathBuf>,
        #[command(flatten)]
        model: ModelArgs,
    },

    /// Re-encode images for the web into a cache directory
    Optimize {
        /// Directory containing the images
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Output directory (default: `<dir>/cache/<format>`)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Webp)]
        format: OutputFormat,
        /// Starting quality (default: 40 for WebP, 25 for JPEG)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: Option<u8>,
        /// Lowest quality tried when encoding fails
        #[arg(long, default_value_t = 10)]
        min_quality: u8,
        /// Maximum encode attempts per image
        #[arg(long, default_value_t = 8)]
        max_attempts: usize,
        /// Number of worker threads
        #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,
    },

    /// Convert `.jpg`/`.jpeg` files to `.png`
    Convert {
        /// Directory containing the JPEG files
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Output directory (default: same as input)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Write a resolution and orientation report for every image
    Survey {
        /// Directory to survey, recursively
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Report file
        #[arg(short, long, value_name = "FILE", default_value = "image_analysis.json")]
        output: PathBuf,
    },

    /// Rename `.png` files after a caption of their content
    Rename {
        /// Directory containing the images
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Only show what would be renamed
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Number of worker threads
        #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,
        #[command(flatten)]
        model: ModelArgs,
    },

    /// Download the label file if needed and show where it lives
    Labels {
        #[command(flatten)]
        labels: LabelArgs,
    },
}

#[derive(Args, Debug)]
struct LabelArgs {
    /// Cached label file (default: `<data dir>/wallcat/imagenet_labels.json`)
    #[arg(long, value_name = "FILE")]
    labels: Option<PathBuf>,
    /// Where to download the label file from when it is missing
    #[arg(long, value_name = "URL", default_value = DEFAULT_LABELS_URL)]
    labels_url: String,
}

impl LabelArgs {
    fn path(&self) -> PathBuf {
        self.labels
            .clone()
            .unwrap_or_else(|| data_dir().join("imagenet_labels.json"))
    }

    fn load(&self) -> Result<LabelSet> {
        let path = self.path();
        LabelSet::load_or_fetch(&path, &self.labels_url)
            .with_context(|| format!("Failed to load labels from {:?}", path))
    }
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// ONNX ImageNet classifier (default: `<data dir>/wallcat/resnet50.onnx`)
    #[arg(long, value_name = "FILE")]
    model: Option<PathBuf>,
    /// Number of labels kept per image
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,
    #[command(flatten)]
    labels: LabelArgs,
}

impl ModelArgs {
    fn load_tagger(&self) -> Result<Arc<dyn Tagger>> {
        let labels = self.labels.load()?;
        let model_path = self
            .model
            .clone()
            .unwrap_or_else(|| data_dir().join("resnet50.onnx"));
        let tagger = OnnxTagger::new(&model_path, labels, self.top_k)
            .with_context(|| format!("Failed to load model {:?}", model_path))?;
        Ok(Arc::new(tagger))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            path,
            recursive,
            extensions,
            workers,
            catalog,
            tag_log,
            color_log,
            key,
            color_mode,
            no_categories,
            rules,
            model,
        } => {
            println!("▶ Analyzing images in: {}", path.display());

            let rules = match (no_categories, rules) {
                (true, _) => None,
                (false, Some(file)) => Some(
                    CategoryRules::from_file(&file)
                        .with_context(|| format!("Failed to read category rules {:?}", file))?,
                ),
                (false, None) => Some(CategoryRules::default()),
            };
            let analyzer = Analyzer::new(
                model.load_tagger()?,
                rules,
                ColorClassifier::for_mode(color_mode),
                key,
            );

            let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();
            let scan = if recursive {
                ScanOptions::recursive(&extensions)
            } else {
                ScanOptions::flat(&extensions)
            };
            let options = BatchOptions {
                scan,
                workers,
                catalog_path: catalog,
                tag_log,
                color_log,
            };

            let report = benchmark("analyzing all images", || {
                run_batch(&path, &analyzer, &options)
            })
            .context("Batch failed")?;

            println!(
                "\n✅ {} new, {} skipped, {} failed; catalog holds {} image(s) in {}",
                report.cataloged,
                report.skipped,
                report.failed,
                report.catalog_size,
                options.catalog_path.display()
            );
        }

        Commands::Optimize {
            path,
            output,
            format,
            quality,
            min_quality,
            max_attempts,
            workers,
        } => {
            let output = output.unwrap_or_else(|| default_cache_dir(&path, format));
            println!("▶ Optimizing images in {} → {}", path.display(), output.display());

            let mut options = OptimizeOptions::new(format);
            if let Some(quality) = quality {
                options.quality = quality;
            }
            options.min_quality = min_quality;
            options.max_attempts = max_attempts;
            options.workers = workers;

            let report = benchmark("optimizing all images", || {
                optimize_images(&path, &output, &options)
            })
            .context("Optimization failed")?;

            println!(
                "\n✅ {} written, {} already optimized, {} failed",
                report.written, report.skipped, report.failed
            );
        }

        Commands::Convert { path, output } => {
            let output = output.unwrap_or_else(|| path.clone());
            println!("▶ Converting JPEG files in {} → {}", path.display(), output.display());

            let report = convert_jpegs(&path, &output).context("Conversion failed")?;
            println!("\n✅ {} converted, {} failed", report.converted, report.failed);
        }

        Commands::Survey { path, output } => {
            println!("▶ Surveying images in: {}", path.display());

            let entries = survey_directory(&path).context("Survey failed")?;
            write_survey(&entries, &output)
                .with_context(|| format!("Failed to write {:?}", output))?;

            let mobile = entries
                .iter()
                .filter(|e| e.tag == wallcat::Platform::Mobile)
                .count();
            println!(
                "\n✅ {} image(s) ({} mobile, {} desktop); results saved to {}",
                entries.len(),
                mobile,
                entries.len() - mobile,
                output.display()
            );
        }

        Commands::Rename {
            path,
            dry_run,
            yes,
            workers,
            model,
        } => {
            println!("▶ Captioning images in: {}", path.display());

            let captioner = TagCaptioner::new(model.load_tagger()?);
            let (plans, report) = benchmark("captioning all images", || {
                plan_renames(&path, &captioner, workers)
            })
            .context("Captioning failed")?;

            if plans.is_empty() {
                println!("Nothing to rename.");
                return Ok(());
            }

            for plan in &plans {
                println!(
                    "   ✏️  {} → {}",
                    plan.from.file_name().unwrap_or_default().to_string_lossy(),
                    plan.to.file_name().unwrap_or_default().to_string_lossy()
                );
            }

            if !dry_run && !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Rename {} file(s)?", plans.len()))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Aborted; no files were changed.");
                    return Ok(());
                }
            }

            let report = apply_renames(&plans, dry_run, report);
            if dry_run {
                println!("\n⚠️  Dry-run only; no files were changed.");
            }
            println!(
                "\n✅ {} renamed, {} unchanged, {} conflicts, {} failed",
                report.renamed, report.unchanged, report.conflicts, report.failed
            );
        }

        Commands::Labels { labels } => {
            let set = labels.load()?;
            println!("🗂️  {} labels in {}", set.len(), labels.path().display());
        }
    }

    Ok(())
}

/// Where model files and the label cache live by default.
fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wallcat")
}

fn default_cache_dir(path: &Path, format: OutputFormat) -> PathBuf {
    path.join("cache").join(match format {
        OutputFormat::Webp => "webp",
        OutputFormat::Jpeg => "jpeg",
    })
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
