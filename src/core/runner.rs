use crate::core::analyzer::{Analyzer, FileOutcome};
use crate::core::catalog::{Catalog, CatalogError, ImageRecord};
use crate::core::scanner::{ScanError, ScanOptions, discover_files};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use rayon::prelude::*;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_WORKERS: usize = 8;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Failed to write {}: {source}", path.display())]
    Log {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub scan: ScanOptions,
    pub workers: usize,
    pub catalog_path: PathBuf,
    pub tag_log: PathBuf,
    pub color_log: PathBuf,
}

impl BatchOptions {
    /// Flat `.png` scan with the catalog and logs in the working directory.
    pub fn new() -> Self {
        Self {
            scan: ScanOptions::flat(&["png"]),
            workers: DEFAULT_WORKERS,
            catalog_path: PathBuf::from("tags.json"),
            tag_log: PathBuf::from("tags.txt"),
            color_log: PathBuf::from("colors.txt"),
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub discovered: usize,
    pub cataloged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub catalog_size: usize,
}

/// Append-only text file, opened on first write.
struct SideLog {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl SideLog {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: None,
        }
    }

    fn append(&mut self, text: &str) -> Result<(), BatchError> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|source| self.error(source))?;
            self.writer = Some(BufWriter::new(file));
        }

        if let Some(writer) = self.writer.as_mut() {
            if let Err(source) = writer.write_all(text.as_bytes()) {
                return Err(self.error(source));
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BatchError> {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(source) = writer.flush() {
                return Err(self.error(source));
            }
        }
        Ok(())
    }

    fn error(&self, source: std::io::Error) -> BatchError {
        BatchError::Log {
            path: self.path.clone(),
            source,
        }
    }
}

fn tag_line(key: &str, record: &ImageRecord) -> String {
    format!("{}: Tags: {}\n", key, record.tags.join(", "))
}

fn color_lines(record: &ImageRecord) -> String {
    let mut lines = record
        .colors
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    lines.push('\n');
    lines
}

/// Analyze every matching file under `dir` and merge new records into the catalog.
///
/// Workers only read the catalog as loaded at batch start. Inserts and log
/// appends happen on the calling thread once the pool has drained, and the
/// catalog is written back exactly once at the end.
pub fn run_batch(
    dir: &Path,
    analyzer: &Analyzer,
    options: &BatchOptions,
) -> Result<BatchReport, BatchError> {
    let mut catalog = Catalog::load(&options.catalog_path)?;
    let files = discover_files(dir, &options.scan)?;
    info!(
        "Analyzing {} image(s) with {} worker(s), {} already cataloged",
        files.len(),
        options.workers,
        catalog.len()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.max(1))
        .build()?;

    let progress = ProgressBar::new(files.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}") {
        progress.set_style(style);
    }

    let outcomes: Vec<FileOutcome> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                let outcome = analyzer.analyze_file(path, &catalog);
                progress.inc(1);
                outcome
            })
            .collect()
    });
    progress.finish_and_clear();

    let mut report = BatchReport {
        discovered: files.len(),
        ..Default::default()
    };
    let mut tag_log = SideLog::new(&options.tag_log);
    let mut color_log = SideLog::new(&options.color_log);

    for outcome in outcomes {
        match outcome {
            FileOutcome::Skipped { path, .. } => {
                info!("Skipping {}: Already processed.", path.display());
                report.skipped += 1;
            }
            FileOutcome::Cataloged { path, key, record } => {
                if catalog.contains(&key) {
                    info!(
                        "Skipping {}: same identity as an image cataloged in this run",
                        path.display()
                    );
                    report.skipped += 1;
                    continue;
                }

                tag_log.append(&tag_line(&key, &record))?;
                color_log.append(&color_lines(&record))?;
                catalog.insert(key, record);

                info!("Processed {}", path.display());
                report.cataloged += 1;
            }
            FileOutcome::Failed { path, error } => {
                error!("Error processing {}: {}", path.display(), error);
                report.failed += 1;
            }
        }
    }

    tag_log.flush()?;
    color_log.flush()?;
    catalog.save(&options.catalog_path)?;

    report.catalog_size = catalog.len();
    Ok(report)
}
