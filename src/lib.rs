pub mod core;

pub use crate::core::analyzer::{Analyzer, FileOutcome};
pub use crate::core::catalog::{Catalog, ImageRecord, Platform, Resolution};
pub use crate::core::category::CategoryRules;
pub use crate::core::identity::KeyStrategy;
pub use crate::core::labels::LabelSet;
pub use crate::core::palette::{ColorClassifier, ColorMode};
pub use crate::core::runner::{BatchOptions, BatchReport, run_batch};
pub use crate::core::tagger::{OnnxTagger, Tagger};
