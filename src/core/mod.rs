pub mod analyzer;
pub mod caption;
pub mod catalog;
pub mod category;
pub mod convert;
pub mod identity;
pub mod labels;
pub mod optimize;
pub mod palette;
pub mod runner;
pub mod scanner;
pub mod survey;
pub mod tagger;
