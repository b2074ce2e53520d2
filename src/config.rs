use clap::{Parser, ValueEnum};
use std::str::FromStr;

use crate::types::DEFAULT_JSON_PATTERN;

/// Command-line arguments for converting per-glyph LaTeX annotations to YOLO labels.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Directory containing the vendor JSON files (label directory in stats mode,
    /// a single JSON file or a directory in view mode)
    #[arg(short = 's', long = "source")]
    pub source: String,

    /// Output directory for label files and dataset.yaml
    #[arg(short = 't', long = "target")]
    pub target: Option<String>,

    /// What to do with the source: convert, stats, analyze or view
    #[arg(long = "mode", value_enum, default_value = "convert")]
    pub mode: Mode,

    /// Class vocabulary revision to label against
    #[arg(long = "classes", value_enum, default_value = "extended")]
    pub classes: ClassSet,

    /// Dataset split the labels are written to
    #[arg(long = "split", value_enum, default_value = "train")]
    pub split: Split,

    /// File-name glob selecting the JSON files to read
    #[arg(long = "pattern", default_value = DEFAULT_JSON_PATTERN, value_parser = validate_pattern)]
    pub pattern: String,

    /// Warn about classes with fewer instances than this
    #[arg(long = "min_instances", default_value_t = 10)]
    pub min_instances: usize,

    /// Number of rows printed in analyze mode
    #[arg(long = "top", default_value_t = 30, value_parser = validate_positive)]
    pub top: usize,

    /// Index of the first record shown in view mode
    #[arg(long = "sample", default_value_t = 0)]
    pub sample: usize,

    /// Number of records shown in view mode
    #[arg(long = "count", default_value_t = 1, value_parser = validate_positive)]
    pub count: usize,

    /// Number of worker threads (0 uses all cores)
    #[arg(long = "workers", default_value_t = 0)]
    pub workers: usize,

    /// Delete an existing labels directory before writing
    #[arg(long = "clean")]
    pub clean: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum Mode {
    /// Write YOLO label files and dataset.yaml
    Convert,
    /// Count class instances in existing label files
    Stats,
    /// Report raw glyph token frequencies and how they resolve
    Analyze,
    /// Print the extracted symbols and boxes of individual records
    View,
}

/// Vocabulary revisions of the dataset
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum ClassSet {
    /// 18 classes: digits, + - * / =, x and parentheses
    Basic,
    /// Digits, operators, lowercase letters, brackets, constants and function names
    Extended,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

// Reject globs that would fail later during directory walking
fn validate_pattern(s: &str) -> Result<String, String> {
    glob::Pattern::new(s)
        .map(|_| s.to_string())
        .map_err(|e| format!("invalid file pattern: {}", e))
}

fn validate_positive(s: &str) -> Result<usize, String> {
    match usize::from_str(s) {
        Ok(val) if val > 0 => Ok(val),
        _ => Err("value must be a positive integer".to_string()),
    }
}
