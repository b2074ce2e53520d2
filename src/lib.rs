//! LaTeX glyph annotations to YOLO format converter
//!
//! This library turns per-glyph LaTeX handwriting annotations into YOLO detection
//! labels over a closed symbol vocabulary, folding multi-glyph function names
//! such as `sin` or `sqrt` into a single box.

pub mod bbox;
pub mod config;
pub mod dataset;
pub mod error;
pub mod extractor;
pub mod io;
pub mod registry;
pub mod tokenizer;
pub mod types;
pub mod utils;
pub mod yolo;

// Re-export commonly used types and functions
pub use bbox::{aggregate, BBox};
pub use config::{Args, ClassSet, Mode, Split};
pub use dataset::{analyze_tokens, process_dataset, report_label_stats, view_samples};
pub use error::Error;
pub use extractor::{ClassCounts, ExtractionReport, LabeledSample, LogicalSymbol, SampleExtractor};
pub use registry::ClassRegistry;
pub use tokenizer::{SymbolSpan, Tokenizer};
pub use types::{GlyphData, GlyphRecord, ProcessingStats, SampleRecord, SkipReason};
pub use yolo::LabelLine;
