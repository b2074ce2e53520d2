use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::bbox::BBox;

/// Default file-name pattern of the vendor JSON batches.
pub const DEFAULT_JSON_PATTERN: &str = "kaggle_data_*.json";

// The glyph container of a vendor record. Coordinate arrays run parallel to
// `visible_latex_chars` but may be shorter. A glyph token that is not a string
// is kept as `None` so it is skipped without losing the rest of the record.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GlyphData {
    #[serde(default, deserialize_with = "lenient_tokens")]
    pub visible_latex_chars: Vec<Option<String>>,
    #[serde(default)]
    pub xmins: Vec<f64>,
    #[serde(default)]
    pub xmaxs: Vec<f64>,
    #[serde(default)]
    pub ymins: Vec<f64>,
    #[serde(default)]
    pub ymaxs: Vec<f64>,
    #[serde(default, deserialize_with = "lenient_numbers")]
    pub xmins_raw: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient_numbers")]
    pub xmaxs_raw: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient_numbers")]
    pub ymins_raw: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient_numbers")]
    pub ymaxs_raw: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub width: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub height: Option<f64>,
}

fn lenient_tokens<'de, D>(deserializer: D) -> Result<Vec<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .map(|v| match v {
            Value::String(token) => Some(token),
            _ => None,
        })
        .collect())
}

fn lenient_numbers<'de, D>(deserializer: D) -> Result<Vec<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values.iter().map(Value::as_f64).collect())
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_f64))
}

// One annotated expression image
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SampleRecord {
    pub uuid: Option<String>,
    pub latex: Option<String>,
    pub image_data: Option<GlyphData>,
}

/// A single raw glyph with its coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRecord<'a> {
    pub index: usize,
    /// `None` when the vendor token is not a string.
    pub token: Option<&'a str>,
    /// Normalized box; `None` when a coordinate array is too short at this index.
    pub bbox: Option<BBox>,
    /// Pixel-space box, shown by the sample viewer.
    pub raw_bbox: Option<BBox>,
}

impl GlyphData {
    /// Zip the parallel arrays into per-glyph records, one per token.
    pub fn glyphs(&self) -> Vec<GlyphRecord<'_>> {
        self.visible_latex_chars
            .iter()
            .enumerate()
            .map(|(index, token)| GlyphRecord {
                index,
                token: token.as_deref(),
                bbox: box_at(&self.xmins, &self.ymins, &self.xmaxs, &self.ymaxs, index),
                raw_bbox: raw_box_at(self, index),
            })
            .collect()
    }
}

fn box_at(xmins: &[f64], ymins: &[f64], xmaxs: &[f64], ymaxs: &[f64], i: usize) -> Option<BBox> {
    Some(BBox::new(
        *xmins.get(i)?,
        *ymins.get(i)?,
        *xmaxs.get(i)?,
        *ymaxs.get(i)?,
    ))
}

fn raw_box_at(data: &GlyphData, i: usize) -> Option<BBox> {
    Some(BBox::new(
        (*data.xmins_raw.get(i)?)?,
        (*data.ymins_raw.get(i)?)?,
        (*data.xmaxs_raw.get(i)?)?,
        (*data.ymaxs_raw.get(i)?)?,
    ))
}

impl SampleRecord {
    /// The record identifier, if present and non-empty.
    pub fn identifier(&self) -> Option<&str> {
        self.uuid.as_deref().filter(|id| !id.is_empty())
    }
}

/// Why a record produced no label file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not a JSON object, wrong field types, or no glyph container.
    Malformed,
    MissingIdentifier,
    /// No glyph resolved to a class with a complete box.
    NoSymbols,
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub total_files_processed: usize,
    pub failed_files: usize,
    pub total_records: usize,
    pub labeled_records: usize,
    pub skipped_malformed: usize,
    pub skipped_missing_identifier: usize,
    pub skipped_no_symbols: usize,
    pub duplicate_identifiers: usize,
    /// Instances whose label file was replaced by a later record with the same identifier.
    pub overwritten_instances: usize,
    pub failed_writes: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_files(&mut self) {
        self.total_files_processed += 1;
    }

    pub fn increment_failed_files(&mut self) {
        self.failed_files += 1;
    }

    pub fn increment_records(&mut self) {
        self.total_records += 1;
    }

    pub fn increment_labeled(&mut self) {
        self.labeled_records += 1;
    }

    pub fn increment_skipped(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::Malformed => self.skipped_malformed += 1,
            SkipReason::MissingIdentifier => self.skipped_missing_identifier += 1,
            SkipReason::NoSymbols => self.skipped_no_symbols += 1,
        }
    }

    pub fn increment_duplicate(&mut self, overwritten_lines: usize) {
        self.duplicate_identifiers += 1;
        self.overwritten_instances += overwritten_lines;
    }

    pub fn increment_failed_writes(&mut self) {
        self.failed_writes += 1;
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped_malformed + self.skipped_missing_identifier + self.skipped_no_symbols
    }

    pub fn merge(&mut self, other: &ProcessingStats) {
        self.total_files_processed += other.total_files_processed;
        self.failed_files += other.failed_files;
        self.total_records += other.total_records;
        self.labeled_records += other.labeled_records;
        self.skipped_malformed += other.skipped_malformed;
        self.skipped_missing_identifier += other.skipped_missing_identifier;
        self.skipped_no_symbols += other.skipped_no_symbols;
        self.duplicate_identifiers += other.duplicate_identifiers;
        self.overwritten_instances += other.overwritten_instances;
        self.failed_writes += other.failed_writes;
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("JSON files processed: {}", self.total_files_processed);
        log::info!("Records seen: {}", self.total_records);
        log::info!("Label files written: {}", self.labeled_records);
        log::info!("Skipped (malformed record): {}", self.skipped_malformed);
        log::info!(
            "Skipped (missing identifier): {}",
            self.skipped_missing_identifier
        );
        log::info!(
            "Skipped (no recognized symbols): {}",
            self.skipped_no_symbols
        );

        if self.failed_files > 0 {
            log::warn!("Unreadable or malformed JSON files: {}", self.failed_files);
        }
        if self.failed_writes > 0 {
            log::warn!("Failed label writes: {}", self.failed_writes);
        }
        if self.duplicate_identifiers > 0 {
            log::warn!(
                "Duplicate identifiers (label file overwritten): {} ({} instances replaced)",
                self.duplicate_identifiers, self.overwritten_instances
            );
        }
        let total_skipped = self.total_skipped();
        if total_skipped > 0 {
            log::warn!(
                "Total skipped records: {} (malformed: {}, missing identifier: {}, no symbols: {})",
                total_skipped,
                self.skipped_malformed,
                self.skipped_missing_identifier,
                self.skipped_no_symbols
            );
        }
    }
}
