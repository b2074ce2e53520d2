//! Per-record label extraction and corpus bookkeeping.
//!
//! [`SampleExtractor`] runs the tokenizer over a record's glyphs, unions the boxes
//! of every logical symbol and encodes them as YOLO lines. Counters live in an
//! [`ExtractionReport`] owned by the caller, so parallel workers can each keep a
//! shard and merge them by summation at the end.

use std::ops::Range;

use serde::Deserialize;
use serde_json::Value;

use crate::bbox::{aggregate, BBox};
use crate::error::Result;
use crate::registry::ClassRegistry;
use crate::tokenizer::Tokenizer;
use crate::types::{GlyphRecord, ProcessingStats, SampleRecord, SkipReason};
use crate::yolo::LabelLine;

/// A resolved class, the glyphs it was built from and their union box.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalSymbol {
    pub class_id: usize,
    pub span: Range<usize>,
    pub bbox: BBox,
    /// Union of the pixel boxes, when every glyph in the span has one.
    pub raw_bbox: Option<BBox>,
}

/// Per-class instance counters, indexed by class id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCounts {
    counts: Vec<usize>,
}

impl ClassCounts {
    pub fn new(class_count: usize) -> Self {
        Self {
            counts: vec![0; class_count],
        }
    }

    pub fn increment(&mut self, class_id: usize) {
        if class_id >= self.counts.len() {
            self.counts.resize(class_id + 1, 0);
        }
        self.counts[class_id] += 1;
    }

    pub fn get(&self, class_id: usize) -> usize {
        self.counts.get(class_id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.counts
    }

    /// Element-wise sum; order of merging does not matter.
    pub fn merge(&mut self, other: &ClassCounts) {
        if other.counts.len() > self.counts.len() {
            self.counts.resize(other.counts.len(), 0);
        }
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            *mine += *theirs;
        }
    }
}

/// Counters accumulated by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    pub stats: ProcessingStats,
    pub counts: ClassCounts,
}

impl ExtractionReport {
    pub fn new(class_count: usize) -> Self {
        Self {
            stats: ProcessingStats::new(),
            counts: ClassCounts::new(class_count),
        }
    }

    pub fn merge(mut self, other: ExtractionReport) -> Self {
        self.stats.merge(&other.stats);
        self.counts.merge(&other.counts);
        self
    }

    /// Counted instances minus those whose label file was later replaced by a
    /// record with the same identifier.
    pub fn written_instances(&self) -> usize {
        self.counts
            .total()
            .saturating_sub(self.stats.overwritten_instances)
    }
}

/// A record that produced at least one label line.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub identifier: String,
    pub lines: Vec<LabelLine>,
}

pub struct SampleExtractor<'r> {
    tokenizer: Tokenizer<'r>,
}

impl<'r> SampleExtractor<'r> {
    pub fn new(registry: &'r ClassRegistry) -> Self {
        Self {
            tokenizer: Tokenizer::new(registry),
        }
    }

    /// Logical symbols of a glyph sequence with their aggregated boxes.
    ///
    /// A symbol covering any glyph without a complete box is left out, the same
    /// way an unrecognized glyph is.
    pub fn symbols(&self, glyphs: &[GlyphRecord<'_>]) -> Result<Vec<LogicalSymbol>> {
        let tokens: Vec<&str> = glyphs.iter().map(|g| g.token.unwrap_or_default()).collect();
        let mut symbols = Vec::new();

        for symbol in self.tokenizer.tokenize(&tokens) {
            let boxes: Option<Vec<BBox>> = symbol.span.clone().map(|i| glyphs[i].bbox).collect();
            let Some(boxes) = boxes else {
                continue;
            };
            let raw_boxes: Option<Vec<BBox>> =
                symbol.span.clone().map(|i| glyphs[i].raw_bbox).collect();
            symbols.push(LogicalSymbol {
                class_id: symbol.class_id,
                bbox: aggregate(boxes)?,
                raw_bbox: raw_boxes.map(aggregate).transpose()?,
                span: symbol.span,
            });
        }

        Ok(symbols)
    }

    /// Label lines for one record, counting every emitted class in `counts`.
    ///
    /// Returns no lines when the record has no identifier, no glyph container, or
    /// no recognized symbol.
    pub fn extract(&self, record: &SampleRecord, counts: &mut ClassCounts) -> Result<Vec<LabelLine>> {
        if record.identifier().is_none() {
            return Ok(Vec::new());
        }
        let Some(data) = &record.image_data else {
            return Ok(Vec::new());
        };

        let lines: Vec<LabelLine> = self
            .symbols(&data.glyphs())?
            .iter()
            .map(|s| LabelLine::encode(&s.bbox, s.class_id))
            .collect();

        for line in &lines {
            counts.increment(line.class_id);
        }
        Ok(lines)
    }

    /// Classify and extract one raw JSON record, recording skips in `report`.
    pub fn process_value(
        &self,
        value: &Value,
        report: &mut ExtractionReport,
    ) -> Result<Option<LabeledSample>> {
        report.stats.increment_records();

        if !value.is_object() {
            report.stats.increment_skipped(SkipReason::Malformed);
            return Ok(None);
        }
        let record: SampleRecord = match SampleRecord::deserialize(value) {
            Ok(record) => record,
            Err(e) => {
                log::debug!("Skipping malformed record: {}", e);
                report.stats.increment_skipped(SkipReason::Malformed);
                return Ok(None);
            }
        };

        let Some(identifier) = record.identifier() else {
            report.stats.increment_skipped(SkipReason::MissingIdentifier);
            return Ok(None);
        };
        if record.image_data.is_none() {
            report.stats.increment_skipped(SkipReason::Malformed);
            return Ok(None);
        }

        let lines = self.extract(&record, &mut report.counts)?;
        if lines.is_empty() {
            report.stats.increment_skipped(SkipReason::NoSymbols);
            return Ok(None);
        }

        Ok(Some(LabeledSample {
            identifier: identifier.to_string(),
            lines,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassSet;
    use crate::types::GlyphData;
    use serde_json::json;

    fn record(uuid: Option<&str>, chars: &[&str], boxes: &[(f64, f64, f64, f64)]) -> SampleRecord {
        SampleRecord {
            uuid: uuid.map(str::to_string),
            latex: None,
            image_data: Some(GlyphData {
                visible_latex_chars: chars.iter().map(|c| Some(c.to_string())).collect(),
                xmins: boxes.iter().map(|b| b.0).collect(),
                ymins: boxes.iter().map(|b| b.1).collect(),
                xmaxs: boxes.iter().map(|b| b.2).collect(),
                ymaxs: boxes.iter().map(|b| b.3).collect(),
                ..GlyphData::default()
            }),
        }
    }

    fn sin_record() -> SampleRecord {
        record(
            Some("sample-1"),
            &["s", "i", "n", "=", "3"],
            &[
                (0.1, 0.1, 0.15, 0.2),
                (0.15, 0.1, 0.2, 0.2),
                (0.2, 0.1, 0.26, 0.2),
                (0.3, 0.12, 0.35, 0.18),
                (0.4, 0.1, 0.45, 0.2),
            ],
        )
    }

    #[test]
    fn extracts_function_with_union_box() {
        let registry = ClassRegistry::new(ClassSet::Extended).unwrap();
        let extractor = SampleExtractor::new(&registry);
        let mut counts = ClassCounts::new(registry.class_count());

        let lines = extractor.extract(&sin_record(), &mut counts).unwrap();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].class_id, registry.id_of("sin").unwrap());
        assert_eq!(
            lines[0].to_string(),
            format!("{} 0.180000 0.150000 0.160000 0.100000", lines[0].class_id)
        );
        assert_eq!(lines[1].class_id, registry.id_of("=").unwrap());
        assert_eq!(lines[2].class_id, registry.id_of("3").unwrap());
        assert_eq!(counts.get(registry.id_of("sin").unwrap()), 1);
        assert_eq!(counts.get(registry.id_of("s").unwrap()), 0);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn symbols_expose_spans_and_boxes() {
        let registry = ClassRegistry::new(ClassSet::Extended).unwrap();
        let extractor = SampleExtractor::new(&registry);
        let rec = sin_record();
        let symbols = extractor
            .symbols(&rec.image_data.as_ref().unwrap().glyphs())
            .unwrap();
        assert_eq!(symbols[0].span, 0..3);
        assert_eq!(symbols[0].bbox, BBox::new(0.1, 0.1, 0.26, 0.2));
        assert_eq!(symbols[2].span, 4..5);
    }

    #[test]
    fn ragged_coordinates_drop_only_uncovered_glyphs() {
        let registry = ClassRegistry::new(ClassSet::Basic).unwrap();
        let extractor = SampleExtractor::new(&registry);
        let mut counts = ClassCounts::new(registry.class_count());
        let mut rec = record(
            Some("ragged"),
            &["1", "+", "2"],
            &[(0.1, 0.1, 0.2, 0.2), (0.3, 0.1, 0.4, 0.2), (0.5, 0.1, 0.6, 0.2)],
        );
        rec.image_data.as_mut().unwrap().ymaxs.truncate(2);

        let lines = extractor.extract(&rec, &mut counts).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(counts.get(registry.id_of("2").unwrap()), 0);
    }

    #[test]
    fn ragged_coordinates_drop_whole_function() {
        let registry = ClassRegistry::new(ClassSet::Extended).unwrap();
        let extractor = SampleExtractor::new(&registry);
        let mut counts = ClassCounts::new(registry.class_count());
        let rec = record(
            Some("short"),
            &["c", "o", "s"],
            &[(0.1, 0.1, 0.2, 0.2), (0.2, 0.1, 0.3, 0.2)],
        );
        assert!(extractor.extract(&rec, &mut counts).unwrap().is_empty());
        assert_eq!(counts.total(), 0);
    }

    #[test]
    fn missing_identifier_yields_nothing() {
        let registry = ClassRegistry::new(ClassSet::Extended).unwrap();
        let extractor = SampleExtractor::new(&registry);
        let mut counts = ClassCounts::new(registry.class_count());
        let mut rec = sin_record();
        rec.uuid = Some(String::new());
        assert!(extractor.extract(&rec, &mut counts).unwrap().is_empty());
        rec.uuid = None;
        assert!(extractor.extract(&rec, &mut counts).unwrap().is_empty());
        assert_eq!(counts.total(), 0);
    }

    #[test]
    fn process_value_classifies_skips() {
        let registry = ClassRegistry::new(ClassSet::Basic).unwrap();
        let extractor = SampleExtractor::new(&registry);
        let mut report = ExtractionReport::new(registry.class_count());

        let values = [
            json!("not a record"),
            json!({"uuid": "a", "image_data": {"visible_latex_chars": 5}}),
            json!({"image_data": {"visible_latex_chars": ["1"], "xmins": [0.1], "xmaxs": [0.2], "ymins": [0.1], "ymaxs": [0.2]}}),
            json!({"uuid": "b"}),
            json!({"uuid": "c", "image_data": {"visible_latex_chars": []}}),
            json!({"uuid": "d", "image_data": {"visible_latex_chars": ["\\sin"], "xmins": [0.1], "xmaxs": [0.2], "ymins": [0.1], "ymaxs": [0.2]}}),
        ];
        for value in &values {
            assert!(extractor.process_value(value, &mut report).unwrap().is_none());
        }

        assert_eq!(report.stats.total_records, 6);
        assert_eq!(report.stats.skipped_malformed, 3);
        assert_eq!(report.stats.skipped_missing_identifier, 1);
        assert_eq!(report.stats.skipped_no_symbols, 2);
        assert_eq!(report.counts.total(), 0);
    }

    #[test]
    fn process_value_returns_labeled_sample() {
        let registry = ClassRegistry::new(ClassSet::Basic).unwrap();
        let extractor = SampleExtractor::new(&registry);
        let mut report = ExtractionReport::new(registry.class_count());
        let value = json!({
            "uuid": "e1",
            "latex": "x+1",
            "unicode_str": "x+1",
            "image_data": {
                "width": 400, "height": 200, "depth": 3,
                "visible_latex_chars": ["x", "+", "1"],
                "xmins": [0.1, 0.3, 0.5], "xmaxs": [0.2, 0.4, 0.6],
                "ymins": [0.1, 0.1, 0.1], "ymaxs": [0.2, 0.2, 0.2],
                "xmins_raw": [40, 120, 200], "xmaxs_raw": [80, 160, 240],
                "ymins_raw": [20, 20, 20], "ymaxs_raw": [40, 40, 40]
            }
        });

        let sample = extractor.process_value(&value, &mut report).unwrap().unwrap();

        assert_eq!(sample.identifier, "e1");
        assert_eq!(sample.lines.len(), 3);
        assert_eq!(report.counts.get(registry.id_of("x").unwrap()), 1);
        assert_eq!(report.stats.total_skipped(), 0);
    }

    #[test]
    fn non_string_tokens_skip_only_that_glyph() {
        let registry = ClassRegistry::new(ClassSet::Basic).unwrap();
        let extractor = SampleExtractor::new(&registry);
        let mut report = ExtractionReport::new(registry.class_count());
        let value = json!({
            "uuid": "nulls",
            "image_data": {
                "width": "N/A", "height": null,
                "visible_latex_chars": ["1", null, "2", 7],
                "xmins": [0.1, 0.3, 0.5, 0.7], "xmaxs": [0.2, 0.4, 0.6, 0.8],
                "ymins": [0.1, 0.1, 0.1, 0.1], "ymaxs": [0.2, 0.2, 0.2, 0.2],
                "xmins_raw": [40, "?", 200, 280]
            }
        });

        let sample = extractor.process_value(&value, &mut report).unwrap().unwrap();

        assert_eq!(sample.lines.len(), 2);
        assert_eq!(sample.lines[0].class_id, registry.id_of("1").unwrap());
        assert_eq!(sample.lines[1].class_id, registry.id_of("2").unwrap());
        assert_eq!(report.stats.skipped_malformed, 0);
        assert_eq!(report.counts.total(), 2);
    }

    #[test]
    fn missing_token_never_joins_a_function_name() {
        let registry = ClassRegistry::new(ClassSet::Extended).unwrap();
        let extractor = SampleExtractor::new(&registry);
        let mut counts = ClassCounts::new(registry.class_count());
        let mut rec = record(
            Some("gap"),
            &["l", "n", "x"],
            &[(0.1, 0.1, 0.2, 0.2), (0.2, 0.1, 0.3, 0.2), (0.3, 0.1, 0.4, 0.2)],
        );
        rec.image_data.as_mut().unwrap().visible_latex_chars[1] = None;

        let lines = extractor.extract(&rec, &mut counts).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(counts.get(registry.id_of("ln").unwrap()), 0);
        assert_eq!(counts.get(registry.id_of("l").unwrap()), 1);
        assert_eq!(counts.get(registry.id_of("x").unwrap()), 1);
    }

    #[test]
    fn symbols_union_raw_boxes_when_complete() {
        let registry = ClassRegistry::new(ClassSet::Extended).unwrap();
        let extractor = SampleExtractor::new(&registry);
        let mut rec = sin_record();
        let data = rec.image_data.as_mut().unwrap();
        data.xmins_raw = vec![Some(10.0), Some(15.0), Some(20.0), Some(30.0)];
        data.xmaxs_raw = vec![Some(15.0), Some(20.0), Some(26.0), Some(35.0)];
        data.ymins_raw = vec![Some(5.0); 4];
        data.ymaxs_raw = vec![Some(9.0); 4];

        let symbols = extractor
            .symbols(&rec.image_data.as_ref().unwrap().glyphs())
            .unwrap();

        assert_eq!(symbols[0].raw_bbox, Some(BBox::new(10.0, 5.0, 26.0, 9.0)));
        assert_eq!(symbols[1].raw_bbox, Some(BBox::new(30.0, 5.0, 35.0, 9.0)));
        // The raw arrays stop before the last glyph.
        assert_eq!(symbols[2].raw_bbox, None);
    }

    #[test]
    fn written_instances_subtract_overwritten_labels() {
        let mut report = ExtractionReport::new(3);
        report.counts.increment(0);
        report.counts.increment(1);
        report.counts.increment(1);
        report.stats.increment_duplicate(2);
        assert_eq!(report.written_instances(), 1);
    }

    #[test]
    fn merged_counts_do_not_depend_on_order() {
        let mut a = ClassCounts::new(3);
        a.increment(0);
        a.increment(2);
        let mut b = ClassCounts::new(3);
        b.increment(2);
        b.increment(1);
        let mut c = ClassCounts::new(3);
        c.increment(0);

        let mut left = a.clone();
        left.merge(&b);
        left.merge(&c);
        let mut right = c.clone();
        right.merge(&b);
        right.merge(&a);

        assert_eq!(left, right);
        assert_eq!(left.as_slice(), &[2, 1, 2]);
    }
}
