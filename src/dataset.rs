use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{error, info, warn};
use rayon::prelude::*;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::bbox::BBox;
use crate::config::Args;
use crate::extractor::{ClassCounts, ExtractionReport, SampleExtractor};
use crate::io::{
    collect_label_stats, create_dataset_yaml, find_json_files, label_file_name, labels_dir,
    write_label_file, LabelStats,
};
use crate::registry::ClassRegistry;
use crate::types::SampleRecord;
use crate::utils::{create_output_directory, create_progress_bar, create_thread_pool, read_and_parse_json};

/// Main label extraction pipeline: every matching JSON file is processed in
/// parallel, each worker keeps its own report shard and the shards are summed.
pub fn process_dataset(
    args: &Args,
    registry: &ClassRegistry,
) -> Result<ExtractionReport, Box<dyn std::error::Error>> {
    let source = PathBuf::from(&args.source);
    let target = PathBuf::from(
        args.target
            .as_deref()
            .ok_or("--target is required in convert mode")?,
    );

    let json_files = find_json_files(&source, &args.pattern)?;
    if json_files.is_empty() {
        return Err(format!(
            "No JSON files matching {} found under {}",
            args.pattern,
            source.display()
        )
        .into());
    }
    info!("Found {} JSON files.", json_files.len());
    info!(
        "Target classes: {} ({})",
        registry.class_count(),
        registry.class_names().join(", ")
    );

    let labels_dir = create_output_directory(&labels_dir(&target, args.split), args.clean)?;
    let class_count = registry.class_count();
    let extractor = SampleExtractor::new(registry);
    let written_labels: DashMap<String, usize> = DashMap::new();
    let thread_pool = create_thread_pool(args.workers)?;

    let pb = create_progress_bar(json_files.len() as u64, "Labels");
    let report = thread_pool.install(|| {
        json_files
            .par_iter()
            .map(|json_path| {
                let shard = process_json_file(
                    json_path,
                    &extractor,
                    &labels_dir,
                    &written_labels,
                    class_count,
                );
                pb.inc(1);
                shard
            })
            .try_reduce(|| ExtractionReport::new(class_count), |a, b| Ok(a.merge(b)))
    })?;
    pb.finish_with_message("Label extraction complete");

    report.stats.print_summary();
    print_class_counts(registry, &report.counts, args.min_instances);
    if report.stats.duplicate_identifiers > 0 {
        warn!(
            "Instances counted: {}, instances left in label files: {} ({} replaced by duplicate identifiers)",
            report.counts.total(),
            report.written_instances(),
            report.stats.overwritten_instances
        );
    }
    if report.stats.labeled_records == 0 {
        warn!("No label files were generated. Check that records carry a uuid and contain symbols of the selected class set.");
    }

    info!("Creating dataset.yaml file...");
    let yaml_path = create_dataset_yaml(&target, registry)
        .map_err(|e| format!("Failed to create dataset.yaml: {}", e))?;
    info!("Wrote {}", yaml_path.display());
    info!("Labels written to {}", labels_dir.display());

    Ok(report)
}

/// Extract and write the labels of one vendor JSON file. I/O problems are logged
/// and counted; only a broken pipeline invariant is returned as an error.
///
/// `written_labels` maps every label file written so far to its line count.
pub fn process_json_file(
    json_path: &Path,
    extractor: &SampleExtractor<'_>,
    labels_dir: &Path,
    written_labels: &DashMap<String, usize>,
    class_count: usize,
) -> crate::error::Result<ExtractionReport> {
    let mut report = ExtractionReport::new(class_count);
    report.stats.increment_files();

    let Some(value) = read_and_parse_json(json_path) else {
        report.stats.increment_failed_files();
        return Ok(report);
    };
    let Value::Array(records) = value else {
        warn!(
            "Expected a list of records in {}; skipping file",
            json_path.display()
        );
        report.stats.increment_failed_files();
        return Ok(report);
    };

    for record in &records {
        let Some(sample) = extractor.process_value(record, &mut report)? else {
            continue;
        };

        // The entry keeps its shard locked until the write is done, so the map
        // always describes the file left on disk.
        let entry = written_labels.entry(label_file_name(&sample.identifier));
        match write_label_file(labels_dir, &sample) {
            Ok(_) => {
                report.stats.increment_labeled();
                let lines = sample.lines.len();
                match entry {
                    Entry::Occupied(mut slot) => {
                        let previous = slot.insert(lines);
                        warn!(
                            "Duplicate identifier {:?} in {}; overwrote its label file",
                            sample.identifier,
                            json_path.display()
                        );
                        report.stats.increment_duplicate(previous);
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(lines);
                    }
                }
            }
            Err(e) => {
                error!(
                    "Failed to write label file for {}: {}",
                    sample.identifier, e
                );
                report.stats.increment_failed_writes();
            }
        }
    }

    Ok(report)
}

/// Log per-class instance totals and flag classes under `min_instances`.
pub fn print_class_counts(registry: &ClassRegistry, counts: &ClassCounts, min_instances: usize) {
    info!("=== Instances per class ===");
    for (id, name) in registry.class_names().iter().enumerate() {
        info!("  {:>5}: {:>8}", name, counts.get(id));
    }
    info!("Total instances: {}", counts.total());

    let sparse: Vec<String> = registry
        .class_names()
        .iter()
        .enumerate()
        .filter(|(id, _)| counts.get(*id) < min_instances)
        .map(|(id, name)| format!("{} ({})", name, counts.get(id)))
        .collect();
    if !sparse.is_empty() {
        warn!(
            "{} classes have fewer than {} instances: {}",
            sparse.len(),
            min_instances,
            sparse.join(", ")
        );
    }
}

/// Count class instances in an existing label directory. `source/labels` is used
/// when it exists, `source` itself otherwise.
pub fn report_label_stats(
    args: &Args,
    registry: &ClassRegistry,
) -> Result<LabelStats, Box<dyn std::error::Error>> {
    let source = PathBuf::from(&args.source);
    let dir = if source.join("labels").is_dir() {
        source.join("labels")
    } else {
        source
    };
    info!("Collecting label statistics from {}", dir.display());

    let thread_pool = create_thread_pool(args.workers)?;
    let stats = thread_pool.install(|| collect_label_stats(&dir, registry))?;

    info!("Label files: {}", stats.files);
    if stats.invalid_lines > 0 {
        warn!(
            "Lines with an unknown class id or too few fields: {}",
            stats.invalid_lines
        );
    }
    print_class_counts(registry, &stats.counts, args.min_instances);
    Ok(stats)
}

/// How often a raw glyph token occurs and the class it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFrequency {
    pub token: String,
    pub count: usize,
    pub class: Option<String>,
}

/// Frequency of every raw glyph token across `json_files`, most frequent first.
pub fn token_frequencies(json_files: &[PathBuf], registry: &ClassRegistry) -> Vec<TokenFrequency> {
    let token_counts: DashMap<String, usize> = DashMap::new();

    json_files.par_iter().for_each(|json_path| {
        let Some(Value::Array(records)) = read_and_parse_json(json_path) else {
            return;
        };
        for record in &records {
            let tokens = record
                .get("image_data")
                .and_then(|data| data.get("visible_latex_chars"))
                .and_then(Value::as_array);
            for token in tokens.into_iter().flatten().filter_map(Value::as_str) {
                *token_counts.entry(token.to_string()).or_insert(0) += 1;
            }
        }
    });

    let mut frequencies: Vec<TokenFrequency> = token_counts
        .into_iter()
        .map(|(token, count)| TokenFrequency {
            class: registry.resolve(&token).map(str::to_string),
            token,
            count,
        })
        .collect();
    frequencies.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.token.cmp(&b.token)));
    frequencies
}

/// Print the raw token distribution of the source files.
pub fn analyze_tokens(
    args: &Args,
    registry: &ClassRegistry,
) -> Result<Vec<TokenFrequency>, Box<dyn std::error::Error>> {
    let source = PathBuf::from(&args.source);
    let json_files = find_json_files(&source, &args.pattern)?;
    info!("Analyzing {} JSON files...", json_files.len());

    let thread_pool = create_thread_pool(args.workers)?;
    let frequencies = thread_pool.install(|| token_frequencies(&json_files, registry));

    let total: usize = frequencies.iter().map(|f| f.count).sum();
    let unrecognized: usize = frequencies
        .iter()
        .filter(|f| f.class.is_none())
        .map(|f| f.count)
        .sum();

    info!("Top {} glyph tokens:", args.top.min(frequencies.len()));
    info!("{:<24} {:>10} {:>8}  class", "token", "count", "%");
    for f in frequencies.iter().take(args.top) {
        info!(
            "{:<24} {:>10} {:>7.2}%  {}",
            f.token,
            f.count,
            percentage(f.count, total),
            f.class.as_deref().unwrap_or("-")
        );
    }
    info!("Total glyphs: {}", total);
    info!("Unique tokens: {}", frequencies.len());
    info!(
        "Unrecognized glyphs: {} ({:.2}%)",
        unrecognized,
        percentage(unrecognized, total)
    );

    Ok(frequencies)
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// One extracted symbol as shown by the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRow {
    /// Index of the first glyph of the symbol.
    pub index: usize,
    pub class: String,
    /// The raw tokens the symbol was built from, concatenated.
    pub latex: String,
    pub bbox: BBox,
    pub raw_bbox: Option<BBox>,
}

/// A record with its extracted symbols.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleView {
    pub index: usize,
    pub identifier: Option<String>,
    pub latex: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub rows: Vec<SymbolRow>,
}

/// Print the symbols of `--count` records starting at `--sample`. The source is
/// either a JSON file or a directory whose first matching file is used.
pub fn view_samples(
    args: &Args,
    registry: &ClassRegistry,
) -> Result<Vec<SampleView>, Box<dyn std::error::Error>> {
    let source = PathBuf::from(&args.source);
    let json_path = if source.is_file() {
        source
    } else {
        find_json_files(&source, &args.pattern)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                format!(
                    "No JSON files matching {} found under {}",
                    args.pattern,
                    source.display()
                )
            })?
    };

    let value = read_and_parse_json(&json_path)
        .ok_or_else(|| format!("Failed to read {}", json_path.display()))?;
    let Value::Array(records) = value else {
        return Err(format!("Expected a list of records in {}", json_path.display()).into());
    };
    if records.is_empty() {
        return Err(format!("{} contains no records", json_path.display()).into());
    }
    info!("Loaded {} records from {}", records.len(), json_path.display());
    if args.sample >= records.len() {
        warn!(
            "Sample index {} is past the last record ({})",
            args.sample,
            records.len() - 1
        );
        return Ok(Vec::new());
    }

    let extractor = SampleExtractor::new(registry);
    let end = args.sample.saturating_add(args.count).min(records.len());
    let mut views = Vec::with_capacity(end - args.sample);
    for (index, record) in records.iter().enumerate().take(end).skip(args.sample) {
        let view = describe_record(&extractor, registry, record, index)?;
        print_sample_view(&view, registry);
        views.push(view);
    }
    Ok(views)
}

/// Extract the symbols of one raw record for display. A record that does not
/// deserialize is shown without symbols.
pub fn describe_record(
    extractor: &SampleExtractor<'_>,
    registry: &ClassRegistry,
    value: &Value,
    index: usize,
) -> crate::error::Result<SampleView> {
    let record = SampleRecord::deserialize(value).unwrap_or_else(|e| {
        warn!("Record {} is malformed: {}", index, e);
        SampleRecord::default()
    });

    let mut rows = Vec::new();
    if let Some(data) = &record.image_data {
        let glyphs = data.glyphs();
        for symbol in extractor.symbols(&glyphs)? {
            rows.push(SymbolRow {
                index: symbol.span.start,
                class: registry.name_of(symbol.class_id).unwrap_or("?").to_string(),
                latex: glyphs[symbol.span.clone()]
                    .iter()
                    .filter_map(|g| g.token)
                    .collect(),
                bbox: symbol.bbox,
                raw_bbox: symbol.raw_bbox,
            });
        }
    }

    Ok(SampleView {
        index,
        identifier: record.uuid.clone(),
        latex: record.latex.clone(),
        width: record.image_data.as_ref().and_then(|d| d.width),
        height: record.image_data.as_ref().and_then(|d| d.height),
        rows,
    })
}

fn print_sample_view(view: &SampleView, registry: &ClassRegistry) {
    info!("=== Sample {} ===", view.index + 1);
    info!("UUID: {}", view.identifier.as_deref().unwrap_or("N/A"));
    info!("LaTeX: {}", view.latex.as_deref().unwrap_or("N/A"));
    info!(
        "Image size: {} x {}",
        optional_number(view.width),
        optional_number(view.height)
    );

    if view.rows.is_empty() {
        warn!(
            "No symbols of the {} target classes were found in this record",
            registry.class_count()
        );
        return;
    }

    info!("Extracted symbols: {}", view.rows.len());
    info!(
        "{:<8} {:<8} {:<25} {:<35} {}",
        "Index", "Class", "LaTeX", "BBox (normalized)", "BBox (raw)"
    );
    for row in &view.rows {
        let normalized = format!(
            "({:.4},{:.4})-({:.4},{:.4})",
            row.bbox.xmin, row.bbox.ymin, row.bbox.xmax, row.bbox.ymax
        );
        let raw = row.raw_bbox.map_or_else(
            || "-".to_string(),
            |b| format!("({},{})-({},{})", b.xmin, b.ymin, b.xmax, b.ymax),
        );
        info!(
            "{:<8} {:<8} {:<25} {:<35} {}",
            row.index, row.class, row.latex, normalized, raw
        );
    }
}

fn optional_number(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}
