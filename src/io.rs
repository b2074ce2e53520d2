use glob::Pattern;
use jwalk::WalkDir;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::Split;
use crate::extractor::{ClassCounts, LabeledSample};
use crate::registry::ClassRegistry;
use crate::yolo::render_label_file;

/// Walk `dirname` and collect every file whose name matches `pattern`, sorted.
pub fn find_json_files(dirname: &Path, pattern: &str) -> Result<Vec<PathBuf>, glob::PatternError> {
    let pattern = Pattern::new(pattern)?;
    let mut files: Vec<PathBuf> = WalkDir::new(dirname)
        .skip_hidden(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|name| pattern.matches(name))
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    Ok(files)
}

/// Directory the label files of `split` are written to.
pub fn labels_dir(target: &Path, split: Split) -> PathBuf {
    target.join(split.as_str()).join("labels")
}

/// File name of the label file for a record identifier.
pub fn label_file_name(identifier: &str) -> String {
    format!("{}.txt", sanitize_filename::sanitize(identifier))
}

/// Write one label file named after the record identifier.
pub fn write_label_file(labels_dir: &Path, sample: &LabeledSample) -> std::io::Result<PathBuf> {
    let path = labels_dir.join(label_file_name(&sample.identifier));
    let mut writer = BufWriter::new(File::create(&path)?);
    writer.write_all(render_label_file(&sample.lines).as_bytes())?;
    writer.flush()?;
    Ok(path)
}

/// Create the dataset.yaml manifest listing the class names in id order.
pub fn create_dataset_yaml(target: &Path, registry: &ClassRegistry) -> std::io::Result<PathBuf> {
    let dataset_yaml_path = target.join("dataset.yaml");
    let mut dataset_yaml = BufWriter::new(File::create(&dataset_yaml_path)?);
    let absolute_path = fs::canonicalize(target)?;
    let mut yaml_content = format!("path: {}\n", absolute_path.to_string_lossy());
    for split in [Split::Train, Split::Val, Split::Test] {
        // Splits that were never converted stay empty.
        if split == Split::Train || labels_dir(target, split).exists() {
            yaml_content.push_str(&format!("{0}: {0}/images\n", split.as_str()));
        } else {
            yaml_content.push_str(&format!("{}:\n", split.as_str()));
        }
    }
    yaml_content.push_str(&format!("\nnc: {}\n", registry.class_count()));
    yaml_content.push_str("names:\n");
    for (id, label) in registry.class_names().iter().enumerate() {
        yaml_content.push_str(&format!("    {}: {}\n", id, yaml_quote(label)));
    }
    dataset_yaml.write_all(yaml_content.as_bytes())?;
    dataset_yaml.flush()?;
    Ok(dataset_yaml_path)
}

// Single-quoted scalar so symbols like `*`, `|` and `-` are not read as YAML syntax
fn yaml_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Class instance counts read back from a directory of label files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelStats {
    pub files: usize,
    pub counts: ClassCounts,
    /// Lines that are not `<id> <cx> <cy> <w> <h>` with a known class id.
    pub invalid_lines: usize,
}

impl LabelStats {
    fn new(class_count: usize) -> Self {
        Self {
            files: 0,
            counts: ClassCounts::new(class_count),
            invalid_lines: 0,
        }
    }

    fn merge(mut self, other: LabelStats) -> Self {
        self.files += other.files;
        self.counts.merge(&other.counts);
        self.invalid_lines += other.invalid_lines;
        self
    }
}

/// Count class instances in every `*.txt` file of `labels_dir`.
pub fn collect_label_stats(
    labels_dir: &Path,
    registry: &ClassRegistry,
) -> std::io::Result<LabelStats> {
    let class_count = registry.class_count();
    let mut entries = Vec::new();
    for entry in fs::read_dir(labels_dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            entries.push(path);
        }
    }

    entries
        .par_iter()
        .map(|path| -> std::io::Result<LabelStats> {
            let mut stats = LabelStats::new(class_count);
            stats.files = 1;
            let reader = BufReader::new(File::open(path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match parse_class_id(&line) {
                    Some(id) if id < class_count => stats.counts.increment(id),
                    _ => stats.invalid_lines += 1,
                }
            }
            Ok(stats)
        })
        .try_reduce(|| LabelStats::new(class_count), |a, b| Ok(a.merge(b)))
}

fn parse_class_id(line: &str) -> Option<usize> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return None;
    }
    parts[0].parse().ok()
}
