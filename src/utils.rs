use indicatif::{ProgressBar, ProgressStyle};
use log::error;
use serde_json::Value;
use std::fs;
use std::io::BufReader;
use std::path::Path;

/// Read and parse a vendor JSON file from a buffered file stream.
/// Returns `None` (after logging) when the file cannot be opened or parsed.
pub fn read_and_parse_json(path: &Path) -> Option<Value> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to open JSON file ({}): {:?}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_reader(BufReader::new(file)) {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Failed to parse JSON ({}): {:?}", path.display(), e);
            None
        }
    }
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .progress_chars("#>-"),
    );
    pb
}

/// Ensure an output directory exists. With `clean`, an existing directory is
/// deleted and recreated.
pub fn create_output_directory(path: &Path, clean: bool) -> std::io::Result<std::path::PathBuf> {
    if path.exists() && clean {
        log::warn!(
            "Directory {:?} already exists. Deleting and recreating it.",
            path
        );
        fs::remove_dir_all(path).and_then(|_| fs::create_dir_all(path))?;
    } else {
        fs::create_dir_all(path)?;
    }
    Ok(path.to_path_buf())
}

/// Build the worker pool; `0` lets rayon pick one thread per core.
pub fn create_thread_pool(workers: usize) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new().num_threads(workers).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_and_parse_json() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        fs::File::create(&good)
            .unwrap()
            .write_all(br#"[{"uuid": "a"}]"#)
            .unwrap();
        let bad = dir.path().join("bad.json");
        fs::File::create(&bad).unwrap().write_all(b"[{").unwrap();

        assert!(read_and_parse_json(&good).unwrap().is_array());
        assert!(read_and_parse_json(&bad).is_none());
        assert!(read_and_parse_json(&dir.path().join("missing.json")).is_none());
    }

    #[test]
    fn test_create_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let labels = dir.path().join("train/labels");
        create_output_directory(&labels, false).unwrap();
        fs::write(labels.join("old.txt"), "0 0.5 0.5 0.1 0.1\n").unwrap();

        create_output_directory(&labels, false).unwrap();
        assert!(labels.join("old.txt").exists());

        create_output_directory(&labels, true).unwrap();
        assert!(labels.exists());
        assert!(!labels.join("old.txt").exists());
    }
}
