use clap::Parser;

use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use latex2yolo::{
    analyze_tokens, process_dataset, report_label_stats, view_samples, Args, ClassRegistry, Mode,
};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let source = PathBuf::from(&args.source);
    // View mode also accepts a single JSON file.
    let source_ok = match args.mode {
        Mode::View => source.exists(),
        _ => source.is_dir(),
    };
    if !source_ok {
        error!("The specified source directory does not exist: {}", args.source);
        return ExitCode::FAILURE;
    }

    // An ambiguous vocabulary must never reach the labels.
    let registry = match ClassRegistry::new(args.classes) {
        Ok(registry) => registry,
        Err(e) => {
            error!("Invalid class configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match args.mode {
        Mode::Convert => {
            info!("Starting the conversion process...");
            process_dataset(&args, &registry).map(|_| ())
        }
        Mode::Stats => report_label_stats(&args, &registry).map(|_| ()),
        Mode::Analyze => analyze_tokens(&args, &registry).map(|_| ()),
        Mode::View => view_samples(&args, &registry).map(|_| ()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to process dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
