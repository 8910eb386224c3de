//! Logging initialization

use std::path::PathBuf;

/// Initialize logging based on debug flag
/// Returns the log file path if debug logging is enabled
pub fn init_logging(debug: bool) -> Option<PathBuf> {
    if !debug {
        // No logging by default (silent operation)
        return None;
    }

    // Named temp file that outlives the handle; the OS cleans it up
    let log_path = tempfile::Builder::new()
        .prefix("trace-diagram-")
        .suffix(".log")
        .tempfile()
        .ok()
        .and_then(|f| f.keep().ok())
        .map(|(_, path)| path)
        .unwrap_or_else(|| {
            std::env::temp_dir().join(format!("trace-diagram-{}.log", std::process::id()))
        });

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    // Write to file so command output on stdout stays clean
    tracing_subscriber::fmt()
        .with_writer(file)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trace_diagram=debug")),
        )
        .with_ansi(false) // No ANSI codes in log file
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    Some(log_path)
}
