//! segfetch - download a resource over parallel byte-range requests.

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use segfetch::config::{ConfigFile, DownloadConfig};
use segfetch::download::{
    DownloadCoordinator, DownloadReport, HttpTransport, LocalFileStore, ProgressReporter,
};
use segfetch::logging::{init_logging, LogConfig};
use segfetch::{DownloadError, DownloadResult};

use crate::error::CliError;

/// File name used when the URL has no usable last path segment.
const FALLBACK_FILE_NAME: &str = "download.bin";

#[derive(Debug, Parser)]
#[command(name = "segfetch", version, about = "Parallel segmented HTTP downloader")]
struct Cli {
    /// URL of the resource to download
    url: String,

    /// Output file (defaults to the last path segment of the URL)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of parallel segments
    #[arg(short, long)]
    workers: Option<usize>,

    /// Read buffer size per worker in bytes
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Configuration file (defaults to ~/.segfetch/config.ini)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        if let CliError::Download(DownloadError::PartialFailure { failures, .. }) = &e {
            for failure in failures {
                eprintln!("  {}", failure);
            }
        }
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut log_config = LogConfig::default().with_verbose(cli.verbose);
    if let Some(ref path) = cli.log_file {
        log_config = log_config.with_file(path);
    }
    let _logging = init_logging(&log_config).map_err(CliError::Logging)?;

    let config = resolve_config(&cli)?;
    let output = cli.output.clone().unwrap_or_else(|| default_output(&cli.url));

    let transport = HttpTransport::new(&config).map_err(|e| CliError::Transport(e.to_string()))?;
    tracing::debug!(
        workers = config.workers,
        buffer_size = config.buffer_size,
        timeout_secs = transport.timeout().as_secs(),
        "Resolved download configuration"
    );
    let coordinator =
        DownloadCoordinator::new(config.clone(), Arc::new(transport), Arc::new(LocalFileStore));

    let job = coordinator.start(&cli.url, &output)?;
    let total_bytes = job.descriptor().total_length();
    println!(
        "Downloading {} ({} bytes, {} segments) to {}",
        cli.url,
        total_bytes,
        job.segments().len(),
        output.display()
    );

    let cancel = job.cancel_token();
    ctrlc::set_handler(move || {
        tracing::warn!("Interrupt received, cancelling download");
        eprintln!();
        eprintln!("Received interrupt, cancelling download...");
        cancel.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let bar = if cli.no_progress {
        ProgressBar::hidden()
    } else {
        progress_bar(total_bytes)
    };
    let bar_clone = bar.clone();
    let reporter = ProgressReporter::start(
        job.tracker(),
        config.progress_interval,
        Box::new(move |snapshot| bar_clone.set_position(snapshot.completed_bytes)),
    )
    .map_err(CliError::Progress)?;

    let result = job.wait();
    reporter.stop();

    match report_outcome(result) {
        Ok(report) => {
            bar.finish();
            println!(
                "Downloaded {} bytes to {} in {:.2}s",
                report.total_bytes,
                report.path.display(),
                report.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            bar.abandon();
            Err(e)
        }
    }
}

/// Log the final outcome of a job and convert failures for the caller.
fn report_outcome(result: DownloadResult<DownloadReport>) -> Result<DownloadReport, CliError> {
    match result {
        Ok(report) => {
            tracing::info!(
                path = %report.path.display(),
                total_bytes = report.total_bytes,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Download finished"
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!(
                failed_segments = ?e.failed_segments(),
                error = %e,
                "Download did not complete"
            );
            Err(CliError::Download(e))
        }
    }
}

/// Build the download configuration: defaults, then config file, then flags.
fn resolve_config(cli: &Cli) -> Result<DownloadConfig, CliError> {
    let file = match cli.config {
        Some(ref path) => ConfigFile::load_from(path),
        None => ConfigFile::load(),
    }
    .map_err(|e| CliError::Config(e.to_string()))?;

    let mut config = file.to_config();
    if let Some(workers) = cli.workers {
        if workers == 0 {
            return Err(CliError::Config("--workers must be at least 1".to_string()));
        }
        config = config.with_workers(workers);
    }
    if let Some(size) = cli.buffer_size {
        config = config.with_buffer_size(size);
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

/// Output path derived from the last non-empty path segment of `url`.
fn default_output(url: &str) -> PathBuf {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);

    // The first segment is the host, never a file name.
    let name = after_scheme
        .split_once('/')
        .and_then(|(_, path)| path.rsplit('/').find(|segment| !segment.is_empty()));

    match name {
        Some(name) if is_safe_file_name(name) => PathBuf::from(name),
        _ => PathBuf::from(FALLBACK_FILE_NAME),
    }
}

fn is_safe_file_name(name: &str) -> bool {
    name != "." && name != ".." && !name.contains('\\') && Path::new(name).file_name().is_some()
}

fn progress_bar(total_bytes: u64) -> ProgressBar {
    let bar = ProgressBar::new(total_bytes);
    let style = ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
    )
    .map(|style| style.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use segfetch::error::SegmentFailure;
    use segfetch::SegmentError;
    use std::fs;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("segfetch").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_output_uses_last_segment() {
        assert_eq!(
            default_output("http://example.com/files/archive.tar.gz"),
            PathBuf::from("archive.tar.gz")
        );
        assert_eq!(
            default_output("https://example.com/a/b/data.bin?token=1#frag"),
            PathBuf::from("data.bin")
        );
        assert_eq!(default_output("https://example.com/dir/"), PathBuf::from("dir"));
    }

    #[test]
    fn test_default_output_falls_back() {
        assert_eq!(default_output("http://example.com"), PathBuf::from(FALLBACK_FILE_NAME));
        assert_eq!(default_output("http://example.com/"), PathBuf::from(FALLBACK_FILE_NAME));
        assert_eq!(default_output("http://example.com/.."), PathBuf::from(FALLBACK_FILE_NAME));
    }

    #[test]
    fn test_parse_flags() {
        let cli = parse(&["http://example.com/f", "-o", "out.bin", "-w", "8", "-v"]);
        assert_eq!(cli.url, "http://example.com/f");
        assert_eq!(cli.output, Some(PathBuf::from("out.bin")));
        assert_eq!(cli.workers, Some(8));
        assert!(cli.verbose);
        assert!(!cli.no_progress);
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[download]\nworkers = 2\nbuffer_size = 4096\n").unwrap();
        let path_str = path.to_str().unwrap();

        let cli = parse(&["http://example.com/f", "--config", path_str, "-w", "6"]);
        let config = resolve_config(&cli).unwrap();

        assert_eq!(config.workers, 6);
        assert_eq!(config.buffer_size, 4096);
    }

    #[test]
    fn test_zero_workers_flag_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "").unwrap();
        let path_str = path.to_str().unwrap();

        let cli = parse(&["http://example.com/f", "--config", path_str, "-w", "0"]);
        assert!(matches!(resolve_config(&cli), Err(CliError::Config(_))));
    }

    #[test]
    fn test_report_outcome_passes_report_through() {
        let report = DownloadReport {
            path: PathBuf::from("out.bin"),
            total_bytes: 1000,
            segments: 4,
            elapsed: Duration::from_millis(250),
        };

        assert_eq!(report_outcome(Ok(report.clone())).unwrap(), report);
    }

    #[test]
    fn test_report_outcome_partial_failure_exits_one() {
        let err = report_outcome(Err(DownloadError::PartialFailure {
            total: 4,
            failures: vec![SegmentFailure {
                index: 2,
                error: SegmentError::Fetch { status: 404 },
            }],
        }))
        .unwrap_err();

        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("segment 2"));
    }

    #[test]
    fn test_report_outcome_planning_error_exits_two() {
        let err = report_outcome(Err(DownloadError::UnknownLength {
            url: "http://example.com/f".to_string(),
        }))
        .unwrap_err();

        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.ini");
        let path_str = path.to_str().unwrap();

        let cli = parse(&["http://example.com/f", "--config", path_str]);
        assert!(matches!(resolve_config(&cli), Err(CliError::Config(_))));
    }
}
