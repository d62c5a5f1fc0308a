use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Initialize host-side structured logging to `~/.local/state/wdm/wdm.log`.
///
/// Uses the XDG base directory spec via the `xdg` crate to locate the state
/// directory.
pub fn init_logging() -> Result<()> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("wdm")?;
    let log_dir = xdg_dirs.get_state_home();

    fs::create_dir_all(&log_dir)?;
    let log_file_path: PathBuf = log_dir.join("wdm.log");

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    // Simple writer that always clones the same file handle.
    struct FileMakeWriter(std::fs::File);

    impl<'a> MakeWriter<'a> for FileMakeWriter {
        type Writer = std::fs::File;

        fn make_writer(&'a self) -> Self::Writer {
            self.0.try_clone().expect("failed to clone log file handle")
        }
    }

    let writer: BoxMakeWriter = BoxMakeWriter::new(FileMakeWriter(file));

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wdm_core=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    tracing::info!("wdm logging initialized at {}", log_file_path.display());

    Ok(())
}

/// Worker-side logging. The worker's stdout carries the wire protocol, so
/// log output goes to stderr (inherited by the host).
pub fn init_worker_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
