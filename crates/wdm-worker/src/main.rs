//! wdm-worker entry point: serves transcode requests over stdin/stdout.
//!
//! stdout is reserved for the wire protocol; logs go to stderr, which the
//! host inherits into its own log stream.

use tokio::io::BufReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wdm_core::logging::init_worker_logging();

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    wdm_worker::service::run(stdin, stdout).await
}
