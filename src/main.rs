use std::process;

use clap::Parser;
use omni_gen::job::JobError;
use omni_gen::Cli;

/// Exit status after Ctrl-C, following the shell convention of 128 + SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays a clean list of output URLs.
    // RUST_LOG selects the level; warn when unset.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        eprintln!("Error: {e}");

        let mut source = e.source();
        while let Some(err) = source {
            eprintln!("  Caused by: {err}");
            source = err.source();
        }

        let code = match e.downcast_ref::<JobError>() {
            Some(JobError::Cancelled { .. }) => EXIT_INTERRUPTED,
            _ => 1,
        };
        process::exit(code);
    }
}
