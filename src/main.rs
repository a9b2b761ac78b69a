mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;

use html2pdf_lib::Context;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use commands::run_convert;

fn main() -> ExitCode {
    let args = cli::parse();
    init_tracing(args.verbose, args.quiet);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start async runtime: {err}");
            return ExitCode::from(2);
        }
    };
    let code = runtime.block_on(run(args));
    // A stdin read abandoned on Ctrl-C still occupies a blocking thread that
    // cannot be interrupted; do not wait for it.
    runtime.shutdown_background();
    code
}

async fn run(args: cli::Cli) -> ExitCode {
    let ctx = Context::background();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; cancelling conversion");
            interrupt.cancel();
        }
    });

    run_convert(args, ctx).await
}

/// Diagnostics go to stderr so stdout stays a clean report. `RUST_LOG`
/// takes precedence over the flags.
fn init_tracing(verbose: bool, quiet: bool) {
    let default_directive = match (verbose, quiet) {
        (true, _) => "html2pdf=debug,html2pdf_lib=debug,warn",
        (_, true) => "error",
        _ => "warn",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
