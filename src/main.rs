use dropsort::cli::{Args, RunOptions, run_cli};
use dropsort::config::Settings;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = Args::parse_args();
    init_tracing(args.verbose);

    let result = Settings::load(args.config.as_deref())
        .map_err(dropsort::CliError::from)
        .and_then(|settings| RunOptions::resolve(&args, settings))
        .and_then(|options| run_cli(args.command(), &options));

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr; `RUST_LOG` takes precedence over `-v`.
fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "dropsort=warn",
        1 => "dropsort=debug",
        _ => "dropsort=trace",
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
