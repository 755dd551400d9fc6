use clap::Parser;
use reverie::{cli, errors};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr)
        .init();

    let color = !cli.no_color && console::colors_enabled();
    let result = match cli.command {
        cli::Commands::Analyze(args) => cli::analyze::handle_analyze(args, cli.quiet, color).await,
        cli::Commands::Validate(args) => cli::validate::handle_validate(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let exit_code = match &e {
            errors::ReverieError::Config(_) => 2,
            errors::ReverieError::Yaml(_) => 2,
            errors::ReverieError::Authentication(_) => 4,
            errors::ReverieError::InvalidTarget(_) => 5,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}
