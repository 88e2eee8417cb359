use clap::Parser;
use hydro_app::app::{run, AppConfig};
use hydro_app::cli::Args;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env()
        .unwrap_or_default()
        .with_data_dir(args.data_dir)
        .with_api_url(args.api_url);
    if let Err(err) = run(config, args.command) {
        eprintln!("hydro: {err:#}");
        std::process::exit(1);
    }
}
