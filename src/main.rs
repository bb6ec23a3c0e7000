use clap::Parser;
use tracing_subscriber::EnvFilter;
use unitflow::app::{self, Cli};

/// Log filter variable; defaults to `info`.
const LOG_ENV: &str = "UNITFLOW_LOG";

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    let code = match app::execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[unitflow] Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}
