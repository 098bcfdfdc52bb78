// src/main.rs

use batchdag::{cli, logging, run};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        error!("{err:#}");
        eprintln!("batchdag error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level, args.log.as_deref())?;
    info!(args = ?std::env::args().collect::<Vec<_>>(), "batchdag invoked");
    run(args).await
}
