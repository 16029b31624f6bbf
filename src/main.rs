use clap::Parser;
use log::{error, info};

mod commands;
mod config;
#[cfg(feature = "server")]
mod server;
mod stock;
mod storage;

use commands::Cli;
use config::AppConfig;
use stock::{format_stock_error, StockDirectory};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(kind) = cli.store {
        config.store.kind = kind;
    }

    info!("🚀 Starting stock dashboard (store: {:?})", config.store.kind);

    let directory = match StockDirectory::from_config(&config).await {
        Ok(directory) => directory,
        Err(e) => {
            error!("Startup failed: {e}");
            eprintln!("{}", format_stock_error(&e));
            std::process::exit(1);
        }
    };

    if let Err(e) = commands::run(directory, &cli).await {
        error!("Command failed: {e}");
        std::process::exit(1);
    }
}
