use clap::{Parser, Subcommand};
use log::info;

use crate::config::StoreKind;
use crate::stock::{
    format_stock_record, format_stock_row, RecordSource, StockDirectory, StockRecord,
};

#[derive(Parser, Debug)]
#[command(
    name = "stock-dashboard",
    version,
    about = "Stock quotes and fundamentals with caching and offline fallback"
)]
pub struct Cli {
    /// Print records as JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Override the durable cache backend (STOCK_STORE)
    #[arg(long, global = true, value_enum)]
    pub store: Option<StoreKind>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List every stock on the watch list
    List,
    /// Show one stock in detail, e.g. `get AAPL`
    Get { symbol: String },
    /// Search stocks by symbol or company name
    Search { query: String },
    /// Serve the directory as a JSON HTTP API
    #[cfg(feature = "server")]
    Serve {
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },
}

pub async fn run(
    directory: StockDirectory,
    cli: &Cli,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("💬 Processing command: {:?}", cli.command);

    match &cli.command {
        Command::List => {
            let records = directory.list_stocks().await;
            if cli.json {
                return print_json(&records);
            }
            println!("Watch list: {}\n", directory.watch_list().join(", "));
            print_rows(&records);
        }
        Command::Get { symbol } => {
            let record = directory.get_stock(symbol).await;
            if cli.json {
                return print_json(&record);
            }
            println!("{}", format_stock_record(&record));
        }
        Command::Search { query } => {
            let records = directory.search_stocks(query).await;
            if cli.json {
                return print_json(&records);
            }
            if records.is_empty() {
                println!(
                    "No stocks match \"{}\" (queries need at least 2 characters)",
                    query.trim()
                );
            } else {
                print_rows(&records);
            }
        }
        #[cfg(feature = "server")]
        Command::Serve { port } => crate::server::serve(directory, *port).await?,
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_rows(records: &[StockRecord]) {
    println!(
        "{:<6} {:<28} {:>10} {:>9} {:>10}",
        "SYMBOL", "NAME", "PRICE", "CHANGE", "MKT CAP"
    );
    for record in records {
        println!("{}", format_stock_row(record));
    }

    let placeholders = records
        .iter()
        .filter(|r| r.source == RecordSource::Mock)
        .count();
    if placeholders > 0 {
        println!("\n⚠️ {placeholders} of {} rows are placeholder data", records.len());
    }
}
