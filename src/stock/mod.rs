/// Stock market data functionality
pub mod alpha_vantage;
pub mod cache;
pub mod format;
pub mod mock;
pub mod news;
pub mod provider;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use provider::{ProviderConfig, RecordSource, StockRecord};
pub use service::{format_stock_error, format_stock_record, format_stock_row, StockDirectory};
