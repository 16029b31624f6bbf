use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

/// Error types for stock data operations
#[derive(Debug, Clone, PartialEq)]
pub enum StockDataError {
    /// API key is missing or invalid
    InvalidApiKey(String),
    /// Transport failure
    NetworkError(String),
    /// Malformed field or body
    ParseError(String),
    /// Provider quota exceeded, either reported upstream or by the local guard
    RateLimitExceeded(String),
    /// A required sub-response (quote or overview) is missing
    IncompleteData(String),
    /// Stock symbol not found
    SymbolNotFound(String),
    /// Invalid stock symbol
    InvalidSymbol(String),
    /// Configuration error
    ConfigError(String),
}

impl StockDataError {
    /// Errors reported by the provider itself rather than the transport
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            StockDataError::RateLimitExceeded(_)
                | StockDataError::IncompleteData(_)
                | StockDataError::SymbolNotFound(_)
        )
    }
}

impl fmt::Display for StockDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockDataError::InvalidApiKey(msg) => write!(f, "Invalid API key: {}", msg),
            StockDataError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            StockDataError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            StockDataError::RateLimitExceeded(msg) => write!(f, "Rate limit exceeded: {}", msg),
            StockDataError::IncompleteData(msg) => write!(f, "Incomplete data: {}", msg),
            StockDataError::SymbolNotFound(symbol) => write!(f, "Symbol not found: {}", symbol),
            StockDataError::InvalidSymbol(symbol) => write!(f, "Invalid symbol: {}", symbol),
            StockDataError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for StockDataError {}

impl From<reqwest::Error> for StockDataError {
    fn from(error: reqwest::Error) -> Self {
        if error.status().map(|s| s.as_u16()) == Some(429) {
            StockDataError::RateLimitExceeded(error.to_string())
        } else if error.is_decode() {
            StockDataError::ParseError(error.to_string())
        } else {
            StockDataError::NetworkError(error.to_string())
        }
    }
}

impl From<serde_json::Error> for StockDataError {
    fn from(error: serde_json::Error) -> Self {
        StockDataError::ParseError(error.to_string())
    }
}

/// Where a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    #[default]
    Provider,
    Mock,
}

/// A headline attached to a record, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub time_ago: String,
}

/// One point of the price chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformancePoint {
    /// Date or year label
    pub period: String,
    pub value: f64,
}

/// Pass-through indicator values, never computed locally
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub sma10: Option<f64>,
    pub rsi: Option<f64>,
    pub momentum: Option<f64>,
}

/// Analyst rating counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub strong_buy: u32,
    pub buy: u32,
    pub hold: u32,
    pub sell: u32,
    pub strong_sell: u32,
}

/// Canonical stock record shared by the provider, mock generator and caches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    /// Uppercased exchange ticker (e.g., "AAPL")
    pub symbol: String,
    /// Display name
    pub name: String,
    /// Current price
    pub price: f64,
    /// Price change from previous close, `None` when the previous close is unknown or zero
    pub change: Option<f64>,
    /// Percentage change from previous close
    pub change_percent: Option<f64>,
    /// Formatted trading volume
    pub volume: String,
    /// Formatted market capitalization
    pub market_cap: String,
    /// Formatted trailing revenue
    pub revenue: String,
    /// Price/earnings ratio as displayed
    pub pe_ratio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_profit: Option<String>,
    /// Year-over-year EPS growth in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eps_growth_yoy: Option<f64>,
    /// Year-over-year revenue growth in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_growth_yoy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_report_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moving_average50: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_indicators: Option<TechnicalIndicators>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
    #[serde(default)]
    pub news: Vec<NewsItem>,
    #[serde(default)]
    pub performance_data: Vec<PerformancePoint>,
    #[serde(default)]
    pub source: RecordSource,
}

/// A single hit from the provider's symbol search
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: String,
    pub region: String,
    pub match_score: f64,
}

/// Derive `(change, change_percent)` from the current price and previous close
pub fn price_change(price: f64, previous_close: Option<f64>) -> (Option<f64>, Option<f64>) {
    match previous_close {
        Some(previous) if previous != 0.0 => {
            let change = price - previous;
            (Some(change), Some(change / previous * 100.0))
        }
        _ => (None, None),
    }
}

/// Normalize user input into the key form used for lookups
pub fn normalize_symbol(symbol: &str) -> Result<String, StockDataError> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(StockDataError::InvalidSymbol(
            "Symbol cannot be empty".to_string(),
        ));
    }
    Ok(symbol)
}

/// Configuration for stock data providers
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API key for the provider
    pub api_key: String,
    /// Base URL for API requests (optional override)
    pub base_url: Option<String>,
    /// Request timeout in seconds
    pub timeout: u64,
    /// Local quota guard (requests per minute)
    pub rate_limit: Option<u32>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            timeout: 30,
            rate_limit: None,
        }
    }
}

/// Trait for stock data providers
#[async_trait]
pub trait StockDataProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Fetch a complete record for a single stock
    async fn fetch_stock(&self, symbol: &str) -> Result<StockRecord, StockDataError>;

    /// Search symbols by keywords, best match first
    async fn search_symbols(&self, keywords: &str) -> Result<Vec<SymbolMatch>, StockDataError>;
}
