use chrono::Duration;
use log::{info, warn};
use std::env;
use std::path::PathBuf;

use crate::stock::news::{NewsConfig, DEFAULT_NEWS_BASE_URL};
use crate::stock::ProviderConfig;

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
pub const DEFAULT_WATCH_LIST: [&str; 6] = ["AAPL", "MSFT", "GOOGL", "AMZN", "META", "TSLA"];
pub const DEFAULT_CACHE_TTL_MINUTES: i64 = 30;

/// Which backend holds the durable cache tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreKind {
    Memory,
    File,
    #[value(name = "dynamodb")]
    DynamoDb,
}

impl StoreKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "memory" => Some(StoreKind::Memory),
            "file" => Some(StoreKind::File),
            "dynamodb" | "dynamo" => Some(StoreKind::DynamoDb),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// JSON file used by `StoreKind::File`
    pub path: PathBuf,
    /// Table used by `StoreKind::DynamoDb`
    pub table_name: Option<String>,
}

/// Everything the directory service needs at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    /// Finnhub headlines; records carry no news when unset
    pub news: Option<NewsConfig>,
    pub watch_list: Vec<String>,
    /// TTL shared by the request cache and the durable watch-list cache
    pub cache_ttl: Duration,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Read configuration from the process environment (after `.env` is loaded)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = match lookup("ALPHA_VANTAGE_API_KEY").filter(|k| !k.trim().is_empty()) {
            Some(key) => key,
            None => {
                warn!("ALPHA_VANTAGE_API_KEY not set, falling back to the rate-limited demo key");
                "demo".to_string()
            }
        };

        let timeout = parse_or(&lookup, "ALPHA_VANTAGE_TIMEOUT_SECS", 30);
        let provider = ProviderConfig {
            api_key,
            base_url: Some(
                lookup("ALPHA_VANTAGE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            ),
            timeout,
            // 0 means no local guard
            rate_limit: match parse_or(&lookup, "ALPHA_VANTAGE_RATE_LIMIT", 0u32) {
                0 => None,
                limit => Some(limit),
            },
        };

        let news = lookup("FINNHUB_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(|api_key| NewsConfig {
                api_key,
                base_url: lookup("FINNHUB_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_NEWS_BASE_URL.to_string()),
                timeout,
            });
        if news.is_none() {
            info!("FINNHUB_API_KEY not set, records will carry no news");
        }

        let watch_list = lookup("STOCK_WATCH_LIST")
            .map(|list| parse_watch_list(&list))
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| DEFAULT_WATCH_LIST.iter().map(|s| s.to_string()).collect());

        let ttl_minutes = parse_or(&lookup, "STOCK_CACHE_TTL_MINUTES", DEFAULT_CACHE_TTL_MINUTES);

        let kind = match lookup("STOCK_STORE") {
            Some(value) => StoreKind::parse(&value).unwrap_or_else(|| {
                warn!("Unknown STOCK_STORE value '{value}', using file store");
                StoreKind::File
            }),
            None => StoreKind::File,
        };

        let store = StoreConfig {
            kind,
            path: lookup("STOCK_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("stock_cache.json")),
            table_name: lookup("DYNAMODB_TABLE_NAME"),
        };

        Self {
            provider,
            news,
            watch_list,
            cache_ttl: Duration::minutes(ttl_minutes.max(0)),
            store,
        }
    }
}

/// Split a comma-separated list into uppercased, de-duplicated symbols
pub fn parse_watch_list(list: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in list.split(',').map(|s| s.trim().to_uppercase()) {
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid value '{raw}' for {key}, using default");
            default
        }),
        None => default,
    }
}
