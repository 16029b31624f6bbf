use futures_util::future::join_all;
use std::sync::Arc;

use super::alpha_vantage::AlphaVantageProvider;
use super::cache::CacheStore;
use super::format::{format_growth, format_recommendation};
use super::mock::MockDataGenerator;
use super::news::NewsFeed;
use super::provider::{normalize_symbol, StockDataError, StockDataProvider, StockRecord};
use crate::config::AppConfig;
use crate::storage::{create_storage, StorageError};

/// Queries shorter than this never reach the provider
pub const MIN_QUERY_LEN: usize = 2;
/// Number of search hits enriched into full records
pub const MAX_SEARCH_RESULTS: usize = 5;

/// One step of a symbol's fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Provider,
    DurableCache,
    Mock,
}

/// Chain used for batch members: a failed fetch turns straight into mock data
const BATCH_CHAIN: [Resolution; 2] = [Resolution::Provider, Resolution::Mock];
/// Chain used for single lookups
const LOOKUP_CHAIN: [Resolution; 3] = [
    Resolution::Provider,
    Resolution::DurableCache,
    Resolution::Mock,
];

/// Directory of stocks over a provider, a durable watch-list cache and the mock generator.
///
/// None of the public operations fail: provider and storage errors are absorbed
/// and replaced by cached or generated records.
pub struct StockDirectory {
    provider: Arc<dyn StockDataProvider>,
    durable: CacheStore,
    mock: MockDataGenerator,
    watch_list: Vec<String>,
}

impl StockDirectory {
    pub fn new(
        provider: Arc<dyn StockDataProvider>,
        durable: CacheStore,
        watch_list: Vec<String>,
    ) -> Self {
        Self {
            provider,
            durable,
            mock: MockDataGenerator::new(),
            watch_list,
        }
    }

    /// Wire the Alpha Vantage provider, its request cache and the configured durable store
    pub async fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let request_cache = CacheStore::transient(config.cache_ttl);
        let mut provider = AlphaVantageProvider::new(&config.provider, request_cache.clone())?;
        if let Some(news) = &config.news {
            provider = provider.with_news(NewsFeed::new(news, request_cache)?);
        }

        let backend = create_storage(&config.store).await?;
        let durable = CacheStore::new("durable", backend, config.cache_ttl);

        log::info!(
            "Stock directory ready: provider={}, watch list={}, ttl={}m",
            provider.name(),
            config.watch_list.join(","),
            durable.ttl().num_minutes()
        );
        Ok(Self::new(Arc::new(provider), durable, config.watch_list.clone()))
    }

    pub fn watch_list(&self) -> &[String] {
        &self.watch_list
    }

    /// Durable key for the current watch-list
    fn batch_key(&self) -> String {
        format!("stocks_cache:{}", self.watch_list.join(","))
    }

    /// Records for every watch-list symbol, in watch-list order
    pub async fn list_stocks(&self) -> Vec<StockRecord> {
        let key = self.batch_key();
        if let Some(records) = self.durable.get_fresh::<Vec<StockRecord>>(&key).await {
            log::info!("Serving {} stocks from durable cache", records.len());
            return records;
        }

        log::info!("Refreshing {} watch-list stocks", self.watch_list.len());
        let records = join_all(
            self.watch_list
                .iter()
                .map(|symbol| self.resolve(symbol, None, &BATCH_CHAIN)),
        )
        .await;

        self.durable.put(&key, &records).await;
        records
    }

    /// Record for one symbol; never fails
    pub async fn get_stock(&self, symbol: &str) -> StockRecord {
        self.resolve(symbol, None, &LOOKUP_CHAIN).await
    }

    /// Provider search enriched into full records, with a local fallback
    pub async fn search_stocks(&self, query: &str) -> Vec<StockRecord> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Vec::new();
        }

        match self.provider.search_symbols(query).await {
            Ok(matches) => {
                log::info!("Search '{query}' matched {} symbols", matches.len());
                join_all(
                    matches
                        .iter()
                        .take(MAX_SEARCH_RESULTS)
                        .map(|m| self.resolve(&m.symbol, Some(m.name.as_str()), &BATCH_CHAIN)),
                )
                .await
            }
            Err(e) => {
                log::warn!("Symbol search for '{query}' failed, searching cached stocks: {e}");
                self.search_cached(query).await
            }
        }
    }

    /// Case-insensitive substring match on symbol or name over the durable batch
    async fn search_cached(&self, query: &str) -> Vec<StockRecord> {
        let needle = query.to_lowercase();
        self.cached_batch()
            .await
            .into_iter()
            .filter(|r| {
                r.symbol.to_lowercase().contains(&needle) || r.name.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Durable batch regardless of age
    async fn cached_batch(&self) -> Vec<StockRecord> {
        self.durable
            .get::<Vec<StockRecord>>(&self.batch_key())
            .await
            .unwrap_or_default()
    }

    /// Walk `chain` in order and return the first record produced
    async fn resolve(&self, symbol: &str, name: Option<&str>, chain: &[Resolution]) -> StockRecord {
        let symbol = match normalize_symbol(symbol) {
            Ok(symbol) => symbol,
            Err(e) => {
                log::warn!("{e}, generating placeholder");
                return self.mock.generate(symbol);
            }
        };

        for step in chain {
            match self.try_resolve(*step, &symbol, name).await {
                Ok(record) => return record,
                Err(e) if e.is_provider_error() => {
                    log::warn!("{step:?} rejected {symbol}: {e}")
                }
                Err(e) => log::warn!("{step:?} could not reach data for {symbol}: {e}"),
            }
        }

        // Every chain ends in Mock, which cannot fail
        self.mock.generate(&symbol)
    }

    async fn try_resolve(
        &self,
        step: Resolution,
        symbol: &str,
        name: Option<&str>,
    ) -> Result<StockRecord, StockDataError> {
        match step {
            Resolution::Provider => {
                let record = self.provider.fetch_stock(symbol).await?;
                log::info!("Fetched {symbol} from {}: ${:.2}", self.provider.name(), record.price);
                Ok(record)
            }
            Resolution::DurableCache => self
                .cached_batch()
                .await
                .into_iter()
                .find(|r| r.symbol == symbol)
                .ok_or_else(|| {
                    StockDataError::SymbolNotFound(format!("{symbol} not in durable cache"))
                }),
            Resolution::Mock => Ok(match name {
                Some(name) => self.mock.generate_named(symbol, name),
                None => self.mock.generate(symbol),
            }),
        }
    }
}

/// Failures while wiring the directory at startup
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Provider(#[from] StockDataError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Format stock record for display
pub fn format_stock_record(record: &StockRecord) -> String {
    let change = record.change.unwrap_or(0.0);

    // Determine emoji based on price change
    let trend_emoji = if change > 0.0 {
        "📈"
    } else if change < 0.0 {
        "📉"
    } else {
        "➡️"
    };

    let change_str = match (record.change, record.change_percent) {
        (Some(change), Some(percent)) => {
            let sign = if change >= 0.0 { "+" } else { "-" };
            let percent_sign = if percent >= 0.0 { "+" } else { "" };
            format!("{sign}${:.2}, {percent_sign}{percent:.2}%", change.abs())
        }
        _ => "N/A".to_string(),
    };

    let mut out = format!(
        "{} {} ({})\n\nPrice: ${:.2} ({})\nVolume: {}\nMarket Cap: {}\nRevenue: {}\nP/E: {}",
        trend_emoji,
        record.symbol,
        record.name,
        record.price,
        change_str,
        record.volume,
        record.market_cap,
        record.revenue,
        record.pe_ratio,
    );

    if let (Some(sector), Some(industry)) = (&record.sector, &record.industry) {
        out.push_str(&format!("\nSector: {sector} / {industry}"));
    }
    out.push_str(&format!(
        "\nEPS growth: {}\nRevenue growth: {}\nAnalysts: {}",
        format_growth(record.eps_growth_yoy),
        format_growth(record.revenue_growth_yoy),
        format_recommendation(record.recommendation.as_ref()),
    ));

    if let Some(indicators) = &record.technical_indicators {
        let value = |v: Option<f64>| v.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"));
        out.push_str(&format!(
            "
SMA(10): {} | RSI: {} | Momentum: {}",
            value(indicators.sma10),
            value(indicators.rsi),
            value(indicators.momentum),
        ));
    }

    if !record.news.is_empty() {
        out.push_str("\n\nNews:");
        for item in &record.news {
            out.push_str(&format!("\n• {} ({})", item.title, item.time_ago));
        }
    }

    let source = match record.source {
        super::provider::RecordSource::Provider => "Data provided by Alpha Vantage",
        super::provider::RecordSource::Mock => "⚠️ Placeholder data, provider unavailable",
    };
    out.push_str(&format!("\n\n{source}"));
    out
}

/// One line per record for listings
pub fn format_stock_row(record: &StockRecord) -> String {
    let percent = record
        .change_percent
        .map(|p| format_growth(Some(p)))
        .unwrap_or_else(|| "N/A".to_string());
    format!(
        "{:<6} {:<28} {:>10.2} {:>9} {:>10}",
        record.symbol,
        truncate(&record.name, 28),
        record.price,
        percent,
        record.market_cap
    )
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

/// Format error messages for user display
pub fn format_stock_error(error: &StartupError) -> String {
    match error {
        StartupError::Provider(StockDataError::InvalidApiKey(_)) => {
            "🔑 API configuration error\nSet ALPHA_VANTAGE_API_KEY and try again.".to_string()
        }
        StartupError::Provider(StockDataError::ConfigError(msg)) => {
            format!("⚙️ Configuration error\n{msg}")
        }
        StartupError::Storage(e) => {
            format!("🗃️ Cache store unavailable\n{e}")
        }
        StartupError::Provider(e) => {
            format!("🔧 Service temporarily unavailable\n{e}")
        }
    }
}
