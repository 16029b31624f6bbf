use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;

use super::alpha_vantage::{cache_key, is_cacheable, HttpTransport, Transport};
use super::cache::CacheStore;
use super::format::format_time_ago;
use super::provider::{NewsItem, StockDataError};

pub const DEFAULT_NEWS_BASE_URL: &str = "https://finnhub.io/api/v1";

/// Headlines kept per record
const MAX_NEWS_ITEMS: usize = 5;
/// How far back company news is requested
const NEWS_WINDOW_DAYS: i64 = 7;

/// Finnhub settings, only present when `FINNHUB_API_KEY` is set
#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub api_key: String,
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout: u64,
}

/// Company headlines from Finnhub's `company-news` endpoint.
///
/// Responses share the provider's request cache, keyed by symbol and date window.
pub struct NewsFeed {
    transport: Arc<dyn Transport>,
    cache: CacheStore,
}

impl NewsFeed {
    pub fn new(config: &NewsConfig, cache: CacheStore) -> Result<Self, StockDataError> {
        let endpoint = format!("{}/company-news", config.base_url.trim_end_matches('/'));
        let transport =
            HttpTransport::with_key_param(endpoint, &config.api_key, "token", config.timeout)?;
        log::info!("Finnhub news feed initialized");
        Ok(Self::with_transport(Arc::new(transport), cache))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, cache: CacheStore) -> Self {
        Self { transport, cache }
    }

    /// Up to five headlines from the week before `now`, newest first
    pub async fn company_news(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<NewsItem>, StockDataError> {
        let to = now.format("%Y-%m-%d").to_string();
        let from = (now - Duration::days(NEWS_WINDOW_DAYS))
            .format("%Y-%m-%d")
            .to_string();
        let params = [("symbol", symbol), ("from", from.as_str()), ("to", to.as_str())];
        let key = format!("company-news:{}", cache_key(&params));

        let body = match self.cache.get_fresh::<Value>(&key).await {
            Some(body) => body,
            None => {
                let body = self.transport.get_json(&params).await?;
                if is_cacheable(&body) {
                    self.cache.put(&key, &body).await;
                }
                body
            }
        };

        map_news(&body, now)
    }
}

fn map_news(body: &Value, now: DateTime<Utc>) -> Result<Vec<NewsItem>, StockDataError> {
    let items = body.as_array().ok_or_else(|| {
        let reason = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("expected a list of articles");
        StockDataError::ParseError(format!("company news: {reason}"))
    })?;

    let mut articles: Vec<(DateTime<Utc>, String)> = items
        .iter()
        .filter_map(|item| {
            let headline = item.get("headline")?.as_str()?.trim();
            let published = DateTime::from_timestamp(item.get("datetime")?.as_i64()?, 0)?;
            (!headline.is_empty()).then(|| (published, headline.to_string()))
        })
        .collect();

    articles.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(articles
        .into_iter()
        .take(MAX_NEWS_ITEMS)
        .map(|(published, title)| NewsItem {
            title,
            time_ago: format_time_ago(published, now),
        })
        .collect())
}
