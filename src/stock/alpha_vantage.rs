use super::cache::CacheStore;
use super::format::{format_market_cap, format_revenue, format_volume, NOT_AVAILABLE};
use super::news::NewsFeed;
use super::provider::{
    normalize_symbol, price_change, PerformancePoint, ProviderConfig, Recommendation,
    RecordSource, StockDataError, StockDataProvider, StockRecord, SymbolMatch,
    TechnicalIndicators,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Number of daily closes kept for the chart
const PERFORMANCE_POINTS: usize = 30;
/// Look-back window shared by the SMA, RSI and MOM requests
const INDICATOR_PERIOD: &str = "10";

/// Issues a single GET against the provider and returns the decoded body
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, params: &[(&str, &str)]) -> Result<Value, StockDataError>;
}

/// reqwest-backed transport; appends the API key to every request
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    key_param: &'static str,
}

impl HttpTransport {
    pub fn new(config: &ProviderConfig) -> Result<Self, StockDataError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| crate::config::DEFAULT_BASE_URL.to_string());
        Self::with_key_param(base_url, &config.api_key, "apikey", config.timeout)
    }

    /// Transport for an endpoint that expects the key under `key_param`
    pub fn with_key_param(
        base_url: String,
        api_key: &str,
        key_param: &'static str,
        timeout: u64,
    ) -> Result<Self, StockDataError> {
        if api_key.is_empty() {
            return Err(StockDataError::InvalidApiKey(
                "API key is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| {
                StockDataError::ConfigError(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            key_param,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, params: &[(&str, &str)]) -> Result<Value, StockDataError> {
        let mut query = params.to_vec();
        query.push((self.key_param, self.api_key.as_str()));

        let response = self.client.get(&self.base_url).query(&query).send().await?;
        if response.status().as_u16() == 429 {
            return Err(StockDataError::RateLimitExceeded(
                "HTTP 429 Too Many Requests".to_string(),
            ));
        }

        let body = response.error_for_status()?.json::<Value>().await?;
        Ok(body)
    }
}

/// Rate limiting state for Alpha Vantage API
#[derive(Debug)]
struct RateLimitState {
    requests_made: u32,
    window_start: Instant,
    requests_per_minute: Option<u32>,
}

impl RateLimitState {
    /// A limit of zero disables the guard
    fn new(requests_per_minute: Option<u32>) -> Self {
        Self {
            requests_made: 0,
            window_start: Instant::now(),
            requests_per_minute: requests_per_minute.filter(|limit| *limit > 0),
        }
    }
}

/// Alpha Vantage stock data provider
pub struct AlphaVantageProvider {
    transport: Arc<dyn Transport>,
    cache: CacheStore,
    rate_limit: Mutex<RateLimitState>,
    news: Option<NewsFeed>,
}

impl AlphaVantageProvider {
    /// Create a provider talking HTTP to the configured endpoint
    pub fn new(config: &ProviderConfig, cache: CacheStore) -> Result<Self, StockDataError> {
        let transport = HttpTransport::new(config)?;
        log::info!("Alpha Vantage provider initialized successfully");
        Ok(Self::with_transport(Arc::new(transport), cache, config.rate_limit))
    }

    pub fn with_transport(
        transport: Arc<dyn Transport>,
        cache: CacheStore,
        rate_limit: Option<u32>,
    ) -> Self {
        Self {
            transport,
            cache,
            rate_limit: Mutex::new(RateLimitState::new(rate_limit)),
            news: None,
        }
    }

    /// Attach headlines to every fetched record
    pub fn with_news(mut self, news: NewsFeed) -> Self {
        self.news = Some(news);
        self
    }

    /// Check and enforce rate limits
    async fn check_rate_limit(&self) -> Result<(), StockDataError> {
        let mut rate_limit = self.rate_limit.lock().await;
        let Some(limit) = rate_limit.requests_per_minute else {
            return Ok(());
        };
        let now = Instant::now();

        // Reset window if more than a minute has passed
        if now.duration_since(rate_limit.window_start) >= Duration::from_secs(60) {
            rate_limit.requests_made = 0;
            rate_limit.window_start = now;
        }

        if rate_limit.requests_made >= limit {
            let wait_time =
                Duration::from_secs(60) - now.duration_since(rate_limit.window_start);
            log::warn!("Rate limit exceeded, would need to wait {wait_time:?}");
            return Err(StockDataError::RateLimitExceeded(format!(
                "local limit of {limit} requests per minute"
            )));
        }

        rate_limit.requests_made += 1;
        Ok(())
    }

    /// Cache-aside GET: a fresh cached payload short-circuits the network
    async fn request(&self, params: &[(&str, &str)]) -> Result<Value, StockDataError> {
        let key = cache_key(params);
        if let Some(payload) = self.cache.get_fresh::<Value>(&key).await {
            return Ok(payload);
        }

        self.check_rate_limit().await?;
        log::debug!("Requesting {key}");

        let payload = self.transport.get_json(params).await?;
        detect_advisory(&payload)?;

        if is_cacheable(&payload) {
            self.cache.put(&key, &payload).await;
        }
        Ok(payload)
    }
}

/// Request signature used as the transient cache key (API key excluded)
pub fn cache_key(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Alpha Vantage answers 200 OK with an advisory body when throttling or rejecting a call
fn detect_advisory(payload: &Value) -> Result<(), StockDataError> {
    for field in ["Note", "Information"] {
        if let Some(message) = payload.get(field).and_then(Value::as_str) {
            return Err(StockDataError::RateLimitExceeded(message.to_string()));
        }
    }
    if let Some(message) = payload.get("Error Message").and_then(Value::as_str) {
        return Err(StockDataError::SymbolNotFound(message.to_string()));
    }
    Ok(())
}

/// Empty bodies (`{}`, `[]` or `{"Global Quote": {}}`) are not worth pinning for a whole TTL
pub fn is_cacheable(payload: &Value) -> bool {
    match payload {
        Value::Object(object) if !object.is_empty() => !object
            .values()
            .any(|v| v.as_object().is_some_and(Map::is_empty)),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

fn parse_number(raw: Option<&Value>) -> Result<f64, StockDataError> {
    let value = match raw {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| StockDataError::ParseError(format!("unrepresentable number {n}")))?,
        Some(Value::String(s)) => s
            .trim()
            .trim_end_matches('%')
            .parse::<f64>()
            .map_err(|e| StockDataError::ParseError(format!("'{s}': {e}")))?,
        Some(other) => {
            return Err(StockDataError::ParseError(format!("unexpected value {other}")));
        }
        None => return Err(StockDataError::ParseError("missing field".to_string())),
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(StockDataError::ParseError(format!("non-finite value {value}")))
    }
}

fn field(object: &Map<String, Value>, name: &str) -> Result<f64, StockDataError> {
    parse_number(object.get(name))
}

/// A missing and a legitimately reported zero look the same after this
fn number_or_zero(object: &Map<String, Value>, name: &str) -> f64 {
    field(object, name).unwrap_or_else(|e| {
        log::debug!("Field {name} defaulted to 0: {e}");
        0.0
    })
}

fn text(object: &Map<String, Value>, name: &str) -> Option<String> {
    object
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "None" && *s != "-")
        .map(str::to_string)
}

fn recommendation(overview: &Map<String, Value>) -> Option<Recommendation> {
    let count = |name: &str| field(overview, name).ok().map(|v| v.max(0.0) as u32);
    let counts = [
        count("AnalystRatingStrongBuy"),
        count("AnalystRatingBuy"),
        count("AnalystRatingHold"),
        count("AnalystRatingSell"),
        count("AnalystRatingStrongSell"),
    ];
    if counts.iter().all(Option::is_none) {
        return None;
    }
    let [strong_buy, buy, hold, sell, strong_sell] = counts.map(Option::unwrap_or_default);
    Some(Recommendation {
        strong_buy,
        buy,
        hold,
        sell,
        strong_sell,
    })
}

/// Last `PERFORMANCE_POINTS` daily closes, oldest first
fn performance_data(series: &Value) -> Vec<PerformancePoint> {
    let Some(days) = series.get("Time Series (Daily)").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut points: Vec<PerformancePoint> = days
        .iter()
        .filter_map(|(date, bar)| {
            let close = parse_number(bar.get("4. close")).ok()?;
            Some(PerformancePoint {
                period: date.clone(),
                value: close,
            })
        })
        .collect();

    points.sort_by(|a, b| a.period.cmp(&b.period));
    let skip = points.len().saturating_sub(PERFORMANCE_POINTS);
    points.split_off(skip)
}

fn indicator_params<'a>(function: &'a str, symbol: &'a str) -> [(&'a str, &'a str); 5] {
    [
        ("function", function),
        ("symbol", symbol),
        ("interval", "daily"),
        ("time_period", INDICATOR_PERIOD),
        ("series_type", "close"),
    ]
}

/// Value of `name` on the most recent date of a `Technical Analysis: *` block
fn latest_indicator(body: &Value, name: &str) -> Option<f64> {
    let days = body
        .as_object()?
        .iter()
        .find(|(key, _)| key.starts_with("Technical Analysis"))
        .and_then(|(_, days)| days.as_object())?;

    let (date, values) = days.iter().max_by(|a, b| a.0.cmp(b.0))?;
    parse_number(values.get(name))
        .map_err(|e| log::debug!("{name} on {date} unreadable: {e}"))
        .ok()
}

fn technical_indicators(
    sma: Option<&Value>,
    rsi: Option<&Value>,
    momentum: Option<&Value>,
) -> Option<TechnicalIndicators> {
    let indicators = TechnicalIndicators {
        sma10: sma.and_then(|body| latest_indicator(body, "SMA")),
        rsi: rsi.and_then(|body| latest_indicator(body, "RSI")),
        momentum: momentum.and_then(|body| latest_indicator(body, "MOM")),
    };

    if indicators == TechnicalIndicators::default() {
        None
    } else {
        Some(indicators)
    }
}

/// Secondary sub-requests degrade to `None` instead of failing the record
fn optional(result: Result<Value, StockDataError>, what: &str, symbol: &str) -> Option<Value> {
    result
        .map_err(|e| log::warn!("{what} unavailable for {symbol}: {e}"))
        .ok()
}

/// Combine the overview, quote and daily series into one record
fn map_record(
    symbol: &str,
    overview: &Value,
    quote: &Value,
    series: Option<&Value>,
) -> Result<StockRecord, StockDataError> {
    let quote = quote
        .get("Global Quote")
        .and_then(Value::as_object)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| StockDataError::IncompleteData(format!("no quote for {symbol}")))?;
    let overview = overview
        .as_object()
        .filter(|o| o.contains_key("Symbol"))
        .ok_or_else(|| StockDataError::IncompleteData(format!("no overview for {symbol}")))?;

    let price = number_or_zero(quote, "05. price");
    let (change, change_percent) = price_change(price, field(quote, "08. previous close").ok());

    let revenue = field(overview, "RevenueTTM").ok();
    let net_profit = match (revenue, field(overview, "ProfitMargin").ok()) {
        (Some(revenue), Some(margin)) => format_revenue(revenue * margin),
        _ => NOT_AVAILABLE.to_string(),
    };

    Ok(StockRecord {
        symbol: symbol.to_string(),
        name: text(overview, "Name").unwrap_or_else(|| symbol.to_string()),
        price,
        change,
        change_percent,
        volume: format_volume(number_or_zero(quote, "06. volume")),
        market_cap: format_market_cap(field(overview, "MarketCapitalization").ok()),
        revenue: revenue
            .map(format_revenue)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        pe_ratio: field(overview, "PERatio")
            .map(|pe| format!("{pe:.2}"))
            .unwrap_or_else(|_| NOT_AVAILABLE.to_string()),
        eps: Some(number_or_zero(overview, "EPS")),
        dividend_yield: Some(number_or_zero(overview, "DividendYield")),
        sector: text(overview, "Sector"),
        industry: text(overview, "Industry"),
        net_profit: Some(net_profit),
        eps_growth_yoy: Some(number_or_zero(overview, "QuarterlyEarningsGrowthYOY") * 100.0),
        revenue_growth_yoy: Some(
            number_or_zero(overview, "QuarterlyRevenueGrowthYOY") * 100.0,
        ),
        next_report_date: None,
        rsi: None,
        moving_average50: field(overview, "50DayMovingAverage")
            .ok()
            .map(|ma| format!("{ma:.2}")),
        technical_indicators: None,
        recommendation: recommendation(overview),
        news: Vec::new(),
        performance_data: series.map(performance_data).unwrap_or_default(),
        source: RecordSource::Provider,
    })
}

fn map_search(body: &Value) -> Result<Vec<SymbolMatch>, StockDataError> {
    let matches = body
        .get("bestMatches")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            StockDataError::IncompleteData("no bestMatches in search response".to_string())
        })?;

    let mut results: Vec<SymbolMatch> = matches
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|m| {
            let symbol = text(m, "1. symbol")?.to_uppercase();
            Some(SymbolMatch {
                name: text(m, "2. name").unwrap_or_else(|| symbol.clone()),
                region: text(m, "4. region").unwrap_or_default(),
                match_score: number_or_zero(m, "9. matchScore"),
                symbol,
            })
        })
        .collect();

    results.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
    Ok(results)
}

#[async_trait]
impl StockDataProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        "Alpha Vantage"
    }

    async fn fetch_stock(&self, symbol: &str) -> Result<StockRecord, StockDataError> {
        let symbol = normalize_symbol(symbol)?;
        log::debug!("Fetching stock data for symbol: {}", symbol);

        let overview_params = [("function", "OVERVIEW"), ("symbol", symbol.as_str())];
        let quote_params = [("function", "GLOBAL_QUOTE"), ("symbol", symbol.as_str())];
        let series_params = [
            ("function", "TIME_SERIES_DAILY"),
            ("symbol", symbol.as_str()),
            ("outputsize", "compact"),
        ];

        let sma_params = indicator_params("SMA", &symbol);
        let rsi_params = indicator_params("RSI", &symbol);
        let momentum_params = indicator_params("MOM", &symbol);

        let news = async {
            match &self.news {
                Some(feed) => feed.company_news(&symbol, Utc::now()).await,
                None => Ok(Vec::new()),
            }
        };

        let (overview, quote, series, sma, rsi, momentum, news) = tokio::join!(
            self.request(&overview_params),
            self.request(&quote_params),
            self.request(&series_params),
            self.request(&sma_params),
            self.request(&rsi_params),
            self.request(&momentum_params),
            news,
        );

        // A throttled sub-request wins over any other failure
        for result in [&overview, &quote] {
            if let Err(e @ StockDataError::RateLimitExceeded(_)) = result {
                return Err(e.clone());
            }
        }
        let overview = overview?;
        let quote = quote?;
        let series = optional(series, "Daily series", &symbol);

        let mut record = map_record(&symbol, &overview, &quote, series.as_ref())?;
        if let Some(indicators) = technical_indicators(
            optional(sma, "SMA", &symbol).as_ref(),
            optional(rsi, "RSI", &symbol).as_ref(),
            optional(momentum, "Momentum", &symbol).as_ref(),
        ) {
            record.rsi = indicators.rsi.map(|rsi| format!("{rsi:.2}"));
            record.technical_indicators = Some(indicators);
        }
        record.news = news.unwrap_or_else(|e| {
            log::warn!("News unavailable for {symbol}: {e}");
            Vec::new()
        });
        Ok(record)
    }

    async fn search_symbols(&self, keywords: &str) -> Result<Vec<SymbolMatch>, StockDataError> {
        let keywords = keywords.trim();
        let body = self
            .request(&[("function", "SYMBOL_SEARCH"), ("keywords", keywords)])
            .await?;
        map_search(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::testing::{
        full_transport, indicator_body, news_body, overview_body, quote_body, series_body,
        FakeTransport,
    };
    use chrono::Duration as TtlDuration;
    use serde_json::json;

    fn provider(transport: Arc<FakeTransport>) -> AlphaVantageProvider {
        AlphaVantageProvider::with_transport(
            transport,
            CacheStore::transient(TtlDuration::minutes(30)),
            None,
        )
    }

    #[tokio::test]
    async fn test_fetch_stock_maps_all_sub_responses() {
        let transport = full_transport("AAPL");
        let record = provider(transport.clone()).fetch_stock("aapl").await.unwrap();

        assert_eq!(record.symbol, "AAPL");
        assert_eq!(record.name, "Apple Inc");
        assert_eq!(record.price, 150.0);
        assert!((record.change.unwrap() - 2.5).abs() < 1e-9);
        assert!((record.change_percent.unwrap() - 1.694_915).abs() < 1e-4);
        assert_eq!(record.volume, "45.2M");
        assert_eq!(record.market_cap, "$2.41T");
        assert_eq!(record.revenue, "$383.3B");
        assert_eq!(record.pe_ratio, "29.10");
        assert_eq!(record.net_profit.as_deref(), Some("$95.8B"));
        assert_eq!(record.sector.as_deref(), Some("TECHNOLOGY"));
        assert_eq!(record.moving_average50.as_deref(), Some("182.30"));
        assert!((record.eps_growth_yoy.unwrap() - 10.8).abs() < 1e-9);
        assert_eq!(record.recommendation.as_ref().unwrap().buy, 20);
        assert_eq!(record.source, RecordSource::Provider);
        assert_eq!(record.performance_data.len(), 2);
        assert_eq!(record.performance_data[0].period, "2024-01-02");
        assert!(record.news.is_empty());
        assert_eq!(transport.calls(), 6);
    }

    #[tokio::test]
    async fn test_fetch_stock_maps_latest_indicators() {
        let transport = full_transport("AAPL");
        let record = provider(transport).fetch_stock("AAPL").await.unwrap();

        let indicators = record.technical_indicators.unwrap();
        assert_eq!(indicators.sma10, Some(184.9));
        assert_eq!(indicators.rsi, Some(56.78));
        assert_eq!(indicators.momentum, Some(-1.39));
        assert_eq!(record.rsi.as_deref(), Some("56.78"));
    }

    #[tokio::test]
    async fn test_failed_indicators_degrade_to_none() {
        let transport = FakeTransport::new();
        transport.respond("OVERVIEW", "AAPL", Ok(overview_body("AAPL", "Apple Inc")));
        transport.respond("GLOBAL_QUOTE", "AAPL", Ok(quote_body("AAPL", "150.00", "147.50")));
        transport.respond(
            "RSI",
            "AAPL",
            Ok(json!({"Information": "premium endpoint"})),
        );
        transport.respond("MOM", "AAPL", Ok(json!({})));

        let record = provider(Arc::new(transport)).fetch_stock("AAPL").await.unwrap();
        assert_eq!(record.technical_indicators, None);
        assert_eq!(record.rsi, None);
        assert_eq!(record.price, 150.0);
    }

    #[tokio::test]
    async fn test_partial_indicators_are_kept() {
        let transport = FakeTransport::new();
        transport.respond("OVERVIEW", "AAPL", Ok(overview_body("AAPL", "Apple Inc")));
        transport.respond("GLOBAL_QUOTE", "AAPL", Ok(quote_body("AAPL", "150.00", "147.50")));
        transport.respond("SMA", "AAPL", Ok(indicator_body("SMA", &[("2024-01-03", "184.90")])));

        let record = provider(Arc::new(transport)).fetch_stock("AAPL").await.unwrap();
        let indicators = record.technical_indicators.unwrap();
        assert_eq!(indicators.sma10, Some(184.9));
        assert_eq!(indicators.rsi, None);
        assert_eq!(record.rsi, None);
    }

    #[test]
    fn test_latest_indicator_picks_most_recent_date() {
        let body = indicator_body(
            "RSI",
            &[("2024-01-02", "40.00"), ("2024-01-04", "61.25"), ("2024-01-03", "50.00")],
        );
        assert_eq!(latest_indicator(&body, "RSI"), Some(61.25));
        assert_eq!(latest_indicator(&body, "SMA"), None);
        assert_eq!(latest_indicator(&json!({"Meta Data": {}}), "RSI"), None);
    }

    #[tokio::test]
    async fn test_fetch_stock_attaches_news() {
        let transport = full_transport("AAPL");
        let published = Utc::now() - TtlDuration::hours(3);
        transport.respond(
            "NEWS",
            "AAPL",
            Ok(news_body(&[("Apple unveils new chip", published.timestamp())])),
        );
        let cache = CacheStore::transient(TtlDuration::minutes(30));
        let provider = AlphaVantageProvider::with_transport(transport.clone(), cache.clone(), None)
            .with_news(NewsFeed::with_transport(transport.clone(), cache));

        let record = provider.fetch_stock("AAPL").await.unwrap();
        assert_eq!(record.news.len(), 1);
        assert_eq!(record.news[0].title, "Apple unveils new chip");
        assert_eq!(record.news[0].time_ago, "3 hours ago");
        assert_eq!(transport.calls_for("NEWS"), 1);
    }

    #[tokio::test]
    async fn test_failed_news_degrades_to_empty() {
        let transport = full_transport("AAPL");
        transport.respond(
            "NEWS",
            "AAPL",
            Err(StockDataError::NetworkError("connection refused".to_string())),
        );
        let cache = CacheStore::transient(TtlDuration::minutes(30));
        let provider = AlphaVantageProvider::with_transport(transport.clone(), cache.clone(), None)
            .with_news(NewsFeed::with_transport(transport.clone(), cache));

        let record = provider.fetch_stock("AAPL").await.unwrap();
        assert!(record.news.is_empty());
        assert_eq!(record.source, RecordSource::Provider);
    }

    #[tokio::test]
    async fn test_repeated_fetch_uses_request_cache() {
        let transport = full_transport("AAPL");
        let provider = provider(transport.clone());

        let first = provider.fetch_stock("AAPL").await.unwrap();
        let second = provider.fetch_stock("AAPL").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.calls(), 6);
    }

    #[tokio::test]
    async fn test_missing_overview_is_incomplete() {
        let transport = FakeTransport::new();
        transport.respond("OVERVIEW", "MSFT", Ok(json!({})));
        transport.respond("GLOBAL_QUOTE", "MSFT", Ok(quote_body("MSFT", "410.00", "400.00")));
        let transport = Arc::new(transport);
        let provider = provider(transport.clone());

        let result = provider.fetch_stock("MSFT").await;
        assert!(matches!(result, Err(StockDataError::IncompleteData(_))));

        // Empty bodies are never cached, so a retry reaches the network again
        let _ = provider.fetch_stock("MSFT").await;
        assert_eq!(transport.calls_for("OVERVIEW"), 2);
        assert_eq!(transport.calls_for("GLOBAL_QUOTE"), 1);
    }

    #[tokio::test]
    async fn test_empty_global_quote_is_incomplete() {
        let transport = FakeTransport::new();
        transport.respond("OVERVIEW", "XYZ", Ok(overview_body("XYZ", "Xyz Corp")));
        transport.respond("GLOBAL_QUOTE", "XYZ", Ok(json!({"Global Quote": {}})));
        let result = provider(Arc::new(transport)).fetch_stock("XYZ").await;
        assert!(matches!(result, Err(StockDataError::IncompleteData(_))));
    }

    #[tokio::test]
    async fn test_missing_series_degrades_to_empty_chart() {
        let transport = FakeTransport::new();
        transport.respond("OVERVIEW", "AAPL", Ok(overview_body("AAPL", "Apple Inc")));
        transport.respond("GLOBAL_QUOTE", "AAPL", Ok(quote_body("AAPL", "150.00", "147.50")));
        transport.respond(
            "TIME_SERIES_DAILY",
            "AAPL",
            Err(StockDataError::NetworkError("reset".to_string())),
        );

        let record = provider(Arc::new(transport)).fetch_stock("AAPL").await.unwrap();
        assert!(record.performance_data.is_empty());
        assert_eq!(record.price, 150.0);
    }

    #[tokio::test]
    async fn test_rate_limit_note_is_detected() {
        let transport = FakeTransport::new();
        let note = json!({
            "Note": "Thank you for using Alpha Vantage! \
                     Our standard API call frequency is 5 calls per minute"
        });
        transport.respond("OVERVIEW", "AAPL", Ok(json!({})));
        transport.respond("GLOBAL_QUOTE", "AAPL", Ok(note));
        let transport = Arc::new(transport);
        let provider = provider(transport.clone());

        let result = provider.fetch_stock("AAPL").await;
        assert!(matches!(result, Err(StockDataError::RateLimitExceeded(_))));

        // Advisory bodies are not cached
        let _ = provider.fetch_stock("AAPL").await;
        assert_eq!(transport.calls_for("GLOBAL_QUOTE"), 2);
    }

    #[tokio::test]
    async fn test_information_advisory_is_rate_limit() {
        let transport = FakeTransport::new();
        transport.respond(
            "OVERVIEW",
            "AAPL",
            Ok(json!({"Information": "daily limit reached"})),
        );
        transport.respond("GLOBAL_QUOTE", "AAPL", Ok(quote_body("AAPL", "1", "1")));
        let result = provider(Arc::new(transport)).fetch_stock("AAPL").await;
        assert!(matches!(result, Err(StockDataError::RateLimitExceeded(_))));
    }

    #[tokio::test]
    async fn test_network_error_is_distinct_from_rate_limit() {
        let transport = FakeTransport::new();
        transport.respond(
            "OVERVIEW",
            "AAPL",
            Err(StockDataError::NetworkError("timeout".to_string())),
        );
        transport.respond("GLOBAL_QUOTE", "AAPL", Ok(quote_body("AAPL", "1", "1")));
        let result = provider(Arc::new(transport)).fetch_stock("AAPL").await;
        assert!(matches!(result, Err(StockDataError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_local_rate_limit_guard() {
        let transport = full_transport("AAPL");
        let provider = AlphaVantageProvider::with_transport(
            transport.clone(),
            CacheStore::transient(TtlDuration::minutes(30)),
            Some(6),
        );

        assert!(provider.fetch_stock("AAPL").await.is_ok());

        let result = provider.fetch_stock("MSFT").await;
        assert!(matches!(result, Err(StockDataError::RateLimitExceeded(_))));

        // Cache hits do not count against the quota
        assert!(provider.fetch_stock("AAPL").await.is_ok());
        assert_eq!(transport.calls(), 6);
    }

    #[tokio::test]
    async fn test_zero_rate_limit_disables_guard() {
        let transport = full_transport("AAPL");
        let provider = AlphaVantageProvider::with_transport(
            transport.clone(),
            CacheStore::transient(TtlDuration::minutes(30)),
            Some(0),
        );

        let record = provider.fetch_stock("AAPL").await.unwrap();
        assert_eq!(record.source, RecordSource::Provider);
        assert_eq!(transport.calls(), 6);
    }

    #[test]
    fn test_malformed_fields_default() {
        let mut overview = overview_body("AAPL", "Apple Inc");
        overview["PERatio"] = json!("None");
        overview["MarketCapitalization"] = json!("-");
        overview["EPS"] = json!("n/a");
        let quote = json!({"Global Quote": {
            "01. symbol": "AAPL",
            "05. price": "abc",
            "08. previous close": "0.0000"
        }});

        let record = map_record("AAPL", &overview, &quote, None).unwrap();
        assert_eq!(record.price, 0.0);
        assert_eq!(record.change, None);
        assert_eq!(record.change_percent, None);
        assert_eq!(record.pe_ratio, "N/A");
        assert_eq!(record.market_cap, "N/A");
        assert_eq!(record.eps, Some(0.0));
        assert_eq!(record.volume, "0");
    }

    #[test]
    fn test_parse_number_variants() {
        assert_eq!(parse_number(Some(&json!("1.25"))).unwrap(), 1.25);
        assert_eq!(parse_number(Some(&json!("0.5%"))).unwrap(), 0.5);
        assert_eq!(parse_number(Some(&json!(7))).unwrap(), 7.0);
        assert!(parse_number(Some(&json!("NaN"))).is_err());
        assert!(parse_number(Some(&json!(null))).is_err());
        assert!(parse_number(None).is_err());
    }

    #[test]
    fn test_performance_data_keeps_latest_points() {
        let days: Vec<(String, String)> = (1..=40)
            .map(|d| (format!("2024-02-{d:02}"), format!("{d}.0")))
            .collect();
        let refs: Vec<(&str, &str)> =
            days.iter().map(|(d, c)| (d.as_str(), c.as_str())).collect();

        let points = performance_data(&series_body(&refs));
        assert_eq!(points.len(), PERFORMANCE_POINTS);
        assert_eq!(points.first().unwrap().value, 11.0);
        assert_eq!(points.last().unwrap().value, 40.0);
    }

    #[test]
    fn test_cache_key_excludes_api_key() {
        let key = cache_key(&[("function", "GLOBAL_QUOTE"), ("symbol", "AAPL")]);
        assert_eq!(key, "function=GLOBAL_QUOTE&symbol=AAPL");
    }

    #[test]
    fn test_is_cacheable() {
        assert!(!is_cacheable(&json!({})));
        assert!(!is_cacheable(&json!({"Global Quote": {}})));
        assert!(is_cacheable(&json!({"bestMatches": []})));
        assert!(!is_cacheable(&json!([])));
        assert!(is_cacheable(&json!([{"headline": "x"}])));
        assert!(is_cacheable(&overview_body("AAPL", "Apple Inc")));
    }

    #[tokio::test]
    async fn test_search_symbols_sorted_by_score() {
        let transport = FakeTransport::new();
        transport.respond(
            "SYMBOL_SEARCH",
            "micro",
            Ok(json!({"bestMatches": [
                {
                    "1. symbol": "MCHP",
                    "2. name": "Microchip Technology",
                    "4. region": "United States",
                    "9. matchScore": "0.4000"
                },
                {
                    "1. symbol": "MSFT",
                    "2. name": "Microsoft Corporation",
                    "4. region": "United States",
                    "9. matchScore": "0.6154"
                },
                {"2. name": "no symbol"}
            ]})),
        );

        let matches = provider(Arc::new(transport))
            .search_symbols(" micro ")
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].symbol, "MSFT");
        assert_eq!(matches[1].symbol, "MCHP");
        assert_eq!(matches[0].region, "United States");
    }

    #[tokio::test]
    async fn test_search_without_matches_field_fails() {
        let transport = FakeTransport::new();
        transport.respond("SYMBOL_SEARCH", "zz", Ok(json!({"unexpected": true})));
        let result = provider(Arc::new(transport)).search_symbols("zz").await;
        assert!(matches!(result, Err(StockDataError::IncompleteData(_))));
    }

    #[test]
    fn test_http_transport_requires_api_key() {
        let result = HttpTransport::new(&ProviderConfig::default());
        assert!(matches!(result, Err(StockDataError::InvalidApiKey(_))));

        let config = ProviderConfig {
            api_key: "test_key".to_string(),
            ..Default::default()
        };
        assert!(HttpTransport::new(&config).is_ok());
    }
}
