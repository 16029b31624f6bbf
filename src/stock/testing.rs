//! Fakes shared by the provider and directory tests.

use super::alpha_vantage::Transport;
use super::provider::StockDataError;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Canned responses keyed by `function:symbol` (or `function:keywords`).
/// Requests without a `function` parameter are Finnhub news calls, keyed `NEWS:symbol`.
#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<HashMap<String, Result<Value, StockDataError>>>,
    calls: AtomicUsize,
    calls_by_function: Mutex<HashMap<String, usize>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, function: &str, subject: &str, response: Result<Value, StockDataError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(format!("{function}:{subject}"), response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, function: &str) -> usize {
        self.calls_by_function
            .lock()
            .unwrap()
            .get(function)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_json(&self, params: &[(&str, &str)]) -> Result<Value, StockDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let lookup = |name: &str| {
            params
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| *v)
                .unwrap_or_default()
        };
        let function = match lookup("function") {
            "" => "NEWS",
            function => function,
        };
        let subject = match lookup("symbol") {
            "" => lookup("keywords"),
            symbol => symbol,
        };

        *self
            .calls_by_function
            .lock()
            .unwrap()
            .entry(function.to_string())
            .or_default() += 1;

        self.responses
            .lock()
            .unwrap()
            .get(&format!("{function}:{subject}"))
            .cloned()
            .unwrap_or_else(|| {
                Err(StockDataError::NetworkError(format!(
                    "no fixture for {function}:{subject}"
                )))
            })
    }
}

pub fn overview_body(symbol: &str, name: &str) -> Value {
    json!({
        "Symbol": symbol,
        "Name": name,
        "Sector": "TECHNOLOGY",
        "Industry": "ELECTRONIC COMPUTERS",
        "MarketCapitalization": "2410000000000",
        "PERatio": "29.10",
        "EPS": "6.13",
        "DividendYield": "0.0055",
        "RevenueTTM": "383285000000",
        "ProfitMargin": "0.25",
        "QuarterlyEarningsGrowthYOY": "0.108",
        "QuarterlyRevenueGrowthYOY": "-0.014",
        "50DayMovingAverage": "182.30",
        "AnalystRatingStrongBuy": "12",
        "AnalystRatingBuy": "20",
        "AnalystRatingHold": "10",
        "AnalystRatingSell": "1",
        "AnalystRatingStrongSell": "0"
    })
}

pub fn quote_body(symbol: &str, price: &str, previous_close: &str) -> Value {
    json!({
        "Global Quote": {
            "01. symbol": symbol,
            "02. open": price,
            "05. price": price,
            "06. volume": "45200000",
            "07. latest trading day": "2024-01-03",
            "08. previous close": previous_close
        }
    })
}

pub fn series_body(days: &[(&str, &str)]) -> Value {
    let mut series = Map::new();
    for (date, close) in days {
        series.insert(date.to_string(), json!({ "4. close": close }));
    }
    json!({
        "Meta Data": { "1. Information": "Daily Prices" },
        "Time Series (Daily)": series
    })
}

pub fn indicator_body(function: &str, days: &[(&str, &str)]) -> Value {
    let mut analysis = Map::new();
    for (date, value) in days {
        let mut entry = Map::new();
        entry.insert(function.to_string(), json!(value));
        analysis.insert(date.to_string(), Value::Object(entry));
    }

    let mut body = Map::new();
    body.insert("Meta Data".to_string(), json!({ "2: Indicator": function }));
    body.insert(format!("Technical Analysis: {function}"), Value::Object(analysis));
    Value::Object(body)
}

pub fn news_body(items: &[(&str, i64)]) -> Value {
    Value::Array(
        items
            .iter()
            .map(|(headline, datetime)| {
                json!({
                    "category": "company",
                    "datetime": datetime,
                    "headline": headline,
                    "source": "Reuters"
                })
            })
            .collect(),
    )
}

/// Every Alpha Vantage sub-request for `symbol` answered with a complete body
pub fn full_transport(symbol: &str) -> Arc<FakeTransport> {
    let transport = FakeTransport::new();
    transport.respond("OVERVIEW", symbol, Ok(overview_body(symbol, "Apple Inc")));
    transport.respond("GLOBAL_QUOTE", symbol, Ok(quote_body(symbol, "150.00", "147.50")));
    transport.respond(
        "TIME_SERIES_DAILY",
        symbol,
        Ok(series_body(&[("2024-01-02", "185.64"), ("2024-01-03", "184.25")])),
    );
    transport.respond("SMA", symbol, Ok(indicator_body("SMA", &[("2024-01-03", "184.90")])));
    transport.respond("RSI", symbol, Ok(indicator_body("RSI", &[("2024-01-03", "56.78")])));
    transport.respond("MOM", symbol, Ok(indicator_body("MOM", &[("2024-01-03", "-1.39")])));
    Arc::new(transport)
}
