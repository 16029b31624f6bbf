use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use super::format::{format_market_cap, format_revenue, format_time_ago, format_volume};
use super::provider::{
    price_change, NewsItem, PerformancePoint, Recommendation, RecordSource, StockRecord,
    TechnicalIndicators,
};

const SECTORS: [&str; 7] = [
    "Technology",
    "Healthcare",
    "Financial Services",
    "Consumer Cyclical",
    "Communication Services",
    "Industrial",
    "Energy",
];

const INDUSTRIES: [&str; 9] = [
    "Software",
    "Semiconductors",
    "Biotechnology",
    "Banking",
    "Insurance",
    "Retail",
    "Telecommunications",
    "Automotive",
    "Oil & Gas",
];

const HEADLINES: [&str; 6] = [
    "{} beats quarterly earnings expectations",
    "Analysts raise price target on {}",
    "{} announces new product lineup",
    "Institutional investors increase stakes in {}",
    "{} shares move on sector rotation",
    "What to watch ahead of {} earnings",
];

/// Display names for well-known tickers
fn known_name(symbol: &str) -> Option<&'static str> {
    match symbol {
        "AAPL" => Some("Apple Inc."),
        "MSFT" => Some("Microsoft Corporation"),
        "GOOGL" => Some("Alphabet Inc."),
        "AMZN" => Some("Amazon.com Inc."),
        "META" => Some("Meta Platforms Inc."),
        "TSLA" => Some("Tesla Inc."),
        "NVDA" => Some("NVIDIA Corporation"),
        "JPM" => Some("JPMorgan Chase & Co."),
        "V" => Some("Visa Inc."),
        _ => None,
    }
}

/// Synthesizes plausible records when real data is unavailable. Cannot fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockDataGenerator;

impl MockDataGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, symbol: &str) -> StockRecord {
        let symbol = symbol.trim().to_uppercase();
        let name = known_name(&symbol)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{symbol} Holdings"));
        self.generate_named(&symbol, &name)
    }

    /// Same as `generate` but keeps a caller-supplied display name
    pub fn generate_named(&self, symbol: &str, name: &str) -> StockRecord {
        let mut rng = rand::thread_rng();
        let symbol = symbol.trim().to_uppercase();

        let price = random_price(&mut rng, 100.0);
        let previous_close = price * rng.gen_range(0.97..1.03);
        let (change, change_percent) = price_change(price, Some(previous_close));

        let revenue = rng.gen_range(1.0e9..1.0e11);
        let rsi = rng.gen_range(0.0..100.0);
        let momentum = rng.gen_range(-5.0..5.0);
        let sma10 = random_price(&mut rng, 95.0);

        StockRecord {
            name: name.to_string(),
            price,
            change,
            change_percent,
            volume: format_volume(rng.gen_range(1.0e5..1.0e8)),
            market_cap: format_market_cap(Some(rng.gen_range(1.0e9..1.0e12))),
            revenue: format_revenue(revenue),
            pe_ratio: format!("{:.2}", rng.gen_range(10.0..40.0)),
            eps: Some(rng.gen_range(1.0..15.0)),
            dividend_yield: Some(rng.gen_range(0.0..0.05)),
            sector: SECTORS.choose(&mut rng).map(|s| s.to_string()),
            industry: INDUSTRIES.choose(&mut rng).map(|s| s.to_string()),
            net_profit: Some(format_revenue(revenue * rng.gen_range(0.05..0.3))),
            eps_growth_yoy: Some(random_growth(&mut rng)),
            revenue_growth_yoy: Some(random_growth(&mut rng)),
            next_report_date: Some(
                (Utc::now() + Duration::days(rng.gen_range(1..=90)))
                    .format("%Y-%m-%d")
                    .to_string(),
            ),
            rsi: Some(format!("{rsi:.2}")),
            moving_average50: Some(format!("{:.2}", random_price(&mut rng, 98.0))),
            technical_indicators: Some(TechnicalIndicators {
                sma10: Some(sma10),
                rsi: Some(rsi),
                momentum: Some(momentum),
            }),
            recommendation: Some(Recommendation {
                strong_buy: rng.gen_range(0..15),
                buy: rng.gen_range(0..20),
                hold: rng.gen_range(0..15),
                sell: rng.gen_range(0..5),
                strong_sell: rng.gen_range(0..3),
            }),
            news: random_news(&mut rng, &symbol),
            performance_data: yearly_performance(&mut rng),
            symbol,
            source: RecordSource::Mock,
        }
    }
}

/// `base` ± 5 %
fn random_price(rng: &mut impl Rng, base: f64) -> f64 {
    base + (rng.gen_range(0.0..1.0) - 0.5) * base * 0.1
}

/// Skewed positive, roughly -12 % to +28 %
fn random_growth(rng: &mut impl Rng) -> f64 {
    (rng.gen_range(0.0..1.0) - 0.3) * 40.0
}

fn random_news(rng: &mut impl Rng, symbol: &str) -> Vec<NewsItem> {
    let now = Utc::now();
    let mut hours_ago = 0;
    let mut headlines: Vec<&str> = HEADLINES.to_vec();
    headlines.shuffle(rng);

    headlines
        .into_iter()
        .take(3)
        .map(|template| {
            hours_ago += rng.gen_range(2..30);
            NewsItem {
                title: template.replace("{}", symbol),
                time_ago: format_time_ago(now - Duration::hours(hours_ago), now),
            }
        })
        .collect()
}

fn yearly_performance(rng: &mut impl Rng) -> Vec<PerformancePoint> {
    let mut value = 100.0;
    (2019..=2024)
        .map(|year| {
            let point = PerformancePoint {
                period: year.to_string(),
                value: (value * 100.0_f64).round() / 100.0,
            };
            value *= 1.0 + rng.gen_range(-0.2..0.4);
            point
        })
        .collect()
}
