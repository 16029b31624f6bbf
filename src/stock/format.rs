use chrono::{DateTime, Utc};

use super::provider::Recommendation;

/// Placeholder shown wherever a value is missing or unparseable
pub const NOT_AVAILABLE: &str = "N/A";

/// Format market capitalization, e.g. `$2.41T`
pub fn format_market_cap(market_cap: Option<f64>) -> String {
    let Some(market_cap) = market_cap else {
        return NOT_AVAILABLE.to_string();
    };

    if market_cap >= 1_000_000_000_000.0 {
        format!("${:.2}T", market_cap / 1_000_000_000_000.0)
    } else if market_cap >= 1_000_000_000.0 {
        format!("${:.2}B", market_cap / 1_000_000_000.0)
    } else if market_cap >= 1_000_000.0 {
        format!("${:.2}M", market_cap / 1_000_000.0)
    } else {
        format!("${}", group_thousands(market_cap.round() as i64))
    }
}

/// Format trading volume, e.g. `45.2M`
pub fn format_volume(volume: f64) -> String {
    if volume >= 1_000_000_000.0 {
        format!("{:.1}B", volume / 1_000_000_000.0)
    } else if volume >= 1_000_000.0 {
        format!("{:.1}M", volume / 1_000_000.0)
    } else if volume >= 1_000.0 {
        format!("{:.1}K", volume / 1_000.0)
    } else {
        format!("{volume:.0}")
    }
}

/// Format revenue or profit figures, e.g. `$383.3B`
pub fn format_revenue(revenue: f64) -> String {
    if revenue >= 1_000_000_000.0 {
        format!("${:.1}B", revenue / 1_000_000_000.0)
    } else if revenue >= 1_000_000.0 {
        format!("${:.1}M", revenue / 1_000_000.0)
    } else {
        format!("${revenue:.2}")
    }
}

/// Format a growth percentage with an explicit sign, e.g. `+8.10%`
pub fn format_growth(growth: Option<f64>) -> String {
    match growth {
        Some(growth) => {
            let sign = if growth >= 0.0 { "+" } else { "" };
            format!("{sign}{growth:.2}%")
        }
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Share of buy ratings among all analyst ratings, e.g. `72% Buy`
pub fn format_recommendation(recommendation: Option<&Recommendation>) -> String {
    let Some(rec) = recommendation else {
        return NOT_AVAILABLE.to_string();
    };

    let total = rec.strong_buy + rec.buy + rec.hold + rec.sell + rec.strong_sell;
    if total == 0 {
        return NOT_AVAILABLE.to_string();
    }

    let buy_ratio = (rec.strong_buy + rec.buy) as f64 / total as f64 * 100.0;
    format!("{buy_ratio:.0}% Buy")
}

/// Relative age of a headline, e.g. `3 hours ago`
pub fn format_time_ago(published_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(published_at);
    let days = elapsed.num_days();

    if days > 0 {
        plural(days, "day")
    } else {
        plural(elapsed.num_hours().max(0), "hour")
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

/// Insert thousands separators
fn group_thousands(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    if n < 0 {
        result.insert(0, '-');
    }
    result
}
