use std::io::ErrorKind;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Html,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use quantpm_market_data::{Bar, Interval, Quote};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

const DASHBOARD_FILE: &str = "dashboard.html";
const DEFAULT_HISTORY_DAYS: i64 = 30;
const MAX_HISTORY_DAYS: i64 = 365;

/// Upper-cased, trimmed symbols from a comma-separated list.
fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

async fn dashboard(State(state): State<Arc<AppState>>) -> ApiResult<Html<String>> {
    let path = state.settings.static_dir.join(DASHBOARD_FILE);
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Ok(Html(page)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Dashboard template missing at {}", path.display());
            Err(ApiError::NotFound)
        }
        Err(e) => Err(ApiError::Internal(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

#[derive(Deserialize)]
struct QuotesQuery {
    symbols: Option<String>,
}

#[derive(Serialize)]
struct QuotesResponse {
    timestamp: DateTime<Utc>,
    count: usize,
    quotes: Vec<Quote>,
}

async fn get_quotes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuotesQuery>,
) -> Json<QuotesResponse> {
    let symbols = query
        .symbols
        .as_deref()
        .map(parse_symbols)
        .filter(|list| !list.is_empty())
        .unwrap_or_else(|| state.watchlist());

    let quotes = state.aggregator.get_quotes(&symbols).await;
    Json(QuotesResponse {
        timestamp: Utc::now(),
        count: quotes.len(),
        quotes,
    })
}

#[derive(Serialize)]
struct QuoteResponse {
    timestamp: DateTime<Utc>,
    quote: Quote,
}

async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Json<QuoteResponse> {
    let quote = state.aggregator.get_quote(&symbol.trim().to_uppercase()).await;
    Json(QuoteResponse {
        timestamp: Utc::now(),
        quote,
    })
}

#[derive(Deserialize)]
struct HistoricalQuery {
    days: Option<String>,
    interval: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum HistoricalResponse {
    Data {
        symbol: String,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        interval: String,
        count: usize,
        data: Vec<Bar>,
    },
    Empty {
        symbol: String,
        data: Vec<Bar>,
        message: &'static str,
    },
}

impl HistoricalResponse {
    fn empty(symbol: String) -> Self {
        Self::Empty {
            symbol,
            data: Vec::new(),
            message: "No data available",
        }
    }
}

async fn get_historical(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<HistoricalQuery>,
) -> ApiResult<Json<HistoricalResponse>> {
    let days = match query.days.as_deref() {
        None => DEFAULT_HISTORY_DAYS,
        Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
            ApiError::BadRequest(format!("days must be an integer, got '{}'", raw))
        })?,
    };
    if !(1..=MAX_HISTORY_DAYS).contains(&days) {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {}, got {}",
            MAX_HISTORY_DAYS, days
        )));
    }

    let symbol = symbol.trim().to_uppercase();
    let raw_interval = query.interval.unwrap_or_else(|| Interval::Daily.to_string());
    let interval: Interval = match raw_interval.parse() {
        Ok(interval) => interval,
        Err(e) => {
            debug!("{} for {}", e, symbol);
            return Ok(Json(HistoricalResponse::empty(symbol)));
        }
    };

    let end_date = Utc::now();
    let start_date = end_date - Duration::days(days);
    let series = state
        .aggregator
        .get_historical(&symbol, start_date, end_date, interval)
        .await;

    if series.is_empty() {
        return Ok(Json(HistoricalResponse::empty(symbol)));
    }

    let data = series.into_bars();
    Ok(Json(HistoricalResponse::Data {
        symbol,
        start_date,
        end_date,
        interval: interval.to_string(),
        count: data.len(),
        data,
    }))
}

#[derive(Serialize)]
struct InstrumentsResponse {
    instruments: serde_json::Value,
    watchlist: Vec<String>,
}

async fn get_instruments(State(state): State<Arc<AppState>>) -> Json<InstrumentsResponse> {
    Json(InstrumentsResponse {
        instruments: state.instruments.to_json(),
        watchlist: state.watchlist(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/quotes", get(get_quotes))
        .route("/quote/{symbol}", get(get_quote))
        .route("/historical/{symbol}", get(get_historical))
        .route("/instruments", get(get_instruments))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_symbols() {
        assert_eq!(
            parse_symbols(" aapl, msft ,,btc-usd "),
            vec!["AAPL", "MSFT", "BTC-USD"]
        );
        assert!(parse_symbols(" , ").is_empty());
    }
}
