use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use quantpm_core::{ConfigSource, Settings};
use quantpm_market_data::{
    Bar, Interval, MarketDataError, MarketDataProvider, ProviderAggregator, Quote, QuoteFields,
    RateBudget, RateLimit, Series,
};
use quantpm_server::{api::app_router, AppState};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

/// Provider serving fixed prices for a set of symbols.
struct StubProvider {
    id: &'static str,
    prices: HashMap<String, Decimal>,
    budget: Option<RateBudget>,
}

impl StubProvider {
    fn new(id: &'static str, prices: &[(&str, Decimal)]) -> Self {
        Self {
            id,
            prices: prices
                .iter()
                .map(|(s, p)| (s.to_string(), *p))
                .collect(),
            budget: None,
        }
    }

    fn with_budget(mut self, limit: u32) -> Self {
        self.budget = Some(RateBudget::new(self.id, limit));
        self
    }

    fn consume_budget(&self) -> Result<(), MarketDataError> {
        match &self.budget {
            Some(budget) if !budget.try_consume() => Err(MarketDataError::BudgetExhausted {
                provider: self.id.to_string(),
                limit: budget.limit(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl MarketDataProvider for StubProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    fn budget(&self) -> Option<&RateBudget> {
        self.budget.as_ref()
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        self.consume_budget()?;
        let price = self
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;
        Ok(QuoteFields {
            price: Some(price),
            prev_close: Some(price - dec!(1)),
            ..QuoteFields::default()
        }
        .into_quote(symbol, self.id))
    }

    async fn fetch_historical(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> Result<Series, MarketDataError> {
        self.consume_budget()?;
        let price = self
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;
        let bar = |timestamp| Bar {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: dec!(100),
        };
        Ok(Series::new(symbol, interval, vec![bar(end), bar(start)]))
    }
}

struct TestApp {
    router: Router,
    _config_dir: TempDir,
    _static_dir: TempDir,
}

fn test_app(providers: Vec<Arc<dyn MarketDataProvider>>) -> TestApp {
    let config_dir = tempfile::tempdir().unwrap();
    let static_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        config_dir.path().join("instruments.toml"),
        "default_watchlist = [\"AAPL\", \"MSFT\"]\n\n[crypto]\npairs = [\"BTC-USD\"]\n",
    )
    .unwrap();
    std::fs::write(
        static_dir.path().join("dashboard.html"),
        "<html>dashboard</html>",
    )
    .unwrap();

    let env: HashMap<&str, String> = HashMap::from([
        ("CONFIG_DIR", config_dir.path().display().to_string()),
        ("STATIC_DIR", static_dir.path().display().to_string()),
        ("APP_NAME", "QuantPM Test".to_string()),
    ]);
    let settings = Settings::from_lookup(|key| env.get(key).cloned()).unwrap();
    let config = ConfigSource::with_settings(settings).unwrap();

    let aggregator = ProviderAggregator::new(providers, Duration::from_secs(5));
    let state = Arc::new(AppState::new(aggregator, &config));

    TestApp {
        router: app_router(state, &config.settings),
        _config_dir: config_dir,
        _static_dir: static_dir,
    }
}

async fn send(app: &TestApp, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get_json(app: &TestApp, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, Method::GET, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn default_app() -> TestApp {
    let primary: Arc<dyn MarketDataProvider> =
        Arc::new(StubProvider::new("PRIMARY", &[("AAPL", dec!(0.0))]));
    let secondary: Arc<dyn MarketDataProvider> = Arc::new(StubProvider::new(
        "SECONDARY",
        &[("AAPL", dec!(150.0)), ("MSFT", dec!(410.5))],
    ));
    test_app(vec![primary, secondary])
}

#[tokio::test]
async fn root_reports_app_and_status() {
    let app = default_app();
    let (status, body) = get_json(&app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["app"], "QuantPM Test");
    assert_eq!(body["version"], "1.0.0");
    assert_eq!(body["status"], "running");
    assert!(body["endpoints"].is_object());
}

#[tokio::test]
async fn health_lists_every_provider() {
    let app = default_app();
    let (status, body) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    let providers = body["providers"].as_object().unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers["PRIMARY"], false);
    assert_eq!(providers["SECONDARY"], true);
}

#[tokio::test]
async fn quote_falls_back_to_next_provider() {
    let app = default_app();
    let (status, body) = get_json(&app, "/api/v1/quote/aapl").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quote"]["symbol"], "AAPL");
    assert_eq!(body["quote"]["price"], 150.0);
    assert_eq!(body["quote"]["provider"], "SECONDARY");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn quote_for_unknown_symbol_is_zero_filled() {
    let app = default_app();
    let (status, body) = get_json(&app, "/api/v1/quote/NOPE").await;

    assert_eq!(status, StatusCode::OK);
    let quote = &body["quote"];
    assert_eq!(quote["price"], 0.0);
    assert_eq!(quote["provider"], "none");
    for field in ["change", "change_percent", "volume", "bid", "ask", "prev_close"] {
        assert_eq!(quote[field], 0.0, "{field} should be zero");
    }
}

#[tokio::test]
async fn quotes_preserve_requested_order() {
    let app = default_app();
    let (status, body) = get_json(&app, "/api/v1/quotes?symbols=msft,%20zzz%20,aapl").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    let symbols: Vec<&str> = body["quotes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["symbol"].as_str().unwrap())
        .collect();
    assert_eq!(symbols, vec!["MSFT", "ZZZ", "AAPL"]);
    assert_eq!(body["quotes"][1]["provider"], "none");
}

#[tokio::test]
async fn quotes_default_to_watchlist() {
    let app = default_app();
    let (status, body) = get_json(&app, "/api/v1/quotes").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["quotes"][0]["symbol"], "AAPL");
    assert_eq!(body["quotes"][1]["symbol"], "MSFT");
}

#[tokio::test]
async fn historical_returns_sorted_bars() {
    let app = default_app();
    let (status, body) = get_json(&app, "/api/v1/historical/msft?days=10&interval=1wk").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "MSFT");
    assert_eq!(body["interval"], "1wk");
    assert_eq!(body["count"], 2);
    let first = body["data"][0]["timestamp"].as_str().unwrap();
    let second = body["data"][1]["timestamp"].as_str().unwrap();
    let first: DateTime<Utc> = first.parse().unwrap();
    let second: DateTime<Utc> = second.parse().unwrap();
    assert!(first <= second);
}

#[tokio::test]
async fn historical_without_data_reports_message() {
    let app = default_app();
    let (status, body) = get_json(&app, "/api/v1/historical/NOPE").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "NOPE");
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
    assert_eq!(body["message"], "No data available");
}

#[tokio::test]
async fn historical_with_unknown_interval_is_empty() {
    let app = default_app();
    let (status, body) = get_json(&app, "/api/v1/historical/MSFT?interval=2y").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No data available");
}

#[tokio::test]
async fn historical_rejects_out_of_range_days() {
    let app = default_app();

    for days in ["0", "366"] {
        let (status, body) =
            get_json(&app, &format!("/api/v1/historical/MSFT?days={days}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert!(body["message"].as_str().unwrap().contains("days"));
    }
}

#[tokio::test]
async fn historical_rejects_non_integer_days_as_json() {
    let app = default_app();

    for days in ["abc", "1.5"] {
        let (status, body) =
            get_json(&app, &format!("/api/v1/historical/MSFT?days={days}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert!(body["message"].as_str().unwrap().contains("integer"));
    }
}

#[tokio::test]
async fn instruments_include_catalogue_and_watchlist() {
    let app = default_app();
    let (status, body) = get_json(&app, "/api/v1/instruments").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["watchlist"], serde_json::json!(["AAPL", "MSFT"]));
    assert_eq!(body["instruments"]["crypto"]["pairs"][0], "BTC-USD");
}

#[tokio::test]
async fn dashboard_serves_template() {
    let app = default_app();
    let (status, body) = send(&app, Method::GET, "/api/v1/dashboard").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"<html>dashboard</html>");
}

#[tokio::test]
async fn providers_report_budget_and_reset() {
    let budgeted = Arc::new(StubProvider::new("BUDGETED", &[("AAPL", dec!(10))]).with_budget(2));
    let provider: Arc<dyn MarketDataProvider> = budgeted.clone();
    let app = test_app(vec![provider]);

    // The availability check itself costs one call.
    let (status, body) = get_json(&app, "/api/v1/providers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["providers"]["BUDGETED"], true);
    assert_eq!(body["records"][0]["calls_used"], 1);
    assert_eq!(body["records"][0]["call_limit"], 2);

    get_json(&app, "/api/v1/quote/AAPL").await;
    let (_, body) = get_json(&app, "/api/v1/quote/AAPL").await;
    assert_eq!(body["quote"]["provider"], "none");
    assert_eq!(budgeted.budget().map(RateBudget::used), Some(2));

    let (status, body) = send(&app, Method::POST, "/api/v1/providers/budgets/reset").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["records"][0]["calls_used"], 0);

    let (_, body) = get_json(&app, "/api/v1/quote/AAPL").await;
    assert_eq!(body["quote"]["provider"], "BUDGETED");
}

#[tokio::test]
async fn static_directory_is_served() {
    let app = default_app();
    let (status, body) = send(&app, Method::GET, "/static/dashboard.html").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"<html>dashboard</html>");

    let (status, _) = send(&app, Method::GET, "/static/missing.css").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
