use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Provider name carried by a quote that no provider could satisfy.
pub const NO_PROVIDER: &str = "none";

/// Canonical market snapshot for one symbol at one instant.
///
/// Every adapter produces this exact shape, so consumers never check for
/// missing fields. A quote with a zero price and provider [`NO_PROVIDER`]
/// means "no data", not a zero-priced instrument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
    pub bid: Decimal,
    pub ask: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub prev_close: Decimal,
    /// Source that satisfied the request (YAHOO, ALPHA_VANTAGE, ...).
    pub provider: String,
}

impl Quote {
    /// Zero-valued quote for a symbol nobody could price.
    pub fn empty(symbol: &str) -> Self {
        QuoteFields::default().into_quote(symbol, NO_PROVIDER)
    }

    /// True when the quote carries no usable price.
    pub fn is_empty(&self) -> bool {
        self.price <= Decimal::ZERO
    }

    /// Re-tag the quote with the provider that served it.
    pub fn with_provider(mut self, provider: &str) -> Self {
        self.provider = provider.to_string();
        self
    }
}

/// Partial view of a vendor payload.
///
/// Adapters fill in whatever their vendor returned and call
/// [`QuoteFields::into_quote`], which completes the canonical shape:
/// numerics default to zero, the timestamp to now, `close` to the price,
/// bid/ask to the last traded price, and change figures are derived from
/// `prev_close` when the vendor does not send them.
#[derive(Clone, Debug, Default)]
pub struct QuoteFields {
    pub price: Option<Decimal>,
    pub change: Option<Decimal>,
    pub change_percent: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub timestamp: Option<DateTime<Utc>>,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub prev_close: Option<Decimal>,
}

impl QuoteFields {
    pub fn into_quote(self, symbol: &str, provider: &str) -> Quote {
        let price = self.price.unwrap_or(Decimal::ZERO);
        let prev_close = self.prev_close.unwrap_or(Decimal::ZERO);
        let (derived_change, derived_percent) = derive_change(price, prev_close);

        Quote {
            symbol: symbol.to_string(),
            price,
            change: self.change.unwrap_or(derived_change),
            change_percent: self.change_percent.unwrap_or(derived_percent),
            volume: self.volume.unwrap_or(Decimal::ZERO),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            bid: self.bid.unwrap_or(price),
            ask: self.ask.unwrap_or(price),
            open: self.open.unwrap_or(Decimal::ZERO),
            high: self.high.unwrap_or(Decimal::ZERO),
            low: self.low.unwrap_or(Decimal::ZERO),
            close: self.close.unwrap_or(price),
            prev_close,
            provider: provider.to_string(),
        }
    }
}

/// Absolute and percentage move from `prev_close` to `price`.
///
/// Both are zero when either side is missing.
pub fn derive_change(price: Decimal, prev_close: Decimal) -> (Decimal, Decimal) {
    if price <= Decimal::ZERO || prev_close <= Decimal::ZERO {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    let change = price - prev_close;
    let percent = (change / prev_close * Decimal::ONE_HUNDRED).round_dp(4);
    (change, percent)
}
