use serde::{Deserialize, Serialize};

/// Quote currency that marks a crypto pair (`BTC-USD`).
const CRYPTO_QUOTE_CURRENCY: &str = "USD";

/// Instrument classification derived from the symbol text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentKind {
    #[default]
    Equity,
    Crypto,
}

impl InstrumentKind {
    /// Classify a symbol. Currency-pair style symbols (`BTC-USD`, `ETH-USDT`)
    /// are crypto; everything else is treated as an equity ticker.
    pub fn classify(symbol: &str) -> Self {
        if CryptoPair::parse(symbol).is_some() {
            Self::Crypto
        } else {
            Self::Equity
        }
    }
}

/// Base/market split of a crypto pair symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoPair {
    pub base: String,
    pub market: String,
}

impl CryptoPair {
    /// Parse `BASE-MARKET` where the market leg is a USD quote.
    ///
    /// Returns `None` for equity tickers, including dashed share classes
    /// such as `BRK-B`.
    pub fn parse(symbol: &str) -> Option<Self> {
        let (base, market) = symbol.trim().split_once('-')?;
        if base.is_empty() || !market.to_ascii_uppercase().contains(CRYPTO_QUOTE_CURRENCY) {
            return None;
        }
        Some(Self {
            base: base.to_ascii_uppercase(),
            // Vendors quote crypto against plain USD
            market: CRYPTO_QUOTE_CURRENCY.to_string(),
        })
    }
}
