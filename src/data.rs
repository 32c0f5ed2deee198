use crate::error::ProviderError;
use serde::{Deserialize, Serialize};

pub mod aggregate;
pub mod timeframe;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Candle {
    pub fn is_consistent(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite())
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymbolQuote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
}

impl SymbolQuote {
    /// Search results only carry identity, prices stay zeroed.
    pub fn listing(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        SymbolQuote {
            symbol: symbol.into(),
            name: name.into(),
            price: 0.0,
            change: 0.0,
            change_percent: 0.0,
        }
    }

    /// Builds a quote from the current price and the previous close.
    pub fn from_previous_close(
        symbol: impl Into<String>,
        name: impl Into<String>,
        price: f64,
        previous_close: f64,
    ) -> Self {
        let change = price - previous_close;
        SymbolQuote {
            symbol: symbol.into(),
            name: name.into(),
            price,
            change,
            change_percent: change / previous_close * 100.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: i64,
    pub value: f64,
    pub ma: f64,
    #[serde(rename = "upperBB")]
    pub upper_bb: f64,
    #[serde(rename = "lowerBB")]
    pub lower_bb: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ChartSeries {
    pub candles: Vec<Candle>,
    pub indicators: Vec<IndicatorPoint>,
}

/// Sorts provider candles ascending, drops duplicate timestamps (the later
/// entry wins) and rejects any bar that breaks the OHLC invariants.
pub fn normalize_candles(mut candles: Vec<Candle>) -> Result<Vec<Candle>, ProviderError> {
    if candles.is_empty() {
        return Err(ProviderError::NoDataAvailable);
    }

    if let Some(bad) = candles.iter().find(|c| !c.is_consistent()) {
        return Err(ProviderError::malformed(format!(
            "inconsistent candle at {}",
            bad.timestamp
        )));
    }

    // stable sort keeps provider order among equal timestamps
    candles.sort_by_key(|c| c.timestamp);

    let mut normalized: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match normalized.last_mut() {
            Some(last) if last.timestamp == candle.timestamp => *last = candle,
            _ => normalized.push(candle),
        }
    }

    Ok(normalized)
}
