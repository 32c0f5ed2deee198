//! Upstream market-data providers.
//!
//! Every provider speaks its own schema; adapters translate it into the
//! canonical [`Candle`] and [`SymbolQuote`] types. Transport concerns (relay
//! selection, status mapping, timeouts) live in [`transport`].

use crate::config::{ProviderSettings, Timeouts};
use crate::data::timeframe::Resolution;
use crate::data::{normalize_candles, Candle, SymbolQuote};
use crate::error::{ConfigError, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

pub mod alpha_vantage;
pub mod finnhub;
pub mod transport;
pub mod yahoo;

pub use transport::{HttpTransport, Relay};

const MAX_SEARCH_RESULTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    AlphaVantage,
    Finnhub,
    Yahoo,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::AlphaVantage => "alpha_vantage",
            ProviderKind::Finnhub => "finnhub",
            ProviderKind::Yahoo => "yahoo",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "alpha_vantage" | "alphavantage" => Ok(ProviderKind::AlphaVantage),
            "finnhub" => Ok(ProviderKind::Finnhub),
            "yahoo" => Ok(ProviderKind::Yahoo),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// One upstream market-data source.
///
/// Calls are single attempts against a single relay; retrying across relays
/// and providers is the orchestrator's job.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Mirrors to try, in order. Never empty.
    fn relays(&self) -> &[Relay];

    async fn fetch_quote(&self, symbol: &str, relay: &Relay) -> Result<SymbolQuote, ProviderError>;

    /// Raw base-unit candles, ascending and validated.
    async fn fetch_series(
        &self,
        symbol: &str,
        resolution: &Resolution,
        relay: &Relay,
    ) -> Result<Vec<Candle>, ProviderError>;

    /// Listings only, price fields are zero.
    async fn search_symbols(
        &self,
        query: &str,
        relay: &Relay,
    ) -> Result<Vec<SymbolQuote>, ProviderError>;
}

pub fn build_provider(
    settings: &ProviderSettings,
    timeouts: Timeouts,
    transport: HttpTransport,
) -> Arc<dyn MarketDataProvider> {
    match settings.kind {
        ProviderKind::AlphaVantage => Arc::new(alpha_vantage::AlphaVantage::new(
            transport, settings, timeouts,
        )),
        ProviderKind::Finnhub => Arc::new(finnhub::Finnhub::new(transport, settings, timeouts)),
        ProviderKind::Yahoo => Arc::new(yahoo::Yahoo::new(transport, settings, timeouts)),
    }
}

/// Normalizes provider candles and enforces the minimum history the
/// resolution needs to fill one output bucket.
pub(crate) fn finish_series(
    candles: Vec<Candle>,
    resolution: &Resolution,
) -> Result<Vec<Candle>, ProviderError> {
    let candles = normalize_candles(candles)?;
    if candles.len() < resolution.range.min_bars {
        return Err(ProviderError::malformed(format!(
            "undersized range: {} bars for {} (need {})",
            candles.len(),
            resolution.label,
            resolution.range.min_bars
        )));
    }
    Ok(candles)
}

pub(crate) fn endpoint(
    base: &Url,
    path: &str,
    params: &[(&str, &str)],
) -> Result<Url, ProviderError> {
    let raw = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse_with_params(&raw, params)
        .map_err(|e| ProviderError::Network(format!("invalid request url {raw}: {e}")))
}

pub(crate) fn volume_from_f64(volume: f64) -> Result<u64, ProviderError> {
    if !volume.is_finite() || volume < 0.0 || volume >= u64::MAX as f64 {
        return Err(ProviderError::malformed(format!("invalid volume {volume}")));
    }
    Ok(volume.round() as u64)
}

/// Provider epoch seconds to milliseconds.
pub(crate) fn seconds_to_millis(seconds: i64) -> Result<i64, ProviderError> {
    seconds
        .checked_mul(1000)
        .ok_or_else(|| ProviderError::malformed(format!("timestamp {seconds} out of range")))
}

pub(crate) fn required<T>(value: Option<T>, field: &str) -> Result<T, ProviderError> {
    value.ok_or_else(|| ProviderError::malformed(format!("missing field `{field}`")))
}
