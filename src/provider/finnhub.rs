use super::{
    endpoint, finish_series, required, seconds_to_millis, volume_from_f64, HttpTransport,
    MarketDataProvider, Relay,
};
use crate::config::{ProviderSettings, Timeouts};
use crate::data::timeframe::{BaseUnit, Resolution};
use crate::data::{Candle, SymbolQuote};
use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// Bare crypto tickers Finnhub only serves through an exchange pair.
const CRYPTO_PAIRS: &[(&str, &str)] = &[
    ("BTC", "BINANCE:BTCUSDT"),
    ("ETH", "BINANCE:ETHUSDT"),
    ("ADA", "BINANCE:ADAUSDT"),
    ("SOL", "BINANCE:SOLUSDT"),
    ("DOT", "BINANCE:DOTUSDT"),
    ("LINK", "BINANCE:LINKUSDT"),
    ("MATIC", "BINANCE:MATICUSDT"),
    ("AVAX", "BINANCE:AVAXUSDT"),
    ("BTC-USD", "BINANCE:BTCUSDT"),
    ("ETH-USD", "BINANCE:ETHUSDT"),
];

const LISTED_TYPES: &[&str] = &["Common Stock", "ETP"];

pub struct Finnhub {
    transport: HttpTransport,
    base_url: Url,
    api_key: String,
    relays: Vec<Relay>,
    timeouts: Timeouts,
}

impl Finnhub {
    pub fn new(transport: HttpTransport, settings: &ProviderSettings, timeouts: Timeouts) -> Self {
        Finnhub {
            transport,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone().unwrap_or_default(),
            relays: settings.relays.clone(),
            timeouts,
        }
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, ProviderError> {
        let mut all = params.to_vec();
        all.push(("token", &self.api_key));
        endpoint(&self.base_url, path, &all)
    }

    /// Company name from the profile endpoint. Any failure yields `None`.
    async fn company_name(&self, ticker: &str, relay: &Relay) -> Option<String> {
        let url = self.url("stock/profile2", &[("symbol", ticker)]).ok()?;
        match self.transport.get_json(relay, &url, self.timeouts.profile).await {
            Ok(payload) => parse_profile_name(payload),
            Err(err) => {
                tracing::debug!(ticker, error = %err, "finnhub profile lookup failed");
                None
            }
        }
    }
}

pub fn format_symbol(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    CRYPTO_PAIRS
        .iter()
        .find(|(ticker, _)| *ticker == upper)
        .map(|(_, pair)| pair.to_string())
        .unwrap_or(upper)
}

fn resolution_code(base: BaseUnit) -> &'static str {
    match base {
        BaseUnit::Hour => "60",
        BaseUnit::Day => "D",
        BaseUnit::Week => "W",
        BaseUnit::Month => "M",
    }
}

#[derive(Deserialize)]
struct Quote {
    c: Option<f64>,
    d: Option<f64>,
    dp: Option<f64>,
}

#[derive(Deserialize)]
struct Profile {
    name: Option<String>,
}

#[derive(Deserialize)]
struct Candles {
    s: Option<String>,
    t: Option<Vec<i64>>,
    o: Option<Vec<f64>>,
    h: Option<Vec<f64>>,
    l: Option<Vec<f64>>,
    c: Option<Vec<f64>>,
    v: Option<Vec<f64>>,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Option<Vec<SearchHit>>,
}

#[derive(Deserialize)]
struct SearchHit {
    symbol: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

pub(crate) fn parse_quote(
    payload: Value,
    symbol: &str,
    name: Option<String>,
) -> Result<SymbolQuote, ProviderError> {
    let quote: Quote = serde_json::from_value(payload)?;
    let price = required(quote.c, "c")?;
    if price == 0.0 {
        return Err(ProviderError::NotFound(symbol.to_string()));
    }

    let ticker = symbol.trim().to_uppercase();
    Ok(SymbolQuote {
        name: name.unwrap_or_else(|| ticker.clone()),
        symbol: ticker,
        price,
        change: required(quote.d, "d")?,
        change_percent: required(quote.dp, "dp")?,
    })
}

fn parse_profile_name(payload: Value) -> Option<String> {
    serde_json::from_value::<Profile>(payload)
        .ok()?
        .name
        .filter(|name| !name.trim().is_empty())
}

pub(crate) fn parse_candles(payload: Value) -> Result<Vec<Candle>, ProviderError> {
    let candles: Candles = serde_json::from_value(payload)?;

    match candles.s.as_deref() {
        Some("ok") => {}
        Some("no_data") => return Err(ProviderError::NoDataAvailable),
        other => {
            return Err(ProviderError::malformed(format!(
                "unexpected candle status {other:?}"
            )))
        }
    }

    let t = required(candles.t, "t")?;
    let o = required(candles.o, "o")?;
    let h = required(candles.h, "h")?;
    let l = required(candles.l, "l")?;
    let c = required(candles.c, "c")?;
    let v = required(candles.v, "v")?;

    let len = t.len();
    if [o.len(), h.len(), l.len(), c.len(), v.len()]
        .iter()
        .any(|n| *n != len)
    {
        return Err(ProviderError::malformed("candle arrays differ in length"));
    }

    (0..len)
        .map(|i| {
            Ok(Candle {
                timestamp: seconds_to_millis(t[i])?,
                open: o[i],
                high: h[i],
                low: l[i],
                close: c[i],
                volume: volume_from_f64(v[i])?,
            })
        })
        .collect()
}

pub(crate) fn parse_search(payload: Value) -> Result<Vec<SymbolQuote>, ProviderError> {
    let response: SearchResponse = serde_json::from_value(payload)?;
    let hits = required(response.result, "result")?;

    Ok(hits
        .into_iter()
        .filter(|hit| {
            hit.kind
                .as_deref()
                .is_some_and(|kind| LISTED_TYPES.contains(&kind))
        })
        .filter_map(|hit| {
            Some(SymbolQuote::listing(
                hit.symbol?,
                hit.description.unwrap_or_default(),
            ))
        })
        .take(super::MAX_SEARCH_RESULTS)
        .collect())
}

#[async_trait]
impl MarketDataProvider for Finnhub {
    fn name(&self) -> &'static str {
        "finnhub"
    }

    fn relays(&self) -> &[Relay] {
        &self.relays
    }

    async fn fetch_quote(&self, symbol: &str, relay: &Relay) -> Result<SymbolQuote, ProviderError> {
        let ticker = format_symbol(symbol);
        let url = self.url("quote", &[("symbol", &ticker)])?;
        let payload = self
            .transport
            .get_json(relay, &url, self.timeouts.quote)
            .await?;

        // validate before spending a second request on the name
        let quote = parse_quote(payload, symbol, None)?;
        let name = self.company_name(&ticker, relay).await;
        Ok(SymbolQuote {
            name: name.unwrap_or(quote.name),
            ..quote
        })
    }

    async fn fetch_series(
        &self,
        symbol: &str,
        resolution: &Resolution,
        relay: &Relay,
    ) -> Result<Vec<Candle>, ProviderError> {
        let ticker = format_symbol(symbol);
        let now = Utc::now();
        let from = resolution.range.start(now).timestamp().to_string();
        let to = now.timestamp().to_string();

        let url = self.url(
            "stock/candle",
            &[
                ("symbol", ticker.as_str()),
                ("resolution", resolution_code(resolution.base)),
                ("from", from.as_str()),
                ("to", to.as_str()),
            ],
        )?;
        let payload = self
            .transport
            .get_json(relay, &url, self.timeouts.series)
            .await?;

        finish_series(parse_candles(payload)?, resolution)
    }

    async fn search_symbols(
        &self,
        query: &str,
        relay: &Relay,
    ) -> Result<Vec<SymbolQuote>, ProviderError> {
        let url = self.url("search", &[("q", query.trim())])?;
        let payload = self
            .transport
            .get_json(relay, &url, self.timeouts.search)
            .await?;
        parse_search(payload)
    }
}
