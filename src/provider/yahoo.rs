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

const LISTED_TYPES: &[&str] = &["equity", "etf", "index"];

pub struct Yahoo {
    transport: HttpTransport,
    chart_url: Url,
    search_url: Url,
    relays: Vec<Relay>,
    timeouts: Timeouts,
}

impl Yahoo {
    pub fn new(transport: HttpTransport, settings: &ProviderSettings, timeouts: Timeouts) -> Self {
        Yahoo {
            transport,
            chart_url: settings.base_url.clone(),
            search_url: settings.search_url.clone(),
            relays: settings.relays.clone(),
            timeouts,
        }
    }

    fn chart(&self, ticker: &str, params: &[(&str, &str)]) -> Result<Url, ProviderError> {
        endpoint(&self.chart_url, &format!("v8/finance/chart/{ticker}"), params)
    }
}

pub fn format_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

fn interval(base: BaseUnit) -> &'static str {
    match base {
        BaseUnit::Hour => "1h",
        BaseUnit::Day => "1d",
        BaseUnit::Week => "1wk",
        BaseUnit::Month => "1mo",
    }
}

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<Value>,
}

#[derive(Deserialize)]
struct ChartResult {
    meta: Option<Meta>,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Deserialize)]
struct Indicators {
    quote: Vec<QuoteArrays>,
}

#[derive(Deserialize)]
struct QuoteArrays {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize)]
struct SearchResponse {
    quotes: Option<Vec<SearchHit>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    symbol: Option<String>,
    #[serde(rename = "shortname")]
    short_name: Option<String>,
    #[serde(rename = "longname")]
    long_name: Option<String>,
    type_disp: Option<String>,
}

/// Unwraps `chart.result[0]`, treating any reported error as an unknown symbol.
fn chart_result(payload: Value, ticker: &str) -> Result<ChartResult, ProviderError> {
    let envelope: ChartEnvelope = serde_json::from_value(payload)?;

    if let Some(error) = envelope.chart.error.filter(|e| !e.is_null()) {
        let description = error
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or(ticker);
        return Err(ProviderError::NotFound(description.to_string()));
    }

    envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| ProviderError::NotFound(ticker.to_string()))
}

pub(crate) fn parse_quote(payload: Value, symbol: &str) -> Result<SymbolQuote, ProviderError> {
    let ticker = format_symbol(symbol);
    let meta = required(chart_result(payload, &ticker)?.meta, "meta")?;

    let price = required(meta.regular_market_price, "regularMarketPrice")?;
    let previous_close = required(
        meta.previous_close.or(meta.chart_previous_close),
        "previousClose",
    )?;
    if price <= 0.0 || previous_close <= 0.0 {
        return Err(ProviderError::malformed(format!(
            "non-positive price for {ticker}"
        )));
    }

    let name = meta
        .long_name
        .or(meta.short_name)
        .unwrap_or_else(|| ticker.clone());
    Ok(SymbolQuote::from_previous_close(
        ticker,
        name,
        price,
        previous_close,
    ))
}

pub(crate) fn parse_chart(payload: Value, symbol: &str) -> Result<Vec<Candle>, ProviderError> {
    let result = chart_result(payload, &format_symbol(symbol))?;
    let timestamps = required(result.timestamp, "timestamp")?;
    let quote = required(result.indicators, "indicators")?
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::malformed("missing `indicators.quote[0]`"))?;

    let open = required(quote.open, "open")?;
    let high = required(quote.high, "high")?;
    let low = required(quote.low, "low")?;
    let close = required(quote.close, "close")?;
    let volume = required(quote.volume, "volume")?;

    let len = timestamps.len();
    if [open.len(), high.len(), low.len(), close.len(), volume.len()]
        .iter()
        .any(|n| *n != len)
    {
        return Err(ProviderError::malformed("chart arrays differ in length"));
    }

    let mut candles = Vec::with_capacity(len);
    for i in 0..len {
        // null rows mark periods without trading
        let (Some(o), Some(h), Some(l), Some(c), Some(v)) =
            (open[i], high[i], low[i], close[i], volume[i])
        else {
            continue;
        };
        candles.push(Candle {
            timestamp: seconds_to_millis(timestamps[i])?,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: volume_from_f64(v)?,
        });
    }
    Ok(candles)
}

pub(crate) fn parse_search(payload: Value) -> Result<Vec<SymbolQuote>, ProviderError> {
    let response: SearchResponse = serde_json::from_value(payload)?;
    let hits = required(response.quotes, "quotes")?;

    Ok(hits
        .into_iter()
        .filter(|hit| {
            hit.type_disp
                .as_deref()
                .is_some_and(|kind| LISTED_TYPES.contains(&kind.to_lowercase().as_str()))
        })
        .filter_map(|hit| {
            let symbol = hit.symbol?;
            let name = hit
                .long_name
                .or(hit.short_name)
                .unwrap_or_else(|| symbol.clone());
            Some(SymbolQuote::listing(symbol, name))
        })
        .take(super::MAX_SEARCH_RESULTS)
        .collect())
}

#[async_trait]
impl MarketDataProvider for Yahoo {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn relays(&self) -> &[Relay] {
        &self.relays
    }

    async fn fetch_quote(&self, symbol: &str, relay: &Relay) -> Result<SymbolQuote, ProviderError> {
        let url = self.chart(&format_symbol(symbol), &[("interval", "1d"), ("range", "5d")])?;
        let payload = self
            .transport
            .get_json(relay, &url, self.timeouts.quote)
            .await?;
        parse_quote(payload, symbol)
    }

    async fn fetch_series(
        &self,
        symbol: &str,
        resolution: &Resolution,
        relay: &Relay,
    ) -> Result<Vec<Candle>, ProviderError> {
        let now = Utc::now();
        let period1 = resolution.range.start(now).timestamp().to_string();
        let period2 = now.timestamp().to_string();

        let url = self.chart(
            &format_symbol(symbol),
            &[
                ("interval", interval(resolution.base)),
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("includePrePost", "false"),
            ],
        )?;
        let payload = self
            .transport
            .get_json(relay, &url, self.timeouts.series)
            .await?;

        finish_series(parse_chart(payload, symbol)?, resolution)
    }

    async fn search_symbols(
        &self,
        query: &str,
        relay: &Relay,
    ) -> Result<Vec<SymbolQuote>, ProviderError> {
        let url = endpoint(
            &self.search_url,
            "v1/finance/search",
            &[("q", query.trim()), ("quotesCount", "10"), ("newsCount", "0")],
        )?;
        let payload = self
            .transport
            .get_json(relay, &url, self.timeouts.search)
            .await?;
        parse_search(payload)
    }
}
