use super::{endpoint, finish_series, required, HttpTransport, MarketDataProvider, Relay};
use crate::config::{ProviderSettings, Timeouts};
use crate::data::timeframe::{BaseUnit, Resolution};
use crate::data::{Candle, SymbolQuote};
use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

/// `outputsize=compact` returns at most this many bars.
const COMPACT_BARS: i64 = 100;
const MIN_MATCH_SCORE: f64 = 0.5;

pub struct AlphaVantage {
    transport: HttpTransport,
    base_url: Url,
    api_key: String,
    relays: Vec<Relay>,
    timeouts: Timeouts,
}

impl AlphaVantage {
    pub fn new(transport: HttpTransport, settings: &ProviderSettings, timeouts: Timeouts) -> Self {
        AlphaVantage {
            transport,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone().unwrap_or_else(|| "demo".to_string()),
            relays: settings.relays.clone(),
            timeouts,
        }
    }

    fn query_url(&self, params: &[(&str, &str)]) -> Result<Url, ProviderError> {
        let mut all = params.to_vec();
        all.push(("apikey", &self.api_key));
        endpoint(&self.base_url, "query", &all)
    }
}

/// Alpha Vantage only knows plain tickers.
pub fn format_symbol(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    [".NS", ".BO", "-USD"]
        .iter()
        .find_map(|suffix| upper.strip_suffix(suffix))
        .map(str::to_string)
        .unwrap_or(upper)
}

/// Query function, optional intraday interval and the payload key holding the bars.
fn series_function(base: BaseUnit) -> (&'static str, Option<&'static str>, &'static str) {
    match base {
        BaseUnit::Hour => ("TIME_SERIES_INTRADAY", Some("60min"), "Time Series (60min)"),
        BaseUnit::Day => ("TIME_SERIES_DAILY", None, "Time Series (Daily)"),
        BaseUnit::Week => ("TIME_SERIES_WEEKLY", None, "Weekly Time Series"),
        BaseUnit::Month => ("TIME_SERIES_MONTHLY", None, "Monthly Time Series"),
    }
}

/// Alpha Vantage reports throttling and bad symbols with a 200 and a message body.
fn check_envelope(payload: &Value) -> Result<(), ProviderError> {
    for key in ["Note", "Information"] {
        if let Some(note) = payload.get(key) {
            return Err(ProviderError::RateLimited(
                note.as_str().unwrap_or(key).to_string(),
            ));
        }
    }
    if let Some(message) = payload.get("Error Message") {
        return Err(ProviderError::NotFound(
            message.as_str().unwrap_or("unknown symbol").to_string(),
        ));
    }
    Ok(())
}

fn number(raw: Option<String>, field: &str) -> Result<f64, ProviderError> {
    let raw = required(raw, field)?;
    raw.trim()
        .trim_end_matches('%')
        .parse()
        .map_err(|_| ProviderError::malformed(format!("`{field}` is not a number: {raw}")))
}

fn parse_volume(raw: Option<String>) -> Result<u64, ProviderError> {
    let raw = required(raw, "5. volume")?;
    match raw.trim().parse::<u64>() {
        Ok(volume) => Ok(volume),
        Err(_) => super::volume_from_f64(number(Some(raw), "5. volume")?),
    }
}

fn parse_timestamp(raw: &str) -> Result<i64, ProviderError> {
    let datetime = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|_| ProviderError::malformed(format!("bad bar date `{raw}`")))?;
    Ok(datetime.and_utc().timestamp_millis())
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

#[derive(Deserialize)]
struct Bar {
    #[serde(rename = "1. open")]
    open: Option<String>,
    #[serde(rename = "2. high")]
    high: Option<String>,
    #[serde(rename = "3. low")]
    low: Option<String>,
    #[serde(rename = "4. close")]
    close: Option<String>,
    #[serde(rename = "5. volume")]
    volume: Option<String>,
}

#[derive(Deserialize)]
struct SearchMatch {
    #[serde(rename = "1. symbol")]
    symbol: Option<String>,
    #[serde(rename = "2. name")]
    name: Option<String>,
    #[serde(rename = "9. matchScore")]
    match_score: Option<String>,
}

pub(crate) fn parse_quote(payload: Value, symbol: &str) -> Result<SymbolQuote, ProviderError> {
    check_envelope(&payload)?;

    let quote = match payload.get("Global Quote") {
        Some(Value::Object(map)) if !map.is_empty() => Value::Object(map.clone()),
        _ => return Err(ProviderError::NotFound(symbol.to_string())),
    };
    let quote: GlobalQuote = serde_json::from_value(quote)?;

    Ok(SymbolQuote {
        symbol: symbol.trim().to_uppercase(),
        name: format_symbol(symbol),
        price: number(quote.price, "05. price")?,
        change: number(quote.change, "09. change")?,
        change_percent: number(quote.change_percent, "10. change percent")?,
    })
}

pub(crate) fn parse_series(payload: Value, base: BaseUnit) -> Result<Vec<Candle>, ProviderError> {
    check_envelope(&payload)?;

    let (_, _, key) = series_function(base);
    let series = payload
        .get(key)
        .cloned()
        .ok_or_else(|| ProviderError::malformed(format!("missing `{key}`")))?;
    let bars: BTreeMap<String, Bar> = serde_json::from_value(series)?;

    bars.into_iter()
        .map(|(date, bar)| {
            Ok(Candle {
                timestamp: parse_timestamp(&date)?,
                open: number(bar.open, "1. open")?,
                high: number(bar.high, "2. high")?,
                low: number(bar.low, "3. low")?,
                close: number(bar.close, "4. close")?,
                volume: parse_volume(bar.volume)?,
            })
        })
        .collect()
}

pub(crate) fn parse_search(payload: Value) -> Result<Vec<SymbolQuote>, ProviderError> {
    check_envelope(&payload)?;

    let matches = payload
        .get("bestMatches")
        .cloned()
        .ok_or_else(|| ProviderError::malformed("missing `bestMatches`"))?;
    let matches: Vec<SearchMatch> = serde_json::from_value(matches)?;

    Ok(matches
        .into_iter()
        .filter(|m| {
            m.match_score
                .as_deref()
                .and_then(|s| s.parse::<f64>().ok())
                .is_some_and(|score| score > MIN_MATCH_SCORE)
        })
        .filter_map(|m| Some(SymbolQuote::listing(m.symbol?, m.name.unwrap_or_default())))
        .take(super::MAX_SEARCH_RESULTS)
        .collect())
}

#[async_trait]
impl MarketDataProvider for AlphaVantage {
    fn name(&self) -> &'static str {
        "alpha_vantage"
    }

    fn relays(&self) -> &[Relay] {
        &self.relays
    }

    async fn fetch_quote(&self, symbol: &str, relay: &Relay) -> Result<SymbolQuote, ProviderError> {
        let ticker = format_symbol(symbol);
        let url = self.query_url(&[("function", "GLOBAL_QUOTE"), ("symbol", &ticker)])?;
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
        let ticker = format_symbol(symbol);
        let (function, interval, _) = series_function(resolution.base);
        let output_size = if resolution.range.expected_bars(resolution.base) > COMPACT_BARS {
            "full"
        } else {
            "compact"
        };

        let mut params = vec![
            ("function", function),
            ("symbol", ticker.as_str()),
            ("outputsize", output_size),
        ];
        if let Some(interval) = interval {
            params.push(("interval", interval));
        }

        let url = self.query_url(&params)?;
        let payload = self
            .transport
            .get_json(relay, &url, self.timeouts.series)
            .await?;

        let candles = parse_series(payload, resolution.base)?;
        let cutoff = resolution.range.start(Utc::now()).timestamp_millis();
        let recent: Vec<Candle> = candles.into_iter().filter(|c| c.timestamp >= cutoff).collect();
        finish_series(recent, resolution)
    }

    async fn search_symbols(
        &self,
        query: &str,
        relay: &Relay,
    ) -> Result<Vec<SymbolQuote>, ProviderError> {
        let url = self.query_url(&[("function", "SYMBOL_SEARCH"), ("keywords", query.trim())])?;
        let payload = self
            .transport
            .get_json(relay, &url, self.timeouts.search)
            .await?;
        parse_search(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn formats_symbols() {
        assert_eq!(format_symbol("reliance.ns"), "RELIANCE");
        assert_eq!(format_symbol("INFY.BO"), "INFY");
        assert_eq!(format_symbol("btc-usd"), "BTC");
        assert_eq!(format_symbol(" aapl "), "AAPL");
    }

    #[test]
    fn parses_global_quote() {
        let payload = json!({
            "Global Quote": {
                "01. symbol": "IBM",
                "05. price": "172.5000",
                "09. change": "-1.2500",
                "10. change percent": "-0.7194%"
            }
        });

        let quote = parse_quote(payload, "ibm").unwrap();
        assert_eq!(quote.symbol, "IBM");
        assert_eq!(quote.name, "IBM");
        assert_eq!(quote.price, 172.5);
        assert_eq!(quote.change, -1.25);
        assert_eq!(quote.change_percent, -0.7194);
    }

    #[test]
    fn quote_errors_follow_envelope() {
        assert_eq!(
            parse_quote(json!({ "Global Quote": {} }), "NOPE"),
            Err(ProviderError::NotFound("NOPE".to_string()))
        );
        assert!(matches!(
            parse_quote(json!({ "Note": "Thank you for using Alpha Vantage!" }), "IBM"),
            Err(ProviderError::RateLimited(_))
        ));
        assert!(matches!(
            parse_quote(json!({ "Information": "rate limit" }), "IBM"),
            Err(ProviderError::RateLimited(_))
        ));
        assert!(matches!(
            parse_quote(json!({ "Error Message": "Invalid API call" }), "IBM"),
            Err(ProviderError::NotFound(_))
        ));
        assert!(matches!(
            parse_quote(json!({ "Global Quote": { "05. price": "1.0" } }), "IBM"),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn parses_daily_series() {
        let payload = json!({
            "Meta Data": { "2. Symbol": "IBM" },
            "Time Series (Daily)": {
                "2024-01-03": {
                    "1. open": "161.0", "2. high": "162.5", "3. low": "160.1",
                    "4. close": "161.9", "5. volume": "4120000"
                },
                "2024-01-02": {
                    "1. open": "160.0", "2. high": "161.4", "3. low": "159.2",
                    "4. close": "160.9", "5. volume": "3900000"
                }
            }
        });

        let candles = parse_series(payload, BaseUnit::Day).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1_704_153_600_000);
        assert_eq!(candles[0].close, 160.9);
        assert_eq!(candles[1].volume, 4_120_000);
    }

    #[test]
    fn parses_intraday_timestamps() {
        let payload = json!({
            "Time Series (60min)": {
                "2024-01-02 15:00:00": {
                    "1. open": "1", "2. high": "2", "3. low": "0.5",
                    "4. close": "1.5", "5. volume": "10"
                }
            }
        });

        let candles = parse_series(payload, BaseUnit::Hour).unwrap();
        assert_eq!(candles[0].timestamp, 1_704_207_600_000);
    }

    #[test]
    fn series_rejects_missing_fields() {
        let missing_close = json!({
            "Weekly Time Series": {
                "2024-01-05": {
                    "1. open": "1", "2. high": "2", "3. low": "0.5", "5. volume": "10"
                }
            }
        });
        assert!(matches!(
            parse_series(missing_close, BaseUnit::Week),
            Err(ProviderError::MalformedResponse(_))
        ));

        assert!(matches!(
            parse_series(json!({ "Meta Data": {} }), BaseUnit::Month),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn search_keeps_confident_matches() {
        let payload = json!({
            "bestMatches": [
                { "1. symbol": "TSCO.LON", "2. name": "Tesco PLC", "9. matchScore": "0.7273" },
                { "1. symbol": "TSCDF", "2. name": "Tesco plc", "9. matchScore": "0.3000" },
                { "1. symbol": "TSCDY", "2. name": "Tesco plc", "9. matchScore": "0.5100" }
            ]
        });

        let results = parse_search(payload).unwrap();
        let symbols: Vec<&str> = results.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["TSCO.LON", "TSCDY"]);
        assert!(results.iter().all(|q| q.price == 0.0));
    }
}
