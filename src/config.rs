//! Runtime configuration read from the environment (and `.env` via dotenvy).

use crate::data::timeframe::BaseUnit;
use crate::error::ConfigError;
use crate::indicators::IndicatorConfig;
use crate::provider::{ProviderKind, Relay};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_PRIORITY: &str = "yahoo,finnhub,alpha_vantage";
pub const DEFAULT_MAX_CANDLES: usize = 500;

const ALPHA_VANTAGE_BASE_URL: &str = "https://www.alphavantage.co";
const FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1";
const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
const YAHOO_SEARCH_URL: &str = "https://query2.finance.yahoo.com";
const YAHOO_RELAYS: &str =
    "direct,https://api.allorigins.win/raw?url=,https://corsproxy.io/?,https://api.codetabs.com/v1/proxy?quest=";

/// Per-call upper bounds. Search is the cheapest, series the most expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub quote: Duration,
    pub series: Duration,
    pub search: Duration,
    pub profile: Duration,
}

impl Timeouts {
    /// Search must not outlast a quote, and a quote must not outlast a series.
    fn check_order(&self) -> Result<(), ConfigError> {
        if self.search > self.quote {
            return Err(ConfigError::TimeoutOrder {
                shorter: "SEARCH_TIMEOUT_MS",
                longer: "QUOTE_TIMEOUT_MS",
            });
        }
        if self.quote > self.series {
            return Err(ConfigError::TimeoutOrder {
                shorter: "QUOTE_TIMEOUT_MS",
                longer: "SERIES_TIMEOUT_MS",
            });
        }
        Ok(())
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            quote: Duration::from_millis(10_000),
            series: Duration::from_millis(15_000),
            search: Duration::from_millis(8_000),
            profile: Duration::from_millis(5_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: Url,
    /// Same as `base_url` except for providers with a separate search host.
    pub search_url: Url,
    pub relays: Vec<Relay>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub providers: Vec<ProviderSettings>,
    pub timeouts: Timeouts,
    pub indicators: IndicatorConfig,
    pub max_candles: usize,
    pub mock_quotes: bool,
    pub fallback_base: BaseUnit,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let timeouts = Timeouts {
            quote: env.millis("QUOTE_TIMEOUT_MS", Timeouts::default().quote)?,
            series: env.millis("SERIES_TIMEOUT_MS", Timeouts::default().series)?,
            search: env.millis("SEARCH_TIMEOUT_MS", Timeouts::default().search)?,
            profile: env.millis("PROFILE_TIMEOUT_MS", Timeouts::default().profile)?,
        };
        timeouts.check_order()?;

        let defaults = IndicatorConfig::default();
        let indicators = IndicatorConfig {
            rsi_period: env.positive("RSI_PERIOD", defaults.rsi_period)?,
            ma_period: env.positive("RSI_MA_PERIOD", defaults.ma_period)?,
            bb_period: env.positive("BB_PERIOD", defaults.bb_period)?,
            bb_multiplier: env.parse("BB_MULTIPLIER", defaults.bb_multiplier)?,
        };
        if !indicators.bb_multiplier.is_finite() || indicators.bb_multiplier <= 0.0 {
            return Err(ConfigError::Zero("BB_MULTIPLIER".to_string()));
        }

        let fallback_base = match env.get("FALLBACK_TIMEFRAME") {
            Some(raw) => raw.parse().map_err(|_| invalid("FALLBACK_TIMEFRAME", &raw))?,
            None => BaseUnit::Day,
        };

        let kinds = match env.get("PROVIDER_PRIORITY") {
            Some(priority) => parse_priority(&priority)?,
            None => {
                // keyless default: skip finnhub instead of failing startup
                let mut kinds = parse_priority(DEFAULT_PRIORITY)?;
                if env.get("FINNHUB_API_KEY").is_none() {
                    kinds.retain(|kind| *kind != ProviderKind::Finnhub);
                }
                kinds
            }
        };
        let mut providers = Vec::new();
        for kind in kinds {
            providers.push(env.provider(kind)?);
        }

        Ok(Config {
            port: env.parse("PORT", 3000)?,
            providers,
            timeouts,
            indicators,
            max_candles: env.positive("MAX_CANDLES", DEFAULT_MAX_CANDLES)?,
            mock_quotes: env.flag("MOCK_QUOTES", true)?,
            fallback_base,
        })
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

pub fn parse_priority(raw: &str) -> Result<Vec<ProviderKind>, ConfigError> {
    let mut kinds: Vec<ProviderKind> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind: ProviderKind = name.parse()?;
        if kinds.contains(&kind) {
            return Err(ConfigError::DuplicateProvider(kind.name().to_string()));
        }
        kinds.push(kind);
    }

    if kinds.is_empty() {
        return Err(ConfigError::NoProviders);
    }
    Ok(kinds)
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(raw) => raw.parse().map_err(|_| invalid(key, &raw)),
            None => Ok(default),
        }
    }

    fn positive(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        match self.parse(key, default)? {
            0 => Err(ConfigError::Zero(key.to_string())),
            value => Ok(value),
        }
    }

    fn millis(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let millis = self.parse(key, default.as_millis() as u64)?;
        if millis == 0 {
            return Err(ConfigError::Zero(key.to_string()));
        }
        Ok(Duration::from_millis(millis))
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(invalid(key, &raw)),
            },
        }
    }

    fn url(&self, key: &str, default: &str) -> Result<Url, ConfigError> {
        let raw = self.get(key).unwrap_or_else(|| default.to_string());
        match Url::parse(&raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
            _ => Err(invalid(key, &raw)),
        }
    }

    fn relays(&self, key: &str, default: &str) -> Result<Vec<Relay>, ConfigError> {
        let raw = self.get(key).unwrap_or_else(|| default.to_string());
        Relay::parse_list(&raw).map_err(|_| invalid(key, &raw))
    }

    fn provider(&self, kind: ProviderKind) -> Result<ProviderSettings, ConfigError> {
        let settings = match kind {
            ProviderKind::AlphaVantage => {
                let base_url = self.url("ALPHA_VANTAGE_BASE_URL", ALPHA_VANTAGE_BASE_URL)?;
                ProviderSettings {
                    kind,
                    api_key: Some(
                        self.get("ALPHA_VANTAGE_API_KEY")
                            .unwrap_or_else(|| "demo".to_string()),
                    ),
                    search_url: base_url.clone(),
                    base_url,
                    relays: self.relays("ALPHA_VANTAGE_RELAYS", "direct")?,
                }
            }
            ProviderKind::Finnhub => {
                let api_key = self
                    .get("FINNHUB_API_KEY")
                    .ok_or_else(|| ConfigError::MissingApiKey("FINNHUB_API_KEY".to_string()))?;
                let base_url = self.url("FINNHUB_BASE_URL", FINNHUB_BASE_URL)?;
                ProviderSettings {
                    kind,
                    api_key: Some(api_key),
                    search_url: base_url.clone(),
                    base_url,
                    relays: self.relays("FINNHUB_RELAYS", "direct")?,
                }
            }
            ProviderKind::Yahoo => ProviderSettings {
                kind,
                api_key: None,
                base_url: self.url("YAHOO_BASE_URL", YAHOO_BASE_URL)?,
                search_url: self.url("YAHOO_SEARCH_URL", YAHOO_SEARCH_URL)?,
                relays: self.relays("YAHOO_RELAYS", YAHOO_RELAYS)?,
            },
        };
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_finnhub() {
        let cfg = config(&[("PROVIDER_PRIORITY", "yahoo,alpha_vantage")]).unwrap();

        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.max_candles, 500);
        assert!(cfg.mock_quotes);
        assert_eq!(cfg.fallback_base, BaseUnit::Day);
        assert_eq!(cfg.timeouts, Timeouts::default());
        assert_eq!(cfg.indicators, IndicatorConfig::default());

        let kinds: Vec<ProviderKind> = cfg.providers.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ProviderKind::Yahoo, ProviderKind::AlphaVantage]);

        let yahoo = &cfg.providers[0];
        assert_eq!(yahoo.relays.len(), 4);
        assert_eq!(yahoo.relays[0], Relay::Direct);
        assert_eq!(yahoo.search_url.host_str(), Some("query2.finance.yahoo.com"));

        let alpha = &cfg.providers[1];
        assert_eq!(alpha.api_key.as_deref(), Some("demo"));
        assert_eq!(alpha.relays, vec![Relay::Direct]);
    }

    #[test]
    fn default_priority_includes_finnhub_only_with_key() {
        let cfg = config(&[]).unwrap();
        let kinds: Vec<ProviderKind> = cfg.providers.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ProviderKind::Yahoo, ProviderKind::AlphaVantage]);

        assert_eq!(
            config(&[("PROVIDER_PRIORITY", "yahoo,finnhub")]),
            Err(ConfigError::MissingApiKey("FINNHUB_API_KEY".to_string()))
        );

        let cfg = config(&[("FINNHUB_API_KEY", "abc")]).unwrap();
        let kinds: Vec<ProviderKind> = cfg.providers.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ProviderKind::Yahoo,
                ProviderKind::Finnhub,
                ProviderKind::AlphaVantage
            ]
        );
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = config(&[
            ("PROVIDER_PRIORITY", "finnhub"),
            ("FINNHUB_API_KEY", "secret"),
            ("FINNHUB_RELAYS", "https://relay.example/?u=,direct"),
            ("SERIES_TIMEOUT_MS", "25000"),
            ("RSI_PERIOD", "7"),
            ("BB_MULTIPLIER", "2.5"),
            ("MOCK_QUOTES", "false"),
            ("FALLBACK_TIMEFRAME", "1w"),
            ("PORT", "8080"),
        ])
        .unwrap();

        assert_eq!(cfg.port, 8080);
        assert!(!cfg.mock_quotes);
        assert_eq!(cfg.fallback_base, BaseUnit::Week);
        assert_eq!(cfg.timeouts.series, Duration::from_millis(25000));
        assert_eq!(cfg.indicators.rsi_period, 7);
        assert_eq!(cfg.indicators.bb_multiplier, 2.5);
        assert_eq!(
            cfg.providers[0].relays,
            vec![
                Relay::Prefix("https://relay.example/?u=".to_string()),
                Relay::Direct
            ]
        );
    }

    #[test]
    fn rejects_bad_priority_lists() {
        assert_eq!(
            config(&[("PROVIDER_PRIORITY", " , ")]),
            Err(ConfigError::NoProviders)
        );
        assert_eq!(
            config(&[("PROVIDER_PRIORITY", "yahoo,bloomberg")]),
            Err(ConfigError::UnknownProvider("bloomberg".to_string()))
        );
        assert_eq!(
            config(&[("PROVIDER_PRIORITY", "yahoo,Yahoo")]),
            Err(ConfigError::DuplicateProvider("yahoo".to_string()))
        );
    }

    #[test]
    fn rejects_bad_values() {
        let base = [("PROVIDER_PRIORITY", "yahoo")];
        let with = |key: &'static str, value: &'static str| {
            let mut pairs = base.to_vec();
            pairs.push((key, value));
            config(&pairs)
        };

        assert_eq!(with("RSI_PERIOD", "0"), Err(ConfigError::Zero("RSI_PERIOD".to_string())));
        assert_eq!(
            with("QUOTE_TIMEOUT_MS", "0"),
            Err(ConfigError::Zero("QUOTE_TIMEOUT_MS".to_string()))
        );
        assert!(matches!(with("MAX_CANDLES", "lots"), Err(ConfigError::InvalidValue { .. })));
        assert!(matches!(with("YAHOO_BASE_URL", "not a url"), Err(ConfigError::InvalidValue { .. })));
        assert!(matches!(with("YAHOO_RELAYS", "ftp://x/"), Err(ConfigError::InvalidValue { .. })));
        assert!(matches!(with("MOCK_QUOTES", "maybe"), Err(ConfigError::InvalidValue { .. })));
        assert!(matches!(with("FALLBACK_TIMEFRAME", "5x"), Err(ConfigError::InvalidValue { .. })));
        assert_eq!(
            with("BB_MULTIPLIER", "-1"),
            Err(ConfigError::Zero("BB_MULTIPLIER".to_string()))
        );
    }

    #[test]
    fn timeouts_must_be_ordered() {
        assert_eq!(
            config(&[("SEARCH_TIMEOUT_MS", "12000")]),
            Err(ConfigError::TimeoutOrder {
                shorter: "SEARCH_TIMEOUT_MS",
                longer: "QUOTE_TIMEOUT_MS",
            })
        );
        assert_eq!(
            config(&[("QUOTE_TIMEOUT_MS", "20000")]),
            Err(ConfigError::TimeoutOrder {
                shorter: "QUOTE_TIMEOUT_MS",
                longer: "SERIES_TIMEOUT_MS",
            })
        );

        let cfg = config(&[
            ("SEARCH_TIMEOUT_MS", "3000"),
            ("QUOTE_TIMEOUT_MS", "3000"),
            ("SERIES_TIMEOUT_MS", "3000"),
        ])
        .unwrap();
        assert_eq!(cfg.timeouts.quote, Duration::from_millis(3000));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = config(&[("PROVIDER_PRIORITY", "yahoo"), ("PORT", "  ")]).unwrap();
        assert_eq!(cfg.port, 3000);
    }
}
