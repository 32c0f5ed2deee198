//! Provider fallback. Every public entry point returns data: when all
//! providers and relays fail, synthetic data stands in.

use crate::config::Config;
use crate::data::aggregate::aggregate;
use crate::data::timeframe::TimeframeResolver;
use crate::data::{ChartSeries, SymbolQuote};
use crate::error::{ConfigError, ProviderError};
use crate::indicators::IndicatorEngine;
use crate::mock::{MockDataGenerator, MockDirectory};
use crate::provider::{build_provider, HttpTransport, MarketDataProvider, Relay};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a result came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Provider { name: &'static str, relay: Relay },
    Mock,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Provider { name, relay } => write!(f, "{name}@{relay}"),
            DataSource::Mock => f.write_str("mock"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: DataSource,
}

pub struct Orchestrator {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    resolver: TimeframeResolver,
    engine: IndicatorEngine,
    mock: MockDataGenerator,
    max_candles: usize,
    mock_quotes: bool,
}

impl Orchestrator {
    pub fn new(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        resolver: TimeframeResolver,
        engine: IndicatorEngine,
        mock: MockDataGenerator,
    ) -> Result<Self, ConfigError> {
        if providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        if let Some(provider) = providers.iter().find(|p| p.relays().is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: format!("{} relays", provider.name()),
                value: String::new(),
            });
        }

        Ok(Orchestrator {
            providers,
            resolver,
            engine,
            mock,
            max_candles: crate::config::DEFAULT_MAX_CANDLES,
            mock_quotes: true,
        })
    }

    pub fn from_config(config: &Config, transport: HttpTransport) -> Result<Self, ConfigError> {
        let providers = config
            .providers
            .iter()
            .map(|settings| build_provider(settings, config.timeouts, transport.clone()))
            .collect();
        let engine = IndicatorEngine::new(config.indicators);
        let mock = MockDataGenerator::new(MockDirectory::default(), engine.clone());

        Ok(Orchestrator::new(
            providers,
            TimeframeResolver::new(config.fallback_base),
            engine,
            mock,
        )?
        .with_max_candles(config.max_candles)
        .with_mock_quotes(config.mock_quotes))
    }

    pub fn with_max_candles(mut self, max_candles: usize) -> Self {
        self.max_candles = max_candles.max(1);
        self
    }

    pub fn with_mock_quotes(mut self, enabled: bool) -> Self {
        self.mock_quotes = enabled;
        self
    }

    /// Tries every provider, and each provider's relays, in order until one
    /// attempt succeeds.
    async fn first_success<'a, T, F, Fut>(
        &'a self,
        operation: &'static str,
        subject: &str,
        mut attempt: F,
    ) -> Option<(T, DataSource)>
    where
        F: FnMut(&'a dyn MarketDataProvider, &'a Relay) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        for provider in &self.providers {
            for relay in provider.relays() {
                match attempt(provider.as_ref(), relay).await {
                    Ok(value) => {
                        debug!(operation, subject, provider = provider.name(), %relay, "provider attempt succeeded");
                        let source = DataSource::Provider {
                            name: provider.name(),
                            relay: relay.clone(),
                        };
                        return Some((value, source));
                    }
                    Err(err) => {
                        warn!(operation, subject, provider = provider.name(), %relay, error = %err, "provider attempt failed");
                    }
                }
            }
        }
        None
    }

    pub async fn get_series(&self, symbol: &str, timeframe: &str) -> ChartSeries {
        self.fetch_series(symbol, timeframe).await.value
    }

    /// Candles with indicators for `timeframe`. Never fails.
    pub async fn fetch_series(&self, symbol: &str, timeframe: &str) -> Sourced<ChartSeries> {
        let resolution = self.resolver.resolve(timeframe);

        let fetched = self
            .first_success("series", symbol, |provider, relay| {
                provider.fetch_series(symbol, &resolution, relay)
            })
            .await;

        let Some((raw, source)) = fetched else {
            info!(symbol, timeframe = %resolution.label, "all providers failed, serving mock series");
            return Sourced {
                value: self.mock.generate(symbol, &resolution),
                source: DataSource::Mock,
            };
        };

        let mut candles = aggregate(&raw, resolution.factor);
        if candles.len() > self.max_candles {
            candles.drain(..candles.len() - self.max_candles);
        }
        let indicators = self.engine.compute(&candles);

        Sourced {
            value: ChartSeries {
                candles,
                indicators,
            },
            source,
        }
    }

    pub async fn get_quote(&self, symbol: &str) -> Option<SymbolQuote> {
        self.fetch_quote(symbol).await.map(|sourced| sourced.value)
    }

    /// Latest quote. `None` only when mock quotes are disabled and every
    /// provider failed.
    pub async fn fetch_quote(&self, symbol: &str) -> Option<Sourced<SymbolQuote>> {
        let fetched = self
            .first_success("quote", symbol, |provider, relay| {
                provider.fetch_quote(symbol, relay)
            })
            .await;

        if let Some((value, source)) = fetched {
            return Some(Sourced { value, source });
        }

        if !self.mock_quotes {
            warn!(symbol, "all providers failed and mock quotes are disabled");
            return None;
        }

        info!(symbol, "all providers failed, serving mock quote");
        Some(Sourced {
            value: self.mock.quote(symbol),
            source: DataSource::Mock,
        })
    }

    /// First non-empty provider result, else matches from the mock directory.
    pub async fn search(&self, query: &str) -> Vec<SymbolQuote> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let fetched = self
            .first_success("search", query, |provider, relay| async move {
                match provider.search_symbols(query, relay).await {
                    Ok(hits) if hits.is_empty() => Err(ProviderError::NoDataAvailable),
                    other => other,
                }
            })
            .await;

        match fetched {
            Some((hits, _)) => hits,
            None => self.mock.directory().search(query),
        }
    }
}
