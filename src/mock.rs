use crate::data::timeframe::Resolution;
use crate::data::{Candle, ChartSeries, SymbolQuote};
use crate::indicators::IndicatorEngine;
use chrono::Utc;
use rand::Rng;

pub const MOCK_PERIODS: usize = 200;
const GENERIC_BASE_PRICE: f64 = 100.0;
const START_DISCOUNT: f64 = 0.95;
const STEP_VOLATILITY: f64 = 0.015;
const WICK_SPREAD: f64 = 0.008;
const PRICE_FLOOR: f64 = 0.01;
const QUOTE_VARIATION: f64 = 0.02;
const MAX_SEARCH_RESULTS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceQuote {
    pub symbol: &'static str,
    pub name: &'static str,
    pub price: f64,
    pub change: f64,
}

const fn reference(
    symbol: &'static str,
    name: &'static str,
    price: f64,
    change: f64,
) -> ReferenceQuote {
    ReferenceQuote {
        symbol,
        name,
        price,
        change,
    }
}

const BUILTIN_REFERENCES: &[ReferenceQuote] = &[
    reference("AAPL", "Apple Inc.", 178.25, 2.15),
    reference("GOOGL", "Alphabet Inc.", 142.87, -1.23),
    reference("MSFT", "Microsoft Corp.", 378.90, 5.67),
    reference("TSLA", "Tesla Inc.", 248.42, -8.90),
    reference("AMZN", "Amazon.com Inc.", 155.73, 3.22),
    reference("NVDA", "NVIDIA Corp.", 875.28, 12.45),
    reference("META", "Meta Platforms Inc.", 485.67, -2.89),
    reference("BTC-USD", "Bitcoin USD", 67250.00, 1250.75),
    reference("ETH-USD", "Ethereum USD", 3425.80, -45.20),
    reference("SPY", "SPDR S&P 500 ETF", 542.18, 2.87),
    reference("QQQ", "Invesco QQQ Trust", 425.67, 3.45),
    reference("RELIANCE.NS", "Reliance Industries Ltd.", 2456.75, 23.45),
    reference("TCS.NS", "Tata Consultancy Services Ltd.", 3441.10, -12.30),
    reference("HDFCBANK.NS", "HDFC Bank Ltd.", 1515.40, 8.75),
    reference("INFY.NS", "Infosys Ltd.", 1789.25, -5.60),
];

/// Read-only table of reference prices used to anchor synthetic data.
#[derive(Debug, Clone)]
pub struct MockDirectory {
    entries: Vec<ReferenceQuote>,
}

impl Default for MockDirectory {
    fn default() -> Self {
        MockDirectory {
            entries: BUILTIN_REFERENCES.to_vec(),
        }
    }
}

fn bare_ticker(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    [".NS", ".BO", "-USD"]
        .iter()
        .find_map(|suffix| upper.strip_suffix(suffix))
        .map(str::to_string)
        .unwrap_or(upper)
}

impl MockDirectory {
    /// Exact ticker first, then the bare ticker so `BTC` finds `BTC-USD`.
    pub fn lookup(&self, symbol: &str) -> Option<&ReferenceQuote> {
        let upper = symbol.trim().to_uppercase();
        self.entries
            .iter()
            .find(|entry| entry.symbol == upper)
            .or_else(|| {
                let bare = bare_ticker(&upper);
                self.entries
                    .iter()
                    .find(|entry| bare_ticker(entry.symbol) == bare)
            })
    }

    pub fn search(&self, query: &str) -> Vec<SymbolQuote> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.entries
            .iter()
            .filter(|entry| {
                entry.symbol.to_lowercase().contains(&needle)
                    || entry.name.to_lowercase().contains(&needle)
            })
            .take(MAX_SEARCH_RESULTS)
            .map(|entry| SymbolQuote::listing(entry.symbol, entry.name))
            .collect()
    }
}

/// Synthetic candles and quotes for when every provider has failed.
#[derive(Debug, Clone, Default)]
pub struct MockDataGenerator {
    directory: MockDirectory,
    engine: IndicatorEngine,
}

impl MockDataGenerator {
    pub fn new(directory: MockDirectory, engine: IndicatorEngine) -> Self {
        MockDataGenerator { directory, engine }
    }

    pub fn directory(&self) -> &MockDirectory {
        &self.directory
    }

    pub fn generate(&self, symbol: &str, resolution: &Resolution) -> ChartSeries {
        let mut rng = rand::rng();
        let now = Utc::now().timestamp_millis();
        self.generate_with(&mut rng, symbol, resolution, now)
    }

    pub fn generate_with<R: Rng>(
        &self,
        rng: &mut R,
        symbol: &str,
        resolution: &Resolution,
        now_ms: i64,
    ) -> ChartSeries {
        let reference_price = self
            .directory
            .lookup(symbol)
            .map(|entry| entry.price)
            .unwrap_or(GENERIC_BASE_PRICE);
        let interval_ms = resolution.interval().num_milliseconds();

        let mut candles = Vec::with_capacity(MOCK_PERIODS);
        let mut current = reference_price * START_DISCOUNT;

        for i in 0..MOCK_PERIODS {
            let change = (rng.random::<f64>() - 0.5) * STEP_VOLATILITY * current;
            let open = current;
            let close = (current + change).max(PRICE_FLOOR);
            let high = open.max(close) * (1.0 + rng.random::<f64>() * WICK_SPREAD);
            let low = open.min(close) * (1.0 - rng.random::<f64>() * WICK_SPREAD);
            let volume = rng.random_range(100_000..1_100_000);

            candles.push(Candle {
                timestamp: now_ms - (MOCK_PERIODS - i) as i64 * interval_ms,
                open,
                high,
                low,
                close,
                volume,
            });

            current = close;
        }

        let indicators = self.engine.compute(&candles);
        ChartSeries {
            candles,
            indicators,
        }
    }

    pub fn quote(&self, symbol: &str) -> SymbolQuote {
        let mut rng = rand::rng();
        self.quote_with(&mut rng, symbol)
    }

    pub fn quote_with<R: Rng>(&self, rng: &mut R, symbol: &str) -> SymbolQuote {
        if let Some(entry) = self.directory.lookup(symbol) {
            let variation = (rng.random::<f64>() - 0.5) * QUOTE_VARIATION;
            let price = entry.price * (1.0 + variation);
            let change = entry.change + variation * price;
            return SymbolQuote {
                symbol: entry.symbol.to_string(),
                name: entry.name.to_string(),
                price,
                change,
                change_percent: change / (price - change) * 100.0,
            };
        }

        let price = rng.random_range(50.0..550.0);
        let change = rng.random_range(-10.0..10.0);
        let ticker = symbol.trim().to_uppercase();
        SymbolQuote {
            name: format!("{ticker} Company"),
            symbol: ticker,
            price,
            change,
            change_percent: change / (price - change) * 100.0,
        }
    }
}
