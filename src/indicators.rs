use crate::data::{Candle, IndicatorPoint};

pub mod bands;
pub mod rsi;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub ma_period: usize,
    pub bb_period: usize,
    pub bb_multiplier: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            rsi_period: 14,
            ma_period: 14,
            bb_period: 20,
            bb_multiplier: 2.0,
        }
    }
}

/// RSI, its moving average and Bollinger bands on the RSI line.
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        IndicatorEngine { config }
    }

    pub fn compute(&self, candles: &[Candle]) -> Vec<IndicatorPoint> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let rsi = rsi::rsi(&closes, self.config.rsi_period);
        let ma = bands::trailing_sma(&rsi, self.config.ma_period);
        let bb = bands::bollinger(&rsi, self.config.bb_period, self.config.bb_multiplier);

        candles
            .iter()
            .enumerate()
            .map(|(i, candle)| IndicatorPoint {
                timestamp: candle.timestamp,
                value: rsi[i],
                ma: ma[i],
                upper_bb: bb.upper[i],
                lower_bb: bb.lower[i],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle {
                timestamp: 1_700_000_000_000 + i as i64 * 86_400_000,
                open: *close,
                high: close + 0.5,
                low: close - 0.5,
                close: *close,
                volume: 500,
            })
            .collect()
    }

    #[test]
    fn points_align_with_candles() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.4).sin() * 4.0).collect();
        let input = candles(&closes);
        let points = IndicatorEngine::default().compute(&input);

        assert_eq!(points.len(), input.len());
        for (point, candle) in points.iter().zip(input.iter()) {
            assert_eq!(point.timestamp, candle.timestamp);
            assert!((0.0..=100.0).contains(&point.value));
        }
    }

    #[test]
    fn seed_conventions_hold() {
        let closes: Vec<f64> = (0..40).map(|i| 50.0 + (i % 5) as f64).collect();
        let points = IndicatorEngine::default().compute(&candles(&closes));

        // ma and bands repeat the neutral RSI inside the seed window
        for point in &points[..13] {
            assert_eq!(point.value, 50.0);
            assert_eq!(point.ma, 50.0);
            assert_eq!(point.upper_bb - point.lower_bb, 20.0);
        }
    }

    #[test]
    fn custom_periods_are_respected() {
        let config = IndicatorConfig {
            rsi_period: 3,
            ma_period: 2,
            bb_period: 4,
            bb_multiplier: 1.0,
        };
        let points = IndicatorEngine::new(config).compute(&candles(&[1.0, 2.0, 3.0, 4.0, 5.0]));

        assert_eq!(points[2].value, 50.0);
        assert_eq!(points[3].value, 100.0);
        assert_eq!(points[3].ma, 75.0);
        assert_eq!(points[2].upper_bb - points[2].lower_bb, 20.0);
    }

    #[test]
    fn empty_input() {
        assert!(IndicatorEngine::default().compute(&[]).is_empty());
    }
}
