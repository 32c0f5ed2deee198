use super::Candle;

/// Merges every `factor` consecutive candles into one. The trailing partial
/// bucket is kept.
pub fn aggregate(candles: &[Candle], factor: usize) -> Vec<Candle> {
    let factor = factor.max(1);
    if factor == 1 {
        return candles.to_vec();
    }

    candles
        .chunks(factor)
        .map(|bucket| {
            let first = bucket[0];
            let last = bucket[bucket.len() - 1];
            Candle {
                timestamp: first.timestamp,
                open: first.open,
                high: bucket.iter().map(|c| c.high).fold(f64::MIN, f64::max),
                low: bucket.iter().map(|c| c.low).fold(f64::MAX, f64::min),
                close: last.close,
                volume: bucket
                    .iter()
                    .fold(0u64, |total, c| total.saturating_add(c.volume)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Vec<Candle> {
        (0..len)
            .map(|i| {
                let base = 100.0 + ((i * 7) % 11) as f64 - 5.0;
                let close = base + ((i * 3) % 5) as f64 - 2.0;
                Candle {
                    timestamp: i as i64 * 3_600_000,
                    open: base,
                    high: base.max(close) + (i % 3) as f64,
                    low: base.min(close) - (i % 4) as f64,
                    close,
                    volume: 1_000 + i as u64 * 13,
                }
            })
            .collect()
    }

    #[test]
    fn factor_one_is_identity() {
        let candles = sample(10);
        assert_eq!(aggregate(&candles, 1), candles);
        assert_eq!(aggregate(&candles, 0), candles);
    }

    #[test]
    fn buckets_take_first_open_last_close() {
        let candles = sample(7);
        let out = aggregate(&candles, 3);

        // 3 + 3 + 1, the short tail is kept
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].timestamp, candles[0].timestamp);
        assert_eq!(out[0].open, candles[0].open);
        assert_eq!(out[0].close, candles[2].close);
        assert_eq!(out[2], candles[6]);

        let high = candles[3..6].iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let low = candles[3..6].iter().map(|c| c.low).fold(f64::MAX, f64::min);
        assert_eq!(out[1].high, high);
        assert_eq!(out[1].low, low);
    }

    #[test]
    fn conserves_volume_and_keeps_invariants() {
        let candles = sample(50);
        for factor in 1..=7 {
            let out = aggregate(&candles, factor);
            let input_volume: u64 = candles.iter().map(|c| c.volume).sum();
            let output_volume: u64 = out.iter().map(|c| c.volume).sum();
            assert_eq!(input_volume, output_volume);
            assert!(out.iter().all(|c| c.is_consistent()));
            assert!(out.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        }
    }

    #[test]
    fn aggregation_composes() {
        let candles = sample(36);
        let twice = aggregate(&aggregate(&candles, 2), 3);
        let once = aggregate(&candles, 6);
        assert_eq!(twice, once);
    }

    #[test]
    fn oversized_volumes_saturate() {
        let mut candles = sample(2);
        candles[0].volume = u64::MAX - 1;
        candles[1].volume = u64::MAX - 1;

        let out = aggregate(&candles, 2);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].volume, u64::MAX);
    }

    #[test]
    fn empty_input() {
        assert!(aggregate(&[], 4).is_empty());
    }
}
