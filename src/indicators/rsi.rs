/// Placeholder emitted until enough history exists for a real RSI value.
pub const NEUTRAL_RSI: f64 = 50.0;

#[derive(Debug, Clone, Copy, Default)]
struct WilderState {
    avg_gain: f64,
    avg_loss: f64,
}

impl WilderState {
    fn rsi(&self) -> f64 {
        if self.avg_loss == 0.0 {
            return 100.0;
        }
        100.0 - 100.0 / (1.0 + self.avg_gain / self.avg_loss)
    }
}

/// Relative strength index with Wilder smoothing.
///
/// Indices below `period` hold [`NEUTRAL_RSI`]. At `period` the averages are
/// seeded with the simple mean of the first `period` moves, after which each
/// step folds one more move into the running averages.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let period = period.max(1);
    let mut out = Vec::with_capacity(closes.len());
    let mut state = WilderState::default();
    let mut seed_gain = 0.0;
    let mut seed_loss = 0.0;
    let n = period as f64;

    for i in 0..closes.len() {
        let (gain, loss) = if i == 0 {
            (0.0, 0.0)
        } else {
            let change = closes[i] - closes[i - 1];
            (change.max(0.0), (-change).max(0.0))
        };

        if i < period {
            seed_gain += gain;
            seed_loss += loss;
            out.push(NEUTRAL_RSI);
            continue;
        }

        if i == period {
            state.avg_gain = (seed_gain + gain) / n;
            state.avg_loss = (seed_loss + loss) / n;
        } else {
            state.avg_gain = (state.avg_gain * (n - 1.0) + gain) / n;
            state.avg_loss = (state.avg_loss * (n - 1.0) + loss) / n;
        }
        out.push(state.rsi());
    }

    out
}
