/// Offset used for the bands before a full window is available.
pub const SEED_BAND_OFFSET: f64 = 10.0;

/// Trailing simple moving average. Until the window fills, each slot simply
/// repeats its input value.
pub fn trailing_sma(values: &[f64], period: usize) -> Vec<f64> {
    let period = period.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut window_sum = 0.0;

    for (i, value) in values.iter().enumerate() {
        window_sum += value;
        if i >= period {
            window_sum -= values[i - period];
        }

        if i + 1 < period {
            out.push(*value);
        } else {
            out.push(window_sum / period as f64);
        }
    }

    out
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bands {
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Bollinger bands over `values` using the population standard deviation of
/// each trailing window around its simple mean.
pub fn bollinger(values: &[f64], period: usize, multiplier: f64) -> Bands {
    let period = period.max(1);
    let means = trailing_sma(values, period);
    let mut bands = Bands {
        upper: Vec::with_capacity(values.len()),
        lower: Vec::with_capacity(values.len()),
    };

    for (i, value) in values.iter().enumerate() {
        if i + 1 < period {
            bands.upper.push(value + SEED_BAND_OFFSET);
            bands.lower.push(value - SEED_BAND_OFFSET);
            continue;
        }

        let window = &values[i + 1 - period..=i];
        let mean = means[i];
        let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        let std_dev = variance.sqrt();

        bands.upper.push(mean + multiplier * std_dev);
        bands.lower.push(mean - multiplier * std_dev);
    }

    bands
}
