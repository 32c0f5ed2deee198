//! Timeframe labels and their mapping onto the natively fetched base units.
//!
//! Compound labels from [`COMPOUND_TIMEFRAMES`] aggregate their base unit.
//! Labels in [`NEAREST_COARSER`] map onto a fixed base with factor 1. Every
//! other label also resolves with factor 1:
//!
//! | label                               | base                         |
//! |-------------------------------------|------------------------------|
//! | `<n><unit>`, unit in `m h d w M`    | smallest base unit >= label  |
//! | longer than a month                 | `1M`                         |
//! | anything else (`5x`, `abc`, ``)     | configured fallback (`1d`)   |

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseUnit {
    Hour,
    Day,
    Week,
    Month,
}

impl BaseUnit {
    pub fn all() -> &'static [BaseUnit] {
        &[BaseUnit::Hour, BaseUnit::Day, BaseUnit::Week, BaseUnit::Month]
    }

    pub fn label(&self) -> &'static str {
        match self {
            BaseUnit::Hour => "1h",
            BaseUnit::Day => "1d",
            BaseUnit::Week => "1w",
            BaseUnit::Month => "1M",
        }
    }

    fn minutes(&self) -> i64 {
        match self {
            BaseUnit::Hour => 60,
            BaseUnit::Day => 60 * 24,
            BaseUnit::Week => 60 * 24 * 7,
            BaseUnit::Month => 60 * 24 * 30,
        }
    }

    /// Length of one bar. A month counts as 30 days.
    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// History requested for a single base bar of output.
    fn base_lookback(&self) -> Duration {
        match self {
            BaseUnit::Hour => Duration::days(30),
            BaseUnit::Day => Duration::days(730),
            BaseUnit::Week => Duration::days(5 * 365),
            BaseUnit::Month => Duration::days(10 * 365),
        }
    }
}

impl fmt::Display for BaseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BaseUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BaseUnit::all()
            .iter()
            .copied()
            .find(|unit| unit.label() == s.trim())
            .ok_or_else(|| format!("unsupported base unit `{s}`"))
    }
}

pub const COMPOUND_TIMEFRAMES: &[(&str, BaseUnit, usize)] = &[
    ("2h", BaseUnit::Hour, 2),
    ("3h", BaseUnit::Hour, 3),
    ("4h", BaseUnit::Hour, 4),
    ("2d", BaseUnit::Day, 2),
    ("3d", BaseUnit::Day, 3),
    ("4d", BaseUnit::Day, 4),
    ("2w", BaseUnit::Week, 2),
    ("3w", BaseUnit::Week, 3),
    ("2M", BaseUnit::Month, 2),
    ("3M", BaseUnit::Month, 3),
];

/// Labels served at the nearest coarser base unit instead of being aggregated.
pub const NEAREST_COARSER: &[(&str, BaseUnit)] = &[
    ("6d", BaseUnit::Week),
    ("7d", BaseUnit::Week),
    ("5w", BaseUnit::Month),
    ("6w", BaseUnit::Month),
];

/// How much history an adapter should request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeHint {
    pub lookback: Duration,
    /// Fewer base bars than this cannot fill one output bucket.
    pub min_bars: usize,
}

impl RangeHint {
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.lookback
    }

    /// Rough count of base bars covered by the lookback.
    pub fn expected_bars(&self, base: BaseUnit) -> i64 {
        self.lookback.num_minutes() / base.minutes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub label: String,
    pub base: BaseUnit,
    pub factor: usize,
    pub range: RangeHint,
}

impl Resolution {
    fn new(label: &str, base: BaseUnit, factor: usize) -> Self {
        Resolution {
            label: label.to_string(),
            base,
            factor,
            range: RangeHint {
                lookback: base.base_lookback() * factor as i32,
                min_bars: factor,
            },
        }
    }

    /// Length of one output candle.
    pub fn interval(&self) -> Duration {
        self.base.duration() * self.factor as i32
    }
}

#[derive(Debug, Clone)]
pub struct TimeframeResolver {
    fallback_base: BaseUnit,
}

impl Default for TimeframeResolver {
    fn default() -> Self {
        TimeframeResolver::new(BaseUnit::Day)
    }
}

impl TimeframeResolver {
    pub fn new(fallback_base: BaseUnit) -> Self {
        TimeframeResolver { fallback_base }
    }

    pub fn resolve(&self, label: &str) -> Resolution {
        let label = label.trim();

        if let Some(base) = BaseUnit::all().iter().find(|u| u.label() == label) {
            return Resolution::new(label, *base, 1);
        }

        if let Some((_, base, factor)) = COMPOUND_TIMEFRAMES.iter().find(|(l, _, _)| *l == label) {
            return Resolution::new(label, *base, *factor);
        }

        if let Some((_, base)) = NEAREST_COARSER.iter().find(|(l, _)| *l == label) {
            return Resolution::new(label, *base, 1);
        }

        let base = match label_minutes(label) {
            Some(minutes) => BaseUnit::all()
                .iter()
                .copied()
                .find(|unit| unit.minutes() >= minutes)
                .unwrap_or(BaseUnit::Month),
            None => self.fallback_base,
        };
        Resolution::new(label, base, 1)
    }
}

fn label_minutes(label: &str) -> Option<i64> {
    let unit = label.chars().last()?;
    let count: i64 = label[..label.len() - unit.len_utf8()].parse().ok()?;
    if count <= 0 {
        return None;
    }

    let per_unit = match unit {
        'm' => 1,
        'h' | 'H' => 60,
        'd' | 'D' => 60 * 24,
        'w' | 'W' => 60 * 24 * 7,
        'M' => 60 * 24 * 30,
        _ => return None,
    };
    count.checked_mul(per_unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_units_resolve_to_themselves() {
        let resolver = TimeframeResolver::default();
        for unit in BaseUnit::all() {
            let res = resolver.resolve(unit.label());
            assert_eq!(res.base, *unit);
            assert_eq!(res.factor, 1);
        }
    }

    #[test]
    fn compound_labels_aggregate() {
        let resolver = TimeframeResolver::default();

        let res = resolver.resolve("3h");
        assert_eq!(res.base, BaseUnit::Hour);
        assert_eq!(res.factor, 3);
        assert_eq!(res.interval(), Duration::hours(3));
        assert_eq!(res.range.min_bars, 3);
        assert_eq!(res.range.lookback, Duration::days(90));

        let res = resolver.resolve("2M");
        assert_eq!((res.base, res.factor), (BaseUnit::Month, 2));
    }

    #[test]
    fn unknown_labels_use_fallback_table() {
        let resolver = TimeframeResolver::default();

        let res = resolver.resolve("5x");
        assert_eq!((res.base, res.factor), (BaseUnit::Day, 1));

        let cases = [
            ("15m", BaseUnit::Hour),
            ("6h", BaseUnit::Day),
            ("6d", BaseUnit::Week),
            ("7d", BaseUnit::Week),
            ("5w", BaseUnit::Month),
            ("6M", BaseUnit::Month),
        ];
        for (label, base) in cases {
            let res = resolver.resolve(label);
            assert_eq!((res.base, res.factor), (base, 1), "label {label}");
        }

        let weekly = TimeframeResolver::new(BaseUnit::Week);
        assert_eq!(weekly.resolve("").base, BaseUnit::Week);
        assert_eq!(weekly.resolve("0h").base, BaseUnit::Week);
    }

    #[test]
    fn listed_coarser_labels_use_fixed_base() {
        let resolver = TimeframeResolver::new(BaseUnit::Hour);
        for (label, base) in NEAREST_COARSER {
            let res = resolver.resolve(label);
            assert_eq!((res.base, res.factor), (*base, 1), "label {label}");
            assert_eq!(res.label, *label);
        }
        assert!(NEAREST_COARSER
            .iter()
            .all(|(label, _)| COMPOUND_TIMEFRAMES.iter().all(|(c, _, _)| c != label)));
    }

    #[test]
    fn base_unit_parses_from_label() {
        assert_eq!("1w".parse::<BaseUnit>(), Ok(BaseUnit::Week));
        assert!("2w".parse::<BaseUnit>().is_err());
    }

    #[test]
    fn range_hint_covers_at_least_one_bucket() {
        let resolver = TimeframeResolver::default();
        for (label, _, _) in COMPOUND_TIMEFRAMES {
            let res = resolver.resolve(label);
            assert!(res.range.expected_bars(res.base) >= res.range.min_bars as i64);
        }
    }
}
