//! Price series: loading, sample generation and alignment into bars.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use chrono::serde::ts_milliseconds;
#[cfg(feature = "serde")]
use serde::Deserialize;

use crate::config::{DataFrequency, DateRange};
use crate::engine::{Bar, Quote, TradingPair};
use crate::errors::{Error, Result};

// [
//   { "timestamp": 1515151515000, "price": 16023.5, "volume": 12.3 },
//   ...
// ]

/// One observed price of a pair.
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    #[cfg_attr(feature = "serde", serde(with = "ts_milliseconds"))]
    timestamp: DateTime<Utc>,
    #[cfg_attr(feature = "serde", serde(alias = "close"))]
    price: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    volume: f64,
}

impl PricePoint {
    /// Creates a price point.
    pub fn new(timestamp: DateTime<Utc>, price: f64, volume: f64) -> Self {
        Self {
            timestamp,
            price,
            volume,
        }
    }

    /// Returns the time of the point.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the price.
    pub fn price(&self) -> f64 {
        self.price
    }

    /// Returns the traded volume, 0 when absent.
    pub fn volume(&self) -> f64 {
        self.volume
    }
}

#[cfg(feature = "serde")]
/// Reads a JSON array of price points from `filepath`.
pub fn load_price_series(filepath: impl AsRef<std::path::Path>) -> Result<Vec<PricePoint>> {
    use std::{fs::File, io::BufReader};

    let file = File::open(filepath)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(Error::from)
}

/// Generates a deterministic price series of `len` bars starting at `start`.
pub fn generate_sample_series(
    start: DateTime<Utc>,
    len: usize,
    seed: i32,
    base_price: f64,
    frequency: DataFrequency,
) -> Vec<PricePoint> {
    let interval = frequency.interval();

    (0..len)
        .map(|i| {
            let i = i as f64;
            // slow drift with a seeded oscillation on top
            let trend = base_price * (1.0 + 0.00001 * i);
            let variation = base_price * 0.004 * (i * 0.05 + seed as f64).sin();
            let noise = base_price * 0.001 * (i * 0.7 + seed as f64 * 1.3).cos();
            let volume = 1.0 + 0.5 * (i * 0.2).sin().abs();

            PricePoint::new(start + interval * (i as i32), trend + variation + noise, volume)
        })
        .collect()
}

/// Aligns the series of several pairs on a common bar grid.
///
/// Each point is assigned to the bar containing it and the last point of a
/// bar wins. Bars outside `range` are dropped, a pair missing from a bar
/// keeps its previous price, and the leading bars are skipped until every
/// pair has been seen once.
pub fn align_bars(
    series: &[(TradingPair, Vec<PricePoint>)],
    range: &DateRange,
    frequency: DataFrequency,
) -> Result<Vec<Bar>> {
    let mut grid: BTreeMap<DateTime<Utc>, BTreeMap<&TradingPair, Quote>> = BTreeMap::new();
    for (pair, points) in series {
        for point in points.iter().filter(|p| range.contains(p.timestamp())) {
            let quote = Quote {
                price: point.price(),
                volume: point.volume(),
            };
            grid.entry(frequency.floor(point.timestamp()))
                .or_default()
                .insert(pair, quote);
        }
    }

    let mut last = BTreeMap::<&TradingPair, Quote>::new();
    let mut bars = Vec::with_capacity(grid.len());
    for (datetime, quotes) in grid {
        for (pair, quote) in quotes {
            last.insert(pair, quote);
        }
        if last.len() < series.len() {
            continue;
        }

        let mut bar = Bar::new(datetime);
        for (pair, quote) in &last {
            bar.insert((*pair).clone(), *quote);
        }
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(Error::BarDataEmpty);
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn pair(exchange: &str) -> TradingPair {
        TradingPair::new("btc_usdt", exchange).unwrap()
    }

    fn range() -> DateRange {
        DateRange::parse("2018-01-01", "2018-01-01").unwrap()
    }

    fn at(minutes: i64, seconds: i64) -> DateTime<Utc> {
        range().start() + Duration::minutes(minutes) + Duration::seconds(seconds)
    }

    #[test]
    fn align_forward_fills_and_skips_leading_bars() {
        let series = vec![
            (
                pair("bitfinex"),
                vec![
                    PricePoint::new(at(0, 0), 100.0, 1.0),
                    PricePoint::new(at(1, 0), 101.0, 1.0),
                    PricePoint::new(at(2, 0), 102.0, 1.0),
                ],
            ),
            (pair("poloniex"), vec![PricePoint::new(at(1, 30), 110.0, 2.0)]),
        ];
        let bars = align_bars(&series, &range(), DataFrequency::Minute).unwrap();

        // minute 0 has no poloniex price yet
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].datetime(), at(1, 0));
        assert_eq!(bars[0].quote(&pair("bitfinex")).unwrap().price, 101.0);
        assert_eq!(bars[0].quote(&pair("poloniex")).unwrap().price, 110.0);
        assert_eq!(bars[1].quote(&pair("bitfinex")).unwrap().price, 102.0);
        // forward filled
        assert_eq!(bars[1].quote(&pair("poloniex")).unwrap().price, 110.0);
    }

    #[test]
    fn align_keeps_the_last_point_of_a_bar() {
        let series = vec![(
            pair("bitfinex"),
            vec![PricePoint::new(at(0, 10), 100.0, 1.0), PricePoint::new(at(0, 50), 105.0, 1.0)],
        )];
        let bars = align_bars(&series, &range(), DataFrequency::Minute).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].quote(&pair("bitfinex")).unwrap().price, 105.0);
    }

    #[test]
    fn align_drops_points_outside_the_range() {
        let series = vec![(
            pair("bitfinex"),
            vec![
                PricePoint::new(at(-1, 0), 90.0, 1.0),
                PricePoint::new(at(5, 0), 100.0, 1.0),
                PricePoint::new(range().end(), 110.0, 1.0),
            ],
        )];
        let bars = align_bars(&series, &range(), DataFrequency::Minute).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].datetime(), at(5, 0));
    }

    #[test]
    fn align_without_data() {
        let series = vec![(pair("bitfinex"), Vec::new())];
        assert!(matches!(
            align_bars(&series, &range(), DataFrequency::Minute),
            Err(Error::BarDataEmpty)
        ));
    }

    #[test]
    fn sample_series_is_deterministic() {
        let a = generate_sample_series(range().start(), 100, 7, 10_000.0, DataFrequency::Minute);
        let b = generate_sample_series(range().start(), 100, 7, 10_000.0, DataFrequency::Minute);
        let c = generate_sample_series(range().start(), 100, 8, 10_000.0, DataFrequency::Minute);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 100);
        assert_eq!(a[1].timestamp() - a[0].timestamp(), Duration::minutes(1));
        assert!(a.iter().all(|p| p.price() > 0.0));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn load_series_from_json() {
        let path = std::env::temp_dir().join(format!("bts_arb_series_{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"timestamp": 1514764800000, "price": 13500.5, "volume": 2.0},
                {"timestamp": 1514764860000, "close": 13510.0}]"#,
        )
        .unwrap();

        let series = load_price_series(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].timestamp(), range().start());
        assert_eq!(series[0].price(), 13500.5);
        assert_eq!(series[1].price(), 13510.0);
        assert_eq!(series[1].volume(), 0.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn load_missing_file() {
        let result = load_price_series("does/not/exist.json");
        assert!(matches!(result, Err(Error::IoError(_))));
    }
}
