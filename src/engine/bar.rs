use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::TradingPair;
use crate::errors::{Error, Result};

/// Price and volume of one pair within a bar.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    /// Last traded price.
    pub price: f64,
    /// Traded volume in the bar.
    pub volume: f64,
}

/// One simulated time step: the quotes of every pair at `datetime`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    datetime: DateTime<Utc>,
    quotes: BTreeMap<TradingPair, Quote>,
}

impl Bar {
    /// Creates a bar without quotes.
    pub fn new(datetime: DateTime<Utc>) -> Self {
        Self {
            datetime,
            quotes: BTreeMap::new(),
        }
    }

    /// Adds or replaces the quote of `pair`.
    pub fn with_quote(mut self, pair: TradingPair, price: f64, volume: f64) -> Self {
        self.insert(pair, Quote { price, volume });
        self
    }

    pub(crate) fn insert(&mut self, pair: TradingPair, quote: Quote) {
        self.quotes.insert(pair, quote);
    }

    /// Returns the bar time.
    pub fn datetime(&self) -> DateTime<Utc> {
        self.datetime
    }

    /// Returns the quote of `pair`, if any.
    pub fn quote(&self, pair: &TradingPair) -> Option<&Quote> {
        self.quotes.get(pair)
    }

    /// Returns an iterator over the quotes of the bar.
    pub fn quotes(&self) -> impl Iterator<Item = (&TradingPair, &Quote)> {
        self.quotes.iter()
    }
}

/// Field of a quote to read with [`BarData::current`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Last traded price.
    Price,
    /// Traded volume.
    Volume,
}

/// Read-only view of the current bar handed to the algorithm.
#[derive(Debug, Clone, Copy)]
pub struct BarData<'b> {
    bar: &'b Bar,
}

impl<'b> From<&'b Bar> for BarData<'b> {
    fn from(bar: &'b Bar) -> Self {
        Self { bar }
    }
}

impl BarData<'_> {
    /// Returns the current value of `field` for `asset`.
    pub fn current(&self, asset: &TradingPair, field: Field) -> Result<f64> {
        let quote = self
            .bar
            .quote(asset)
            .ok_or_else(|| Error::PriceNotFound(asset.to_string()))?;
        Ok(match field {
            Field::Price => quote.price,
            Field::Volume => quote.volume,
        })
    }

    /// Returns the time of the current bar.
    pub fn current_dt(&self) -> DateTime<Utc> {
        self.bar.datetime()
    }
}

#[cfg(test)]
#[test]
fn current_price_and_volume() {
    let pair = TradingPair::new("btc_usdt", "bitfinex").unwrap();
    let bar = Bar::new(DateTime::default()).with_quote(pair.clone(), 100.5, 3.0);
    let data = BarData::from(&bar);

    assert_eq!(data.current(&pair, Field::Price).unwrap(), 100.5);
    assert_eq!(data.current(&pair, Field::Volume).unwrap(), 3.0);
    assert_eq!(data.current_dt(), DateTime::<Utc>::default());
}

#[cfg(test)]
#[test]
fn current_price_missing() {
    let pair = TradingPair::new("btc_usdt", "bitfinex").unwrap();
    let other = TradingPair::new("btc_usdt", "poloniex").unwrap();
    let bar = Bar::new(DateTime::default()).with_quote(pair, 100.0, 0.0);
    let data = BarData::from(&bar);

    assert!(matches!(
        data.current(&other, Field::Price),
        Err(Error::PriceNotFound(asset)) if asset == "btc_usdt@poloniex"
    ));
}
