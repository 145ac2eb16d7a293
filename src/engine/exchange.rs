use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Maker and taker fees of a venue, as fractions (e.g. 0.002 for 0.2%).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradingFees {
    /// Fee charged when an order provides liquidity.
    pub maker: f64,
    /// Fee charged when an order takes liquidity.
    pub taker: f64,
}

/// Fee schedule of a venue.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    /// Spot trading fees.
    pub trading: TradingFees,
}

/// A trading venue and its fee schedule.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    name: String,
    fees: FeeSchedule,
}

impl Exchange {
    /// Creates a venue with the given maker and taker fee fractions.
    pub fn new(name: impl Into<String>, maker: f64, taker: f64) -> Self {
        Self {
            name: name.into(),
            fees: FeeSchedule {
                trading: TradingFees { maker, taker },
            },
        }
    }

    /// Returns the venue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fee schedule.
    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Returns the taker fee fraction.
    pub fn taker_fee(&self) -> f64 {
        self.fees.trading.taker
    }
}

/// A tradable instrument on one exchange, e.g. `btc_usdt` on `bitfinex`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradingPair {
    symbol: String,
    exchange: String,
}

impl TradingPair {
    /// Builds a pair after checking the `base_quote` form of the symbol.
    pub fn new(symbol: &str, exchange: &str) -> Result<Self> {
        let symbol = symbol.trim().to_lowercase();
        let valid = matches!(
            symbol.split_once('_'),
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() && !quote.contains('_')
        );
        if !valid {
            return Err(Error::InvalidSymbol(symbol));
        }

        Ok(Self {
            symbol,
            exchange: exchange.to_owned(),
        })
    }

    /// Returns the symbol, e.g. `btc_usdt`.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the exchange name the pair trades on.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Returns the base currency, e.g. `btc`.
    pub fn base(&self) -> &str {
        self.symbol.split_once('_').map(|(base, _)| base).unwrap_or(&self.symbol)
    }

    /// Returns the quote currency, e.g. `usdt`.
    pub fn quote(&self) -> &str {
        self.symbol.split_once('_').map(|(_, quote)| quote).unwrap_or_default()
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.exchange)
    }
}

/// Registry of the venues available to a run, keyed by name.
#[derive(Debug, Clone)]
pub struct Exchanges {
    venues: BTreeMap<String, Exchange>,
}

impl Default for Exchanges {
    /// Known venues with their published spot fees.
    fn default() -> Self {
        let mut exchanges = Self::empty();
        exchanges.insert(Exchange::new("bitfinex", 0.001, 0.002));
        exchanges.insert(Exchange::new("poloniex", 0.0015, 0.0025));
        exchanges
    }
}

impl Exchanges {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self { venues: BTreeMap::new() }
    }

    /// Adds or replaces a venue.
    pub fn insert(&mut self, exchange: Exchange) {
        self.venues.insert(exchange.name().to_owned(), exchange);
    }

    /// Keeps only the named venues, failing on the first unknown name.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut selected = Self::empty();
        for name in names {
            selected.insert(self.get(name.as_ref())?.clone());
        }
        Ok(selected)
    }

    /// Returns the venue with the given name.
    pub fn get(&self, name: &str) -> Result<&Exchange> {
        self.venues
            .get(name.trim())
            .ok_or_else(|| Error::ExchangeNotFound(name.to_owned()))
    }

    /// Resolves `symbol` on the named venue.
    pub fn symbol(&self, symbol: &str, exchange: &str) -> Result<TradingPair> {
        let exchange = self.get(exchange)?;
        TradingPair::new(symbol, exchange.name())
    }

    /// Returns true if the venue is part of the registry.
    pub fn contains(&self, name: &str) -> bool {
        self.venues.contains_key(name)
    }

    /// Returns an iterator over the venues.
    pub fn iter(&self) -> impl Iterator<Item = &Exchange> {
        self.venues.values()
    }
}

#[cfg(test)]
#[test]
fn default_venues_expose_taker_fees() {
    let exchanges = Exchanges::default();
    assert_eq!(exchanges.get("bitfinex").unwrap().fees().trading.taker, 0.002);
    assert_eq!(exchanges.get("poloniex").unwrap().taker_fee(), 0.0025);
}

#[cfg(test)]
#[test]
fn unknown_exchange() {
    let exchanges = Exchanges::default();
    assert!(matches!(exchanges.get("kraken"), Err(Error::ExchangeNotFound(_))));
    assert!(matches!(
        exchanges.select(&["bitfinex", "kraken"]),
        Err(Error::ExchangeNotFound(name)) if name == "kraken"
    ));
}

#[cfg(test)]
#[test]
fn select_keeps_named_venues() {
    let exchanges = Exchanges::default().select(&["poloniex"]).unwrap();
    assert!(exchanges.contains("poloniex"));
    assert!(!exchanges.contains("bitfinex"));
    assert_eq!(exchanges.iter().count(), 1);
}

#[cfg(test)]
#[test]
fn resolve_symbol() {
    let exchanges = Exchanges::default();
    let pair = exchanges.symbol("BTC_USDT", "bitfinex").unwrap();
    assert_eq!(pair.symbol(), "btc_usdt");
    assert_eq!(pair.exchange(), "bitfinex");
    assert_eq!(pair.base(), "btc");
    assert_eq!(pair.quote(), "usdt");
    assert_eq!(pair.to_string(), "btc_usdt@bitfinex");
}

#[cfg(test)]
#[test]
fn invalid_symbols() {
    for symbol in ["btcusdt", "_usdt", "btc_", "btc_usdt_eth"] {
        assert!(matches!(TradingPair::new(symbol, "bitfinex"), Err(Error::InvalidSymbol(_))));
    }
}
