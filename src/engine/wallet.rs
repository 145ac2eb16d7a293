use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{Bar, Fill, TradingPair};
use crate::errors::{Error, Result};

/// Cash and holdings of a run.
///
/// No margin checks are made: cash and holdings may go negative.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Wallet {
    // Starting capital used for reset
    capital_base: f64,
    // Quote currency available
    cash: f64,
    // Signed amount held per pair
    #[cfg_attr(feature = "serde", serde(skip))]
    holdings: BTreeMap<TradingPair, f64>,
    // Last known price per pair
    #[cfg_attr(feature = "serde", serde(skip))]
    last_prices: BTreeMap<TradingPair, f64>,
    // Cumulative fees paid
    fees: f64,
}

impl Wallet {
    /// Creates a new wallet with the given starting capital.
    /// Non-positive capital is rejected.
    pub fn new(capital_base: f64) -> Result<Self> {
        if capital_base <= 0.0 || !capital_base.is_finite() {
            return Err(Error::NegZeroCapital(capital_base));
        }

        Ok(Self {
            capital_base,
            cash: capital_base,
            holdings: BTreeMap::new(),
            last_prices: BTreeMap::new(),
            fees: 0.0,
        })
    }

    /// Returns the starting capital.
    pub fn capital_base(&self) -> f64 {
        self.capital_base
    }

    /// Returns the cash balance.
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Returns the amount held of `asset`.
    pub fn holding(&self, asset: &TradingPair) -> f64 {
        self.holdings.get(asset).copied().unwrap_or_default()
    }

    /// Returns the fees paid to the venues.
    pub fn fees_paid(&self) -> f64 {
        self.fees
    }

    /// Returns cash plus holdings valued at their last known price.
    pub fn portfolio_value(&self) -> f64 {
        let positions = self
            .holdings
            .iter()
            .map(|(asset, amount)| amount * self.last_prices.get(asset).copied().unwrap_or_default())
            .sum::<f64>();
        self.cash + positions
    }

    /// Records the prices of the bar as the last known prices.
    pub(crate) fn mark(&mut self, bar: &Bar) {
        for (asset, quote) in bar.quotes() {
            self.last_prices.insert(asset.clone(), quote.price);
        }
    }

    /// Applies an executed order: moves cash, updates holdings, charges the fee.
    pub(crate) fn apply(&mut self, fill: &Fill) {
        self.cash -= fill.amount * fill.price;
        self.cash -= fill.fee;
        self.fees += fill.fee;
        *self.holdings.entry(fill.asset.clone()).or_default() += fill.amount;
    }

    /// Resets the wallet to its starting capital.
    pub(crate) fn reset(&mut self) {
        self.fees = 0.0;
        self.cash = self.capital_base;
        self.holdings.clear();
        self.last_prices.clear();
    }
}
