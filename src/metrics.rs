//! Performance record of a backtest.
//!
//! The engine appends one [`PerfRecord`] per bar: portfolio value, cash,
//! the return of the step and the annualized volatility of all returns so
//! far. The record is handed to the algorithm's `analyze` callback once the
//! run is over.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::PriceCalculus;
use crate::engine::{Fill, Wallet};

/// State of the portfolio at the end of one bar.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerfRecord {
    /// Bar time.
    pub datetime: DateTime<Utc>,
    /// Cash plus holdings at the last known prices.
    pub portfolio_value: f64,
    /// Cash balance.
    pub cash: f64,
    /// Return of the step, relative to the previous portfolio value.
    pub returns: f64,
    /// Annualized sample standard deviation of the returns so far.
    pub algo_volatility: f64,
    /// Cumulative fees paid.
    pub fees: f64,
}

/// Time series of [`PerfRecord`]s plus the fills of the run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Performance {
    capital_base: f64,
    periods_per_year: f64,
    records: Vec<PerfRecord>,
    fills: Vec<Fill>,
    // running mean and sum of squared deviations of the returns (Welford)
    mean: f64,
    m2: f64,
}

impl Performance {
    /// Creates an empty record for a run starting with `capital_base`.
    pub fn new(capital_base: f64, periods_per_year: f64) -> Self {
        Self {
            capital_base,
            periods_per_year,
            records: Vec::new(),
            fills: Vec::new(),
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Appends the state of `wallet` at `datetime`.
    pub(crate) fn record(&mut self, datetime: DateTime<Utc>, wallet: &Wallet) {
        let previous = self.last().map(|r| r.portfolio_value).unwrap_or(self.capital_base);
        let portfolio_value = wallet.portfolio_value();
        // no return is defined from a wiped out portfolio
        let returns = if previous > 0.0 { previous.change(portfolio_value) } else { 0.0 };

        let n = (self.records.len() + 1) as f64;
        let delta = returns - self.mean;
        self.mean += delta / n;
        self.m2 += delta * (returns - self.mean);

        let algo_volatility = if n >= 2.0 {
            (self.m2 / (n - 1.0)).sqrt() * self.periods_per_year.sqrt()
        } else {
            0.0
        };

        self.records.push(PerfRecord {
            datetime,
            portfolio_value,
            cash: wallet.cash(),
            returns,
            algo_volatility,
            fees: wallet.fees_paid(),
        });
    }

    pub(crate) fn add_fill(&mut self, fill: Fill) {
        self.fills.push(fill);
    }

    /// Returns the starting capital.
    pub fn capital_base(&self) -> f64 {
        self.capital_base
    }

    /// Returns the number of bars in a year used to annualize the volatility.
    pub fn periods_per_year(&self) -> f64 {
        self.periods_per_year
    }

    /// Returns an iterator over the records.
    pub fn records(&self) -> std::slice::Iter<'_, PerfRecord> {
        self.records.iter()
    }

    /// Returns an iterator over the fills.
    pub fn fills(&self) -> std::slice::Iter<'_, Fill> {
        self.fills.iter()
    }

    /// Returns the last record, if any.
    pub fn last(&self) -> Option<&PerfRecord> {
        self.records.last()
    }

    /// Returns the portfolio value series.
    pub fn portfolio_value(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.records.iter().map(|r| (r.datetime, r.portfolio_value))
    }

    /// Returns the algo volatility series.
    pub fn algo_volatility(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.records.iter().map(|r| (r.datetime, r.algo_volatility))
    }

    /// Returns the final portfolio value, or the starting capital if nothing was recorded.
    pub fn ending_value(&self) -> f64 {
        self.last().map(|r| r.portfolio_value).unwrap_or(self.capital_base)
    }

    /// Returns the total return of the run as a fraction.
    pub fn total_return(&self) -> f64 {
        self.capital_base.change(self.ending_value())
    }

    /// Returns the cumulative fees paid.
    pub fn fees(&self) -> f64 {
        self.last().map(|r| r.fees).unwrap_or_default()
    }

    /// Computes the maximum drawdown of the portfolio value as a fraction.
    pub fn max_drawdown(&self) -> f64 {
        let mut max_peak = self.capital_base;
        let mut max_drawdown = 0.0;

        for record in &self.records {
            if record.portfolio_value > max_peak {
                max_peak = record.portfolio_value;
            }
            let drawdown = (max_peak - record.portfolio_value) / max_peak;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        max_drawdown
    }
}

impl fmt::Display for Performance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Backtest Performance ===")?;
        writeln!(f, "Capital Base: {:.2}", self.capital_base)?;
        writeln!(f, "Ending Value: {:.2}", self.ending_value())?;
        writeln!(f, "Total Return: {:.4}%", self.total_return() * 100.0)?;
        writeln!(f, "Max Drawdown: {:.4}%", self.max_drawdown() * 100.0)?;
        writeln!(
            f,
            "Volatility: {:.4}",
            self.last().map(|r| r.algo_volatility).unwrap_or_default()
        )?;
        writeln!(f, "Fees paid: {:.5}", self.fees())?;
        write!(f, "Fills: {}", self.fills.len())
    }
}
