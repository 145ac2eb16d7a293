//! # BTS-ARB: cross-exchange arbitrage backtest
//!
//! **BTS-ARB** backtests a fee-adjusted arbitrage strategy between two
//! cryptocurrency exchanges quoting the same trading pair. On every bar the
//! strategy adjusts both prices for slippage, checks whether selling on one
//! venue and buying on the other still leaves a profit once the taker fees
//! are paid, and if so places two offsetting unit limit orders.
//!
//! ## Core Components
//! | Component   | Description                                                                                     |
//! |-------------|-------------------------------------------------------------------------------------------------|
//! | **`Exchange`** | A venue and its fee schedule (maker and taker fractions).                                    |
//! | **`TradingPair`** | An instrument such as `btc_usdt` on one venue.                                            |
//! | **`Bar`** | The prices of every pair at one time step.                                                        |
//! | **`Order`** | A limit order for a signed amount (positive buys, negative sells).                              |
//! | **`Wallet`** | Cash, holdings and fees of the run.                                                            |
//! | **`Performance`** | Portfolio value and volatility over time.                                                 |
//! | **`Backtest`** | The engine replaying bars for an `Algorithm`.                                                |
//! | **`ArbitrageStrategy`** | The arbitrage algorithm itself.                                                     |
//!
//! ## Getting Started
//! ```rust
//! use std::sync::Arc;
//!
//! use bts_arb::prelude::*;
//! use chrono::DateTime;
//!
//! let range = DateRange::parse("2018-01-01", "2018-01-01").unwrap();
//! let config = RunConfig::new(range);
//!
//! let bitfinex = TradingPair::new("btc_usdt", "bitfinex").unwrap();
//! let poloniex = TradingPair::new("btc_usdt", "poloniex").unwrap();
//! let bar = Bar::new(DateTime::default())
//!     .with_quote(bitfinex, 100.0, 1.0)
//!     .with_quote(poloniex, 110.0, 1.0);
//!
//! let mut backtest = Backtest::new(Arc::from_iter(vec![bar]), &config).unwrap();
//! let mut strategy = ArbitrageStrategy::new(ArbitrageConfig::new(0.001));
//! backtest.run(&mut strategy).unwrap();
//!
//! // bought on bitfinex, sold on poloniex
//! assert_eq!(backtest.performance().fills().len(), 2);
//! ```
//!
//! ## Features
//! | Feature   | Description                                                                                     |
//! |-----------|-------------------------------------------------------------------------------------------------|
//! | `serde`   | Load price series from JSON and serialize configs and results.                                  |
//! | `draws`   | Render the portfolio value and volatility charts with [`plotters`](https://crates.io/crates/plotters). |
//!
//! ## License
//! MIT
#![warn(missing_docs)]

/// The arbitrage strategy: fees, slippage and the per-step decision.
pub mod arbitrage;

/// Run configuration and command line prompts.
pub mod config;

/// Price series loading and alignment.
pub mod data;

/// Simulated engine: venues, bars, orders, wallet and the run driver.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// Performance record: portfolio value, returns, volatility.
pub mod metrics;

/// Utility functions and helpers.
mod utils;

/// Draw the performance charts with a lot of backends: png, svg, etc.
#[cfg(feature = "draws")]
pub mod draws;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use super::*;
    pub use crate::arbitrage::*;
    pub use crate::config::*;
    pub use crate::data::*;
    pub use crate::engine::*;
    pub use crate::errors::*;
    pub use crate::metrics::*;

    #[cfg(feature = "draws")]
    pub use crate::draws::*;
}

use std::ops::{Add, Div, Mul, Neg, Sub};

/// Trait for fraction-based price calculations.
///
/// Fractions are plain ratios: 0.001 means 0.1%.
pub trait PriceCalculus<Rhs = Self> {
    /// Increases the value by a fraction of itself.
    ///
    /// ### Arguments
    /// * `fraction` - The fraction to add (e.g., 0.01 for 1%).
    fn add_fraction(self, fraction: Rhs) -> Self;

    /// Decreases the value by a fraction of itself.
    ///
    /// ### Arguments
    /// * `fraction` - The fraction to subtract (e.g., 0.01 for 1%).
    fn sub_fraction(self, fraction: Rhs) -> Self;

    /// Rounds the exact binary value to `places` decimal places, ties to even.
    fn round_dp(self, places: u32) -> Self;

    /// Calculates the fractional change from the value to `new`.
    fn change(self, new: Self) -> Self;
}

impl PriceCalculus for f64 {
    fn add_fraction(self, fraction: Self) -> Self {
        self.mul(fraction.add(1.0))
    }

    fn sub_fraction(self, fraction: Self) -> Self {
        self.mul(fraction.neg().add(1.0))
    }

    fn round_dp(self, places: u32) -> Self {
        // formatting rounds the exact decimal expansion of the value
        format!("{:.*}", places as usize, self).parse().unwrap_or(self)
    }

    fn change(self, new: Self) -> Self {
        new.sub(self).div(self)
    }
}

#[cfg(test)]
mod calculus {
    use super::*;

    #[test]
    fn add() {
        assert_eq!(150.0, 100f64.add_fraction(0.5))
    }

    #[test]
    fn sub() {
        assert_eq!(75.0, 100f64.sub_fraction(0.25))
    }

    #[test]
    fn round() {
        assert_eq!(0.30864, 0.308641972f64.round_dp(5));
        assert_eq!(-0.5, (-0.49999999f64).round_dp(5));
        assert_eq!(25.00017, (0.0025 * 10000.07f64).round_dp(5));
        assert_eq!(2.0, 2.5f64.round_dp(0));
    }

    #[test]
    fn change() {
        assert_eq!(0.1, 100f64.change(110.0))
    }
}
