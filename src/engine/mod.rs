//! Simulated exchange engine.
//!
//! This module provides the types the strategy talks to:
//! - `Exchange`, `TradingPair`: venues, fee schedules and instruments.
//! - `Bar`, `BarData`: the prices of one time step and the "current price" query.
//! - `Order`, `Fill`: limit orders and their executions.
//! - `Wallet`: cash, holdings and fees.
//! - `Backtest`: the run driver calling an [`Algorithm`].

mod bar;
mod bts;
mod exchange;
mod order;
mod wallet;

pub use bar::*;
pub use bts::*;
pub use exchange::*;
pub use order::*;
pub use wallet::*;

use crate::errors::Result;
use crate::metrics::Performance;

/// Order submission handle given to the algorithm at every step.
pub trait Broker {
    /// Submits a limit order for a signed `amount` of `asset` (positive buys, negative sells).
    ///
    /// ### Returns
    /// The id of the order, or an error if the order is rejected.
    fn order(&mut self, asset: &TradingPair, amount: f64, limit_price: f64) -> Result<u32>;
}

/// A trading algorithm driven by [`Backtest::run`].
///
/// The engine calls `initialize` once, `handle_data` once per bar and
/// `analyze` once the data is exhausted. The context built by `initialize`
/// is passed by reference to the two other callbacks.
pub trait Algorithm {
    /// State bound at initialization and read at every step.
    type Context;

    /// Binds the venues and instruments the algorithm trades.
    fn initialize(&mut self, exchanges: &Exchanges) -> Result<Self::Context>;

    /// Decides what to trade on the current bar.
    fn handle_data<B: Broker>(&mut self, context: &Self::Context, data: &BarData<'_>, broker: &mut B) -> Result<()>;

    /// Reports on the finished run.
    fn analyze(&mut self, context: &Self::Context, performance: &Performance) -> Result<()>;
}
