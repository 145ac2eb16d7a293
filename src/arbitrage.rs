//! Fee-adjusted arbitrage between two venues quoting the same pair.
//!
//! On every bar both prices are pushed against the trade by the configured
//! slippage. Selling on venue B and buying on venue A is checked first, the
//! opposite direction second; the first direction left profitable after the
//! taker fees places a `+1` limit order on the buy side and a `-1` limit
//! order on the sell side.

use std::fmt;

use tracing::info;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::PriceCalculus;
use crate::engine::{Algorithm, BarData, Broker, Exchange, Exchanges, Field, TradingPair};
use crate::errors::Result;
use crate::metrics::Performance;

#[cfg(feature = "draws")]
use crate::draws::{Draw, DrawOptions};

/// Taker fee of `market` applied to `price`, rounded to 5 decimal places.
pub fn get_fee(market: &Exchange, price: f64) -> f64 {
    (market.fees().trading.taker * price).round_dp(5)
}

/// Prices adjusted for slippage: `(price * (1 - slippage), price * (1 + slippage))`.
///
/// The slippage is not range-checked.
pub fn adjusted_prices(price: f64, slippage: f64) -> (f64, f64) {
    (price.sub_fraction(slippage), price.add_fraction(slippage))
}

/// A trade left profitable after fees.
#[derive(Debug, Clone, PartialEq)]
pub struct Opportunity {
    /// Venue to sell on.
    pub sell_market: String,
    /// Price to sell at.
    pub sell_price: f64,
    /// Venue to buy on.
    pub buy_market: String,
    /// Price to buy at.
    pub buy_price: f64,
    /// Fee paid on the sell side.
    pub sell_fee: f64,
    /// Fee paid on the buy side.
    pub buy_fee: f64,
    /// Spread minus both fees.
    pub expected_profit: f64,
}

impl Opportunity {
    /// Returns the fees of both legs.
    pub fn total_fees(&self) -> f64 {
        self.buy_fee + self.sell_fee
    }
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Sell {} at {}, Buy {} at {}",
            self.sell_market, self.sell_price, self.buy_market, self.buy_price
        )?;
        writeln!(f, "Total fees:{}", self.total_fees())?;
        write!(f, "Expected profit: {}", self.expected_profit)
    }
}

/// Returns the opportunity of selling on `sell_market` and buying on
/// `buy_market` if the expected profit after fees is strictly positive.
pub fn evaluate_opportunity(
    sell_price: f64,
    buy_price: f64,
    sell_market: &Exchange,
    buy_market: &Exchange,
) -> Option<Opportunity> {
    let sell_fee = get_fee(sell_market, sell_price);
    let buy_fee = get_fee(buy_market, buy_price);
    let expected_profit = sell_price - buy_price - sell_fee - buy_fee;

    (expected_profit > 0.0).then(|| Opportunity {
        sell_market: sell_market.name().to_owned(),
        sell_price,
        buy_market: buy_market.name().to_owned(),
        buy_price,
        sell_fee,
        buy_fee,
        expected_profit,
    })
}

/// Returns true if selling at `sell_price` and buying at `buy_price` is
/// profitable after fees, logging a summary of the trade when it is.
pub fn is_profitable_after_fees(sell_price: f64, buy_price: f64, sell_market: &Exchange, buy_market: &Exchange) -> bool {
    match evaluate_opportunity(sell_price, buy_price, sell_market, buy_market) {
        Some(opportunity) => {
            for line in opportunity.to_string().lines() {
                info!("{line}");
            }
            true
        }
        None => false,
    }
}

/// Settings of the arbitrage strategy.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageConfig {
    symbol: String,
    exchange_a: String,
    exchange_b: String,
    slippage: f64,
}

impl ArbitrageConfig {
    /// Trades `btc_usdt` between bitfinex (A) and poloniex (B).
    pub fn new(slippage: f64) -> Self {
        Self {
            slippage,
            symbol: "btc_usdt".to_owned(),
            exchange_a: "bitfinex".to_owned(),
            exchange_b: "poloniex".to_owned(),
        }
    }

    /// Sets the traded symbol.
    pub fn symbol(mut self, symbol: impl ToString) -> Self {
        self.symbol = symbol.to_string();
        self
    }

    /// Sets the two venues. Selling on `b` and buying on `a` is checked first.
    pub fn exchanges(mut self, a: impl ToString, b: impl ToString) -> Self {
        self.exchange_a = a.to_string();
        self.exchange_b = b.to_string();
        self
    }

    /// Returns the slippage fraction.
    pub fn slippage(&self) -> f64 {
        self.slippage
    }
}

/// A venue and the pair traded on it.
#[derive(Debug, Clone)]
pub struct Venue {
    exchange: Exchange,
    pair: TradingPair,
}

impl Venue {
    /// Returns the exchange handle.
    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    /// Returns the pair traded on the venue.
    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }
}

/// Venues bound once at initialization and read at every step.
#[derive(Debug, Clone)]
pub struct ArbitrageContext {
    a: Venue,
    b: Venue,
}

impl ArbitrageContext {
    /// Returns venue A.
    pub fn a(&self) -> &Venue {
        &self.a
    }

    /// Returns venue B.
    pub fn b(&self) -> &Venue {
        &self.b
    }
}

/// The arbitrage [`Algorithm`].
#[derive(Debug, Clone)]
pub struct ArbitrageStrategy {
    config: ArbitrageConfig,
    #[cfg(feature = "draws")]
    chart: Option<DrawOptions>,
}

impl ArbitrageStrategy {
    /// Creates the strategy.
    pub fn new(config: ArbitrageConfig) -> Self {
        Self {
            config,
            #[cfg(feature = "draws")]
            chart: None,
        }
    }

    /// Renders the performance charts with `options` when the run is analyzed.
    #[cfg(feature = "draws")]
    pub fn with_chart(mut self, options: DrawOptions) -> Self {
        self.chart = Some(options);
        self
    }

    fn venue(exchanges: &Exchanges, name: &str, symbol: &str) -> Result<Venue> {
        Ok(Venue {
            exchange: exchanges.get(name)?.clone(),
            pair: exchanges.symbol(symbol, name)?,
        })
    }
}

impl Algorithm for ArbitrageStrategy {
    type Context = ArbitrageContext;

    fn initialize(&mut self, exchanges: &Exchanges) -> Result<Self::Context> {
        let config = &self.config;
        Ok(ArbitrageContext {
            a: Self::venue(exchanges, &config.exchange_a, &config.symbol)?,
            b: Self::venue(exchanges, &config.exchange_b, &config.symbol)?,
        })
    }

    fn handle_data<B: Broker>(&mut self, context: &Self::Context, data: &BarData<'_>, broker: &mut B) -> Result<()> {
        let ArbitrageContext { a, b } = context;
        let price_a = data.current(&a.pair, Field::Price)?;
        let price_b = data.current(&b.pair, Field::Price)?;

        let (sell_a, buy_a) = adjusted_prices(price_a, self.config.slippage);
        let (sell_b, buy_b) = adjusted_prices(price_b, self.config.slippage);

        let (name_a, name_b) = (a.exchange.name(), b.exchange.name());
        if is_profitable_after_fees(sell_b, buy_a, &b.exchange, &a.exchange) {
            info!("Data: {}", data.current_dt());
            info!("{name_b}: {price_b}, {name_a}: {price_a}");
            info!("Buy on {name_a}, sell on {name_b}");
            broker.order(&a.pair, 1.0, buy_a)?;
            broker.order(&b.pair, -1.0, sell_b)?;
        } else if is_profitable_after_fees(sell_a, buy_b, &a.exchange, &b.exchange) {
            info!("Data: {}", data.current_dt());
            info!("{name_b}: {price_b}, {name_a}: {price_a}");
            info!("Sell on {name_a}, buy on {name_b}");
            broker.order(&a.pair, -1.0, sell_a)?;
            broker.order(&b.pair, 1.0, buy_b)?;
        }

        Ok(())
    }

    fn analyze(&mut self, _context: &Self::Context, performance: &Performance) -> Result<()> {
        for line in performance.to_string().lines() {
            info!("{line}");
        }

        #[cfg(feature = "draws")]
        if let Some(options) = &self.chart {
            Draw::with_performance(performance).with_options(options.clone()).plot()?;
        }

        Ok(())
    }
}
