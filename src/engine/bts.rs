use std::{
    collections::{VecDeque, vec_deque::Iter},
    sync::Arc,
};

use tracing::{debug, info};

use crate::{
    config::RunConfig,
    engine::*,
    errors::{Error, Result},
    metrics::Performance,
};

/// Backtesting engine replaying bars for an [`Algorithm`].
#[derive(Debug, Clone)]
pub struct Backtest {
    wallet: Wallet,
    data: Arc<[Bar]>,
    exchanges: Exchanges,
    orders: VecDeque<Order>,
    performance: Performance,
}

impl std::ops::Deref for Backtest {
    type Target = Wallet;

    fn deref(&self) -> &Self::Target {
        &self.wallet
    }
}

impl Backtest {
    /// Creates a new backtest with the default venue registry.
    ///
    /// ### Arguments
    /// * `data` - Bars to replay, in time order.
    /// * `config` - Capital, venues, frequency and mode of the run.
    ///
    /// ### Returns
    /// The new backtest instance or an error.
    ///
    /// ### Example
    /// ```rust
    /// use std::sync::Arc;
    ///
    /// use bts_arb::prelude::*;
    /// use chrono::DateTime;
    ///
    /// let range = DateRange::parse("2018-01-01", "2018-01-01").unwrap();
    /// let pair = TradingPair::new("btc_usdt", "bitfinex").unwrap();
    /// let bar = Bar::new(DateTime::default()).with_quote(pair, 100.0, 1.0);
    ///
    /// let bts = Backtest::new(Arc::from_iter(vec![bar]), &RunConfig::new(range)).unwrap();
    /// assert_eq!(bts.cash(), 1000.0);
    /// ```
    pub fn new(data: Arc<[Bar]>, config: &RunConfig) -> Result<Self> {
        Self::with_exchanges(data, config, &Exchanges::default())
    }

    /// Creates a new backtest resolving the configured venues from `registry`.
    pub fn with_exchanges(data: Arc<[Bar]>, config: &RunConfig, registry: &Exchanges) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::BarDataEmpty);
        }
        if config.is_live() {
            return Err(Error::LiveUnsupported);
        }

        let frequency = config.get_data_frequency();
        Ok(Self {
            data,
            exchanges: registry.select(config.get_exchange_names())?,
            orders: VecDeque::new(),
            wallet: Wallet::new(config.get_capital_base())?,
            performance: Performance::new(config.get_capital_base(), frequency.periods_per_year()),
        })
    }

    /// Returns the venues of the run.
    pub fn exchanges(&self) -> &Exchanges {
        &self.exchanges
    }

    /// Returns an iterator over the bars.
    pub fn bars(&self) -> std::slice::Iter<'_, Bar> {
        self.data.iter()
    }

    /// Returns an iterator over the open orders.
    pub fn orders(&self) -> Iter<'_, Order> {
        self.orders.iter()
    }

    /// Returns the performance recorded so far.
    pub fn performance(&self) -> &Performance {
        &self.performance
    }

    /// Fills the open orders that are marketable at the bar price.
    ///
    /// Fills happen at the limit price, for the full amount, and pay the venue taker fee.
    fn execute_orders(&mut self, bar: &Bar) -> Result<()> {
        let mut orders = VecDeque::with_capacity(self.orders.len());
        while let Some(order) = self.orders.pop_front() {
            let marketable = bar
                .quote(order.asset())
                .is_some_and(|quote| order.is_marketable(quote.price));
            if !marketable {
                orders.push_back(order);
                continue;
            }

            let taker = self.exchanges.get(order.asset().exchange())?.taker_fee();
            let fill = Fill {
                order_id: order.id(),
                datetime: bar.datetime(),
                asset: order.asset().clone(),
                amount: order.amount(),
                price: order.limit_price(),
                fee: taker * order.notional(),
            };
            debug!(
                asset = %fill.asset,
                amount = fill.amount,
                price = fill.price,
                fee = fill.fee,
                "order filled"
            );
            self.wallet.apply(&fill);
            self.performance.add_fill(fill);
        }
        self.orders.append(&mut orders);
        Ok(())
    }

    /// Runs the backtest: `initialize`, then `handle_data` for each bar, then `analyze`.
    ///
    /// After each call to `handle_data` the open orders are matched against
    /// the same bar and the portfolio is recorded.
    ///
    /// ### Returns
    /// Ok if successful, or the first error raised by the algorithm or the engine.
    pub fn run<A: Algorithm>(&mut self, algorithm: &mut A) -> Result<()> {
        let context = algorithm.initialize(&self.exchanges)?;

        let bars = Arc::clone(&self.data);
        for bar in bars.iter() {
            self.wallet.mark(bar);
            algorithm.handle_data(&context, &BarData::from(bar), self)?;
            self.execute_orders(bar)?;
            self.performance.record(bar.datetime(), &self.wallet);
        }

        info!(
            bars = bars.len(),
            fills = self.performance.fills().len(),
            open_orders = self.orders.len(),
            "backtest finished"
        );
        algorithm.analyze(&context, &self.performance)
    }

    /// Resets the backtest to its initial state.
    pub fn reset(&mut self) {
        self.wallet.reset();
        self.orders = VecDeque::new();
        self.performance = Performance::new(self.wallet.capital_base(), self.performance.periods_per_year());
    }
}

impl Broker for Backtest {
    fn order(&mut self, asset: &TradingPair, amount: f64, limit_price: f64) -> Result<u32> {
        if !self.exchanges.contains(asset.exchange()) {
            return Err(Error::ExchangeNotFound(asset.exchange().to_owned()));
        }
        let order = Order::limit(asset.clone(), amount, limit_price)?;
        let id = order.id();
        debug!(%asset, amount, limit_price, id, "order placed");
        self.orders.push_back(order);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration};

    use crate::config::{DataFrequency, DateRange, RunConfig};
    use crate::engine::*;
    use crate::errors::{Error, Result};
    use crate::metrics::Performance;

    fn pair(exchange: &str) -> TradingPair {
        TradingPair::new("btc_usdt", exchange).unwrap()
    }

    fn config() -> RunConfig {
        RunConfig::new(DateRange::parse("2018-01-05", "2018-01-05").unwrap())
    }

    fn get_data(prices: &[(f64, f64)]) -> Arc<[Bar]> {
        let start = DateTime::from_timestamp(1515110400, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, (bitfinex, poloniex))| {
                Bar::new(start + Duration::minutes(i as i64))
                    .with_quote(pair("bitfinex"), *bitfinex, 1.0)
                    .with_quote(pair("poloniex"), *poloniex, 1.0)
            })
            .collect()
    }

    /// Places scripted orders on the given steps and keeps what the engine hands back.
    #[derive(Default)]
    struct Scripted {
        steps: Vec<(usize, &'static str, f64, f64)>,
        step: usize,
        initialized: usize,
        seen_prices: Vec<f64>,
        analyzed: Option<Performance>,
    }

    impl Algorithm for Scripted {
        type Context = (TradingPair, TradingPair);

        fn initialize(&mut self, exchanges: &Exchanges) -> Result<Self::Context> {
            self.initialized += 1;
            Ok((
                exchanges.symbol("btc_usdt", "bitfinex")?,
                exchanges.symbol("btc_usdt", "poloniex")?,
            ))
        }

        fn handle_data<B: Broker>(&mut self, context: &Self::Context, data: &BarData<'_>, broker: &mut B) -> Result<()> {
            self.seen_prices.push(data.current(&context.0, Field::Price)?);
            for (step, exchange, amount, limit) in self.steps.clone() {
                if step == self.step {
                    let asset = if exchange == "bitfinex" { &context.0 } else { &context.1 };
                    broker.order(asset, amount, limit)?;
                }
            }
            self.step += 1;
            Ok(())
        }

        fn analyze(&mut self, _context: &Self::Context, performance: &Performance) -> Result<()> {
            self.analyzed = Some(performance.clone());
            Ok(())
        }
    }

    #[test]
    fn reject_empty_data() {
        let result = Backtest::new(Arc::from_iter(Vec::new()), &config());
        assert!(matches!(result, Err(Error::BarDataEmpty)));
    }

    #[test]
    fn reject_live_mode() {
        let result = Backtest::new(get_data(&[(100.0, 100.0)]), &config().live(true));
        assert!(matches!(result, Err(Error::LiveUnsupported)));
    }

    #[test]
    fn reject_bad_capital_and_unknown_venue() {
        let result = Backtest::new(get_data(&[(100.0, 100.0)]), &config().capital_base(0.0));
        assert!(matches!(result, Err(Error::NegZeroCapital(_))));

        let result = Backtest::new(get_data(&[(100.0, 100.0)]), &config().exchange_names(&["binance"]));
        assert!(matches!(result, Err(Error::ExchangeNotFound(_))));
    }

    #[test]
    fn callbacks_follow_the_run_lifecycle() {
        let mut bt = Backtest::new(get_data(&[(100.0, 101.0), (102.0, 103.0), (104.0, 105.0)]), &config()).unwrap();
        let mut algo = Scripted::default();
        bt.run(&mut algo).unwrap();

        assert_eq!(algo.initialized, 1);
        assert_eq!(algo.seen_prices, vec![100.0, 102.0, 104.0]);
        let perf = algo.analyzed.unwrap();
        assert_eq!(perf.records().len(), 3);
        assert_eq!(perf.ending_value(), 1000.0);
    }

    #[test]
    fn scenario_marketable_limits_fill_on_the_same_bar() {
        let mut bt = Backtest::new(get_data(&[(100.0, 110.0)]), &config()).unwrap();
        let mut algo = Scripted {
            steps: vec![(0, "bitfinex", 1.0, 100.1), (0, "poloniex", -1.0, 109.89)],
            ..Default::default()
        };
        bt.run(&mut algo).unwrap();

        assert_eq!(bt.orders().len(), 0);
        assert_eq!(bt.performance().fills().len(), 2);
        assert_eq!(bt.holding(&pair("bitfinex")), 1.0);
        assert_eq!(bt.holding(&pair("poloniex")), -1.0);

        // taker 0.2% on bitfinex, 0.25% on poloniex
        let fees = 0.002 * 100.1 + 0.0025 * 109.89;
        assert!((bt.fees_paid() - fees).abs() < 1e-9);
        assert!((bt.cash() - (1000.0 - 100.1 + 109.89 - fees)).abs() < 1e-9);

        // valued at the bar prices: +1 * 100 - 1 * 110
        let value = bt.cash() + 100.0 - 110.0;
        assert!((bt.performance().ending_value() - value).abs() < 1e-9);
    }

    #[test]
    fn scenario_limit_waits_until_price_reaches_it() {
        let mut bt = Backtest::new(get_data(&[(100.0, 100.0), (99.5, 100.0), (98.0, 100.0)]), &config()).unwrap();
        let mut algo = Scripted {
            steps: vec![(0, "bitfinex", 1.0, 99.0)],
            ..Default::default()
        };
        bt.run(&mut algo).unwrap();

        let fills = bt.performance().fills().collect::<Vec<_>>();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, 99.0);
        assert_eq!(fills[0].datetime, bt.bars().nth(2).unwrap().datetime());
        assert!(bt.orders().next().is_none());
    }

    #[test]
    fn scenario_unfilled_order_stays_open() {
        let mut bt = Backtest::new(get_data(&[(100.0, 100.0), (101.0, 100.0)]), &config()).unwrap();
        let mut algo = Scripted {
            steps: vec![(0, "poloniex", -1.0, 105.0)],
            ..Default::default()
        };
        bt.run(&mut algo).unwrap();

        assert_eq!(bt.orders().len(), 1);
        assert_eq!(bt.performance().fills().len(), 0);
        assert_eq!(bt.cash(), 1000.0);
    }

    #[test]
    fn rejected_order_aborts_the_run() {
        let mut bt = Backtest::new(get_data(&[(100.0, 100.0)]), &config()).unwrap();
        let mut algo = Scripted {
            steps: vec![(0, "bitfinex", 0.0, 100.0)],
            ..Default::default()
        };
        assert!(matches!(bt.run(&mut algo), Err(Error::ZeroAmount)));
        assert!(algo.analyzed.is_none());
    }

    #[test]
    fn order_on_venue_outside_the_run() {
        let mut bt = Backtest::new(get_data(&[(100.0, 100.0)]), &config().exchange_names(&["bitfinex"])).unwrap();
        let result = bt.order(&pair("poloniex"), 1.0, 100.0);
        assert!(matches!(result, Err(Error::ExchangeNotFound(name)) if name == "poloniex"));
    }

    #[test]
    fn custom_fee_schedule() {
        let mut registry = Exchanges::default();
        registry.insert(Exchange::new("bitfinex", 0.0, 0.01));
        let mut bt = Backtest::with_exchanges(get_data(&[(100.0, 100.0)]), &config(), &registry).unwrap();
        let mut algo = Scripted {
            steps: vec![(0, "bitfinex", 2.0, 100.0)],
            ..Default::default()
        };
        bt.run(&mut algo).unwrap();
        assert!((bt.fees_paid() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn daily_frequency_annualizes_with_365() {
        let mut bt = Backtest::new(
            get_data(&[(100.0, 100.0), (120.0, 100.0), (90.0, 100.0)]),
            &config().data_frequency(DataFrequency::Daily),
        )
        .unwrap();
        let mut algo = Scripted {
            steps: vec![(0, "bitfinex", 1.0, 100.0)],
            ..Default::default()
        };
        bt.run(&mut algo).unwrap();

        let returns = bt.performance().records().map(|r| r.returns).collect::<Vec<_>>();
        let mean = returns.iter().sum::<f64>() / 3.0;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 2.0;
        let expected = var.sqrt() * 365f64.sqrt();
        assert!((bt.performance().last().unwrap().algo_volatility - expected).abs() < 1e-9);
    }

    #[test]
    fn reset_backtest() {
        let mut bt = Backtest::new(get_data(&[(100.0, 110.0)]), &config()).unwrap();
        let mut algo = Scripted {
            steps: vec![(0, "bitfinex", 1.0, 100.0), (0, "poloniex", -1.0, 200.0)],
            ..Default::default()
        };
        bt.run(&mut algo).unwrap();
        assert_eq!(bt.orders().len(), 1);

        bt.reset();
        assert_eq!(bt.orders().len(), 0);
        assert_eq!(bt.cash(), 1000.0);
        assert!(bt.performance().last().is_none());
    }
}
