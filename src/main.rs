use std::{io, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use bts_arb::prelude::*;
use tracing::{info, warn};

const SYMBOL: &str = "btc_usdt";
const DATA_DIR: &str = "data";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let (config, slippage) = RunConfig::prompt(&mut io::stdin().lock(), &mut io::stdout())?;
    let exchanges = Exchanges::default().select(config.get_exchange_names())?;

    let mut series = Vec::new();
    for (seed, exchange) in exchanges.iter().enumerate() {
        let pair = exchanges.symbol(SYMBOL, exchange.name())?;
        series.push((pair, price_series(&config, exchange.name(), seed as i32)?));
    }

    let bars = align_bars(&series, config.range(), config.get_data_frequency())?;
    info!(bars = bars.len(), slippage, "starting backtest");

    let mut backtest = Backtest::new(Arc::from_iter(bars), &config)?;
    let mut strategy = ArbitrageStrategy::new(ArbitrageConfig::new(slippage).symbol(SYMBOL));
    #[cfg(feature = "draws")]
    {
        let options = DrawOptions::default()
            .title("Arbitrage bitfinex / poloniex")
            .draw_output(DrawOutput::Svg("performance.svg".to_owned()));
        strategy = strategy.with_chart(options);
    }
    backtest.run(&mut strategy)?;

    Ok(())
}

/// Reads `data/<exchange>_<symbol>.json`, or generates a sample series when the file is missing.
fn price_series(config: &RunConfig, exchange: &str, seed: i32) -> Result<Vec<PricePoint>> {
    let path = PathBuf::from(DATA_DIR).join(format!("{exchange}_{SYMBOL}.json"));
    if path.exists() {
        return load_price_series(&path).with_context(|| format!("reading {}", path.display()));
    }

    warn!(path = %path.display(), "price file not found, using a generated series");
    let range = config.range();
    let frequency = config.get_data_frequency();
    let len = ((range.end() - range.start()).num_seconds() / frequency.interval().num_seconds()) as usize;
    Ok(generate_sample_series(range.start(), len, seed, 10_000.0, frequency))
}
