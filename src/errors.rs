/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring or running a backtest.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The bar data provided is empty. Backtesting requires at least one bar.
    #[error("Bar data is empty: backtesting requires at least one bar")]
    BarDataEmpty,

    /// The starting capital is not positive.
    #[error("Capital base must be positive (got: {0})")]
    NegZeroCapital(f64),

    /// Only historical simulation is supported.
    #[error("Live trading is not supported, set `live` to false")]
    LiveUnsupported,

    /// The exchange is unknown or not part of the run.
    #[error("Exchange not found: {0}")]
    ExchangeNotFound(String),

    /// The symbol is not of the form `base_quote`.
    #[error("Invalid symbol `{0}`: expected `base_quote`, e.g. `btc_usdt`")]
    InvalidSymbol(String),

    /// No price is known for the asset at the current bar.
    #[error("No price for {0} at the current bar")]
    PriceNotFound(String),

    /// An order was submitted with a zero amount.
    #[error("Order amount must not be zero")]
    ZeroAmount,

    /// An order was submitted with a non-positive or non-finite limit price.
    #[error("Limit price must be positive and finite (got: {0})")]
    LimitPrice(f64),

    /// The start date comes after the end date.
    #[error("Start date {0} is after end date {1}")]
    DateRange(chrono::NaiveDate, chrono::NaiveDate),

    /// A date could not be parsed as `YYYY-MM-DD`.
    #[error("Invalid date `{0}`: {1}")]
    DateParse(String, chrono::ParseError),

    /// The slippage could not be parsed as a decimal number.
    #[error("Invalid slippage `{0}`: {1}")]
    SlippageParse(String, std::num::ParseFloatError),

    /// Plotting error.
    #[cfg(feature = "draws")]
    #[error("Plotters error: {0}")]
    Plotters(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error occurred.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
