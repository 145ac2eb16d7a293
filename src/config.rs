//! Run configuration and the interactive prompts of the command line.

use std::io::{BufRead, Write};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Bar interval of the replayed data.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataFrequency {
    /// One bar per minute.
    #[default]
    Minute,
    /// One bar per day.
    Daily,
}

impl DataFrequency {
    /// Returns the bar interval.
    pub fn interval(&self) -> Duration {
        match self {
            Self::Minute => Duration::minutes(1),
            Self::Daily => Duration::days(1),
        }
    }

    /// Returns the number of bars in a year. Crypto venues trade every day.
    pub fn periods_per_year(&self) -> f64 {
        match self {
            Self::Minute => 365.0 * 24.0 * 60.0,
            Self::Daily => 365.0,
        }
    }

    /// Rounds `datetime` down to the start of its bar.
    pub fn floor(&self, datetime: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.interval().num_seconds();
        let secs = datetime.timestamp();
        let floored = secs - secs.rem_euclid(step);
        DateTime::from_timestamp(floored, 0).unwrap_or(datetime)
    }
}

/// Simulated period: from `start` (inclusive) to `end` (exclusive).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    /// Parses two `YYYY-MM-DD` dates. The end date is included up to the end of its day.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let start = parse_date(start)?;
        let end = parse_date(end)?;
        if start > end {
            return Err(Error::DateRange(start, end));
        }

        Ok(Self {
            start: Utc.from_utc_datetime(&start.and_time(Default::default())),
            end: Utc.from_utc_datetime(&end.and_time(Default::default())) + Duration::days(1),
        })
    }

    /// Returns the first instant of the range.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the first instant after the range.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns true if `datetime` lies within the range.
    pub fn contains(&self, datetime: DateTime<Utc>) -> bool {
        self.start <= datetime && datetime < self.end
    }
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|e| Error::DateParse(input.to_owned(), e))
}

/// Parses the slippage as a decimal fraction. The range is not checked.
pub fn parse_slippage(input: &str) -> Result<f64> {
    let input = input.trim();
    let slippage = input
        .parse::<f64>()
        .map_err(|e| Error::SlippageParse(input.to_owned(), e))?;
    if !(0.0..1.0).contains(&slippage) {
        warn!(slippage, "slippage outside [0, 1), adjusted prices will not make sense");
    }
    Ok(slippage)
}

/// Settings handed to the engine for one run.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    capital_base: f64,
    live: bool,
    quote_currency: String,
    exchange_names: Vec<String>,
    data_frequency: DataFrequency,
    range: DateRange,
}

impl RunConfig {
    /// Creates a historical run over `range` with 1000 usdt on bitfinex and poloniex, minute bars.
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            live: false,
            capital_base: 1000.0,
            quote_currency: "usdt".to_owned(),
            exchange_names: vec!["bitfinex".to_owned(), "poloniex".to_owned()],
            data_frequency: DataFrequency::Minute,
        }
    }

    /// Prompts for the date range and the slippage, one line each.
    ///
    /// Returns the run configuration and the slippage.
    pub fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<(Self, f64)> {
        writeln!(output, "Backtesting region. Give in YYYY-MM-DD")?;
        let start = read_answer(input, output, "Start date:")?;
        let end = read_answer(input, output, "End date:")?;
        let slippage = read_answer(input, output, "Slippage:")?;

        let range = DateRange::parse(&start, &end)?;
        let slippage = parse_slippage(&slippage)?;
        Ok((Self::new(range), slippage))
    }

    /// Sets the starting capital.
    pub fn capital_base(mut self, capital_base: f64) -> Self {
        self.capital_base = capital_base;
        self
    }

    /// Sets the simulation mode. Only `false` (historical) can be run.
    pub fn live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    /// Sets the quote currency.
    pub fn quote_currency(mut self, quote_currency: impl ToString) -> Self {
        self.quote_currency = quote_currency.to_string();
        self
    }

    /// Sets the venues of the run.
    pub fn exchange_names<S: ToString>(mut self, names: &[S]) -> Self {
        self.exchange_names = names.iter().map(ToString::to_string).collect();
        self
    }

    /// Sets the bar interval.
    pub fn data_frequency(mut self, data_frequency: DataFrequency) -> Self {
        self.data_frequency = data_frequency;
        self
    }

    /// Returns the starting capital.
    pub fn get_capital_base(&self) -> f64 {
        self.capital_base
    }

    /// Returns true for live trading.
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Returns the quote currency.
    pub fn get_quote_currency(&self) -> &str {
        &self.quote_currency
    }

    /// Returns the venue names.
    pub fn get_exchange_names(&self) -> &[String] {
        &self.exchange_names
    }

    /// Returns the bar interval.
    pub fn get_data_frequency(&self) -> DataFrequency {
        self.data_frequency
    }

    /// Returns the simulated period.
    pub fn range(&self) -> &DateRange {
        &self.range
    }
}

fn read_answer<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<String> {
    write!(output, "{question}")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn parse_range_includes_end_day() {
        let range = DateRange::parse("2018-01-01", "2018-01-02").unwrap();
        assert_eq!(range.start().to_rfc3339(), "2018-01-01T00:00:00+00:00");
        assert_eq!(range.end().to_rfc3339(), "2018-01-03T00:00:00+00:00");
        assert!(range.contains(range.start()));
        assert!(range.contains(range.end() - Duration::minutes(1)));
        assert!(!range.contains(range.end()));
    }

    #[test]
    fn parse_single_day_range() {
        let range = DateRange::parse("2018-01-01", "2018-01-01").unwrap();
        assert_eq!(range.end() - range.start(), Duration::days(1));
    }

    #[test]
    fn reject_malformed_dates() {
        assert!(matches!(DateRange::parse("2018/01/01", "2018-01-02"), Err(Error::DateParse(..))));
        assert!(matches!(DateRange::parse("2018-01-01", "tomorrow"), Err(Error::DateParse(..))));
        assert!(matches!(DateRange::parse("2018-02-01", "2018-01-01"), Err(Error::DateRange(..))));
    }

    #[test]
    fn slippage_is_not_range_checked() {
        assert_eq!(parse_slippage("0.001").unwrap(), 0.001);
        assert_eq!(parse_slippage(" -0.5 ").unwrap(), -0.5);
        assert_eq!(parse_slippage("1.5").unwrap(), 1.5);
        assert!(matches!(parse_slippage("abc"), Err(Error::SlippageParse(..))));
    }

    #[test]
    fn prompt_reads_three_answers() {
        let mut input = Cursor::new("2018-01-01\n2018-01-31\n0.001\n");
        let mut output = Vec::new();
        let (config, slippage) = RunConfig::prompt(&mut input, &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(
            output,
            "Backtesting region. Give in YYYY-MM-DD\nStart date:End date:Slippage:"
        );
        assert_eq!(slippage, 0.001);
        assert_eq!(config.get_capital_base(), 1000.0);
        assert!(!config.is_live());
        assert_eq!(config.get_quote_currency(), "usdt");
        assert_eq!(config.get_exchange_names(), ["bitfinex", "poloniex"]);
        assert_eq!(config.get_data_frequency(), DataFrequency::Minute);
        assert_eq!(config.range(), &DateRange::parse("2018-01-01", "2018-01-31").unwrap());
    }

    #[test]
    fn prompt_fails_on_bad_slippage() {
        let mut input = Cursor::new("2018-01-01\n2018-01-31\nslow\n");
        let result = RunConfig::prompt(&mut input, &mut Vec::new());
        assert!(matches!(result, Err(Error::SlippageParse(..))));
    }

    #[test]
    fn frequency_floor() {
        let dt = DateTime::from_timestamp(1_515_151_515, 0).unwrap();
        assert_eq!(DataFrequency::Minute.floor(dt).timestamp(), 1_515_151_500);
        assert_eq!(DataFrequency::Daily.floor(dt).timestamp(), 1_515_110_400);
        assert_eq!(DataFrequency::Minute.periods_per_year(), 525_600.0);
    }
}
