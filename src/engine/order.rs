use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::TradingPair;
use crate::errors::{Error, Result};
use crate::utils::random_id;

/// Represents the side of an order (buy or sell).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    /// Positive amount.
    Buy,
    /// Negative amount.
    Sell,
}

/// A limit order for a signed amount of an asset.
///
/// A positive amount buys, a negative amount sells.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Order {
    id: u32,
    asset: TradingPair,
    amount: f64,
    limit_price: f64,
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Order {
    /// Creates a limit order, rejecting a zero amount and an invalid limit price.
    pub fn limit(asset: TradingPair, amount: f64, limit_price: f64) -> Result<Self> {
        if amount == 0.0 || !amount.is_finite() {
            return Err(Error::ZeroAmount);
        }
        if limit_price <= 0.0 || !limit_price.is_finite() {
            return Err(Error::LimitPrice(limit_price));
        }

        Ok(Self {
            id: random_id(),
            asset,
            amount,
            limit_price,
        })
    }

    /// Returns the order id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the asset the order trades.
    pub fn asset(&self) -> &TradingPair {
        &self.asset
    }

    /// Returns the signed amount.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Returns the limit price.
    pub fn limit_price(&self) -> f64 {
        self.limit_price
    }

    /// Returns the side implied by the sign of the amount.
    pub fn side(&self) -> OrderSide {
        if self.amount > 0.0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }

    /// Returns true if the order fills at `price`.
    ///
    /// Buys fill at or below the limit, sells at or above it.
    pub fn is_marketable(&self, price: f64) -> bool {
        match self.side() {
            OrderSide::Buy => price <= self.limit_price,
            OrderSide::Sell => price >= self.limit_price,
        }
    }

    /// Returns the notional value of the order (limit price * |amount|).
    pub fn notional(&self) -> f64 {
        self.limit_price * self.amount.abs()
    }
}

/// An executed order.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    /// Id of the filled order.
    pub order_id: u32,
    /// Time of the bar the order filled on.
    pub datetime: DateTime<Utc>,
    /// Traded asset.
    pub asset: TradingPair,
    /// Signed filled amount.
    pub amount: f64,
    /// Execution price.
    pub price: f64,
    /// Fee charged for the fill.
    pub fee: f64,
}

#[cfg(test)]
fn pair() -> TradingPair {
    TradingPair::new("btc_usdt", "bitfinex").unwrap()
}

#[cfg(test)]
#[test]
fn create_limit_order() {
    let order = Order::limit(pair(), 2.0, 100.0).unwrap();

    assert_eq!(order.limit_price(), 100.0);
    assert_eq!(order.amount(), 2.0);
    assert_eq!(order.notional(), 200.0);
    assert_eq!(order.side(), OrderSide::Buy);
    assert_eq!(order.asset(), &pair());
}

#[cfg(test)]
#[test]
fn sell_side_from_negative_amount() {
    let order = Order::limit(pair(), -1.5, 100.0).unwrap();
    assert_eq!(order.side(), OrderSide::Sell);
    assert_eq!(order.notional(), 150.0);
}

#[cfg(test)]
#[test]
fn reject_invalid_orders() {
    assert!(matches!(Order::limit(pair(), 0.0, 100.0), Err(Error::ZeroAmount)));
    assert!(matches!(Order::limit(pair(), f64::NAN, 100.0), Err(Error::ZeroAmount)));
    assert!(matches!(Order::limit(pair(), 1.0, 0.0), Err(Error::LimitPrice(_))));
    assert!(matches!(Order::limit(pair(), 1.0, -5.0), Err(Error::LimitPrice(_))));
    assert!(matches!(Order::limit(pair(), 1.0, f64::INFINITY), Err(Error::LimitPrice(_))));
}

#[cfg(test)]
#[test]
fn order_equality() {
    let order1 = Order::limit(pair(), 1.0, 100.0).unwrap();
    let order2 = Order::limit(pair(), 1.0, 100.0).unwrap();
    assert_ne!(order1, order2);
    assert_eq!(order1, order1.clone());
}

#[cfg(test)]
#[test]
fn marketable_limits() {
    let buy = Order::limit(pair(), 1.0, 100.0).unwrap();
    assert!(buy.is_marketable(99.0));
    assert!(buy.is_marketable(100.0));
    assert!(!buy.is_marketable(100.5));

    let sell = Order::limit(pair(), -1.0, 100.0).unwrap();
    assert!(sell.is_marketable(101.0));
    assert!(sell.is_marketable(100.0));
    assert!(!sell.is_marketable(99.5));
}
