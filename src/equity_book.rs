//! Equity position book.
//!
//! One ordered lot sequence per symbol, oldest purchase first. Sells
//! consume lots in FIFO order; a lot reduced to zero is removed, and a
//! symbol with no lots left disappears from the book.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::{Result, TradeError};
use crate::types::Lot;

#[derive(Debug, Default)]
pub struct EquityBook {
    lots: HashMap<String, Vec<Lot>>,
}

/// Read-side snapshot of one symbol's open position.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityPosition {
    pub symbol: String,
    pub quantity: u32,
    pub avg_price: f64,
}

impl EquityBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total open quantity for a symbol across all lots.
    pub fn held_quantity(&self, symbol: &str) -> u32 {
        self.lots
            .get(symbol)
            .map(|lots| lots.iter().map(|l| l.quantity).sum())
            .unwrap_or(0)
    }

    /// Open lots for a symbol, oldest first.
    pub fn open_lots(&self, symbol: &str) -> &[Lot] {
        self.lots.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append a new lot. The cash debit happens at the action boundary
    /// before this is called, so the two mutations stay atomic.
    pub fn buy(&mut self, symbol: &str, price: f64, quantity: u32, opened_at: DateTime<Utc>) {
        self.lots
            .entry(symbol.to_string())
            .or_default()
            .push(Lot {
                symbol: symbol.to_string(),
                unit_price: price,
                quantity,
                opened_at,
            });
    }

    /// Sell `quantity` shares at the current market price, consuming lots
    /// oldest-first. Returns the realized P&L against FIFO cost basis.
    ///
    /// Proceeds are valued uniformly at `price` for the whole sold
    /// quantity; the caller credits them. Validation happens before any
    /// lot is touched.
    pub fn sell(&mut self, symbol: &str, price: f64, quantity: u32) -> Result<f64> {
        if quantity == 0 {
            return Ok(0.0);
        }
        let held = self.held_quantity(symbol);
        if quantity > held {
            return Err(TradeError::InsufficientShares {
                symbol: symbol.to_string(),
                requested: quantity,
                held,
            });
        }

        let lots = self
            .lots
            .get_mut(symbol)
            .expect("held quantity > 0 implies lots exist");

        let mut remaining = quantity;
        let mut realized = 0.0;
        while remaining > 0 {
            let lot = &mut lots[0];
            let consumed = lot.quantity.min(remaining);
            realized += (price - lot.unit_price) * consumed as f64;
            lot.quantity -= consumed;
            remaining -= consumed;
            if lot.quantity == 0 {
                lots.remove(0);
            }
        }

        if lots.is_empty() {
            self.lots.remove(symbol);
        }
        Ok(realized)
    }

    /// Unrealized P&L for one symbol, marked to `current_price`:
    /// Σ (current - lot price) × lot quantity over open lots.
    pub fn unrealized_pnl(&self, symbol: &str, current_price: f64) -> f64 {
        self.open_lots(symbol)
            .iter()
            .map(|lot| (current_price - lot.unit_price) * lot.quantity as f64)
            .sum()
    }

    /// Snapshot of all open positions with quantity-weighted average price.
    pub fn positions(&self) -> Vec<EquityPosition> {
        let mut views: Vec<EquityPosition> = self
            .lots
            .iter()
            .map(|(symbol, lots)| {
                let quantity: u32 = lots.iter().map(|l| l.quantity).sum();
                let cost: f64 = lots
                    .iter()
                    .map(|l| l.unit_price * l.quantity as f64)
                    .sum();
                EquityPosition {
                    symbol: symbol.clone(),
                    quantity,
                    avg_price: if quantity > 0 {
                        cost / quantity as f64
                    } else {
                        0.0
                    },
                }
            })
            .collect();
        views.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        views
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }
}
