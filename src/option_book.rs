//! Option position book.
//!
//! Per contract key, trades form an open/close history: Buy trades open
//! quantity, Sell trades close it against the oldest unresolved Buys
//! (FIFO). Buy trades are never removed; each carries a cumulative
//! `sold_quantity` so realized P&L stays attributable to its original
//! cost basis. One Sell record is emitted per Buy consumed, so a single
//! exit spanning several buys produces several log rows on purpose: the
//! audit trail keeps per-lot cost basis.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::{Result, TradeError};
use crate::types::{ContractKey, OptionTrade, TradeSide};

#[derive(Debug, Default)]
pub struct OptionBook {
    trades: HashMap<ContractKey, Vec<OptionTrade>>,
}

/// Read-side projection of one contract's net position.
#[derive(Debug, Clone, PartialEq)]
pub struct NetPosition {
    pub key: ContractKey,
    pub bought_quantity: u32,
    pub sold_quantity: u32,
    pub net_quantity: u32,
    pub avg_buy_price: f64,
}

impl OptionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full trade history for a key, in execution order.
    pub fn trades(&self, key: &ContractKey) -> &[OptionTrade] {
        self.trades.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Net quantity still open for a key:
    /// Σ buy quantity − Σ prior sell quantity.
    pub fn net_available(&self, key: &ContractKey) -> u32 {
        let trades = self.trades(key);
        let bought: u32 = trades
            .iter()
            .filter(|t| t.side == TradeSide::Buy)
            .map(|t| t.quantity)
            .sum();
        let sold: u32 = trades
            .iter()
            .filter(|t| t.side == TradeSide::Sell)
            .map(|t| t.quantity)
            .sum();
        bought - sold
    }

    /// Record an opening Buy. The cash debit happens at the action
    /// boundary before this is called.
    pub fn open_buy(
        &mut self,
        key: ContractKey,
        price: f64,
        quantity: u32,
        lots: u32,
        timestamp: DateTime<Utc>,
    ) {
        self.trades.entry(key.clone()).or_default().push(OptionTrade {
            key,
            side: TradeSide::Buy,
            quantity,
            lots,
            price,
            timestamp,
            sold_quantity: 0,
            realized_pnl: None,
        });
    }

    /// Close `quantity` units at the current price, matching FIFO against
    /// open Buys. Returns the Sell records emitted, one per Buy consumed,
    /// each carrying its own partial realized P&L.
    ///
    /// All validation runs before any trade is touched: `quantity` must be
    /// a positive multiple of `lot_size`, and must not exceed the net open
    /// quantity (zero Buys means zero available).
    pub fn close_sell(
        &mut self,
        key: &ContractKey,
        price: f64,
        quantity: u32,
        lot_size: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<OptionTrade>> {
        if quantity == 0 || quantity % lot_size != 0 {
            return Err(TradeError::InvalidQuantity { quantity, lot_size });
        }
        let available = self.net_available(key);
        if quantity > available {
            return Err(TradeError::InsufficientOpenQuantity {
                requested: quantity,
                available,
            });
        }

        let trades = self
            .trades
            .get_mut(key)
            .expect("net available > 0 implies history exists");

        let mut remaining = quantity;
        let mut exits = Vec::new();
        for buy in trades.iter_mut().filter(|t| t.side == TradeSide::Buy) {
            if remaining == 0 {
                break;
            }
            let open = buy.open_quantity();
            if open == 0 {
                continue;
            }
            let exit_qty = open.min(remaining);
            let pnl = (price - buy.price) * exit_qty as f64;
            buy.sold_quantity += exit_qty;
            remaining -= exit_qty;

            exits.push(OptionTrade {
                key: key.clone(),
                side: TradeSide::Sell,
                quantity: exit_qty,
                lots: exit_qty / lot_size,
                price,
                timestamp,
                sold_quantity: 0,
                realized_pnl: Some(pnl),
            });
        }
        debug_assert_eq!(remaining, 0);

        trades.extend(exits.iter().cloned());
        Ok(exits)
    }

    /// Unrealized P&L for a key, marked to `current_price`. Only quantity
    /// not yet consumed by exits counts; a flat key reports zero.
    pub fn unrealized_pnl(&self, key: &ContractKey, current_price: f64) -> f64 {
        self.trades(key)
            .iter()
            .filter(|t| t.side == TradeSide::Buy)
            .map(|t| (current_price - t.price) * t.open_quantity() as f64)
            .sum()
    }

    /// Realized P&L locked in by exits on one key.
    pub fn realized_pnl(&self, key: &ContractKey) -> f64 {
        self.trades(key)
            .iter()
            .filter_map(|t| t.realized_pnl)
            .sum()
    }

    /// Realized P&L across all keys.
    pub fn realized_total(&self) -> f64 {
        self.trades
            .values()
            .flatten()
            .filter_map(|t| t.realized_pnl)
            .sum()
    }

    /// Net position per key with quantity-weighted average buy price.
    pub fn net_positions(&self) -> Vec<NetPosition> {
        let mut positions: Vec<NetPosition> = self
            .trades
            .iter()
            .map(|(key, trades)| {
                let mut bought = 0u32;
                let mut sold = 0u32;
                let mut buy_cost = 0.0;
                for t in trades {
                    match t.side {
                        TradeSide::Buy => {
                            bought += t.quantity;
                            buy_cost += t.price * t.quantity as f64;
                        }
                        TradeSide::Sell => sold += t.quantity,
                    }
                }
                NetPosition {
                    key: key.clone(),
                    bought_quantity: bought,
                    sold_quantity: sold,
                    net_quantity: bought - sold,
                    avg_buy_price: if bought > 0 {
                        buy_cost / bought as f64
                    } else {
                        0.0
                    },
                }
            })
            .collect();
        positions.sort_by(|a, b| a.key.to_string().cmp(&b.key.to_string()));
        positions
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}
