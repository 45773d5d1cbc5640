//! Session account state and the action boundary.
//!
//! One `AccountState` owns the ledger, both position books, and the trade
//! log for a session; every operation goes through it (no ambient
//! globals). Actions are all-or-nothing: validation and the cash check
//! run before any book mutation, so a rejected action leaves nothing
//! half-applied.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config;
use crate::equity_book::{EquityBook, EquityPosition};
use crate::error::{Result, TradeError};
use crate::ledger::Ledger;
use crate::option_book::{NetPosition, OptionBook};
use crate::trade_log::TradeLog;
use crate::types::{ContractKey, Instrument, OptionType, TradeLogEntry, TradeSide};

#[derive(Debug)]
pub struct AccountState {
    ledger: Ledger,
    equities: EquityBook,
    options: OptionBook,
    trade_log: TradeLog,
}

/// Success payload for a single executed trade.
#[derive(Debug, Clone)]
pub struct TradeReceipt {
    pub balance: f64,
    pub entry: TradeLogEntry,
}

/// Success payload for an option exit, which may span several original
/// buys and therefore log several rows.
#[derive(Debug, Clone)]
pub struct OptionSellReceipt {
    pub balance: f64,
    pub realized_pnl: f64,
    pub entries: Vec<TradeLogEntry>,
}

/// One row of the marked-to-market equity portfolio report.
#[derive(Debug, Clone)]
pub struct PortfolioRow {
    pub symbol: String,
    pub quantity: u32,
    pub avg_price: f64,
    pub live_price: Option<f64>,
    pub unrealized_pnl: Option<f64>,
}

impl AccountState {
    pub fn new() -> Self {
        Self::with_balance(config::starting_balance())
    }

    pub fn with_balance(balance: f64) -> Self {
        Self {
            ledger: Ledger::new(balance),
            equities: EquityBook::new(),
            options: OptionBook::new(),
            trade_log: TradeLog::new(),
        }
    }

    pub fn balance(&self) -> f64 {
        self.ledger.balance()
    }

    // ---- wallet actions ----

    pub fn add_funds(&mut self, amount: f64) -> Result<f64> {
        validate_amount(amount)?;
        self.ledger.credit(amount);
        Ok(self.ledger.balance())
    }

    pub fn withdraw(&mut self, amount: f64) -> Result<f64> {
        validate_amount(amount)?;
        self.ledger.debit(amount)?;
        Ok(self.ledger.balance())
    }

    pub fn reset_wallet(&mut self) -> f64 {
        self.ledger.reset();
        self.ledger.balance()
    }

    // ---- equity actions ----

    pub fn buy_equity(
        &mut self,
        symbol: &str,
        price: f64,
        quantity: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<TradeReceipt> {
        validate_symbol(symbol)?;
        validate_price(price)?;
        validate_quantity(quantity)?;

        // Debit first; a failed debit leaves the book untouched.
        self.ledger.debit(price * quantity as f64)?;
        self.equities.buy(symbol, price, quantity, timestamp);

        let entry = TradeLogEntry {
            instrument: Instrument::Equity {
                symbol: symbol.to_string(),
            },
            side: TradeSide::Buy,
            quantity,
            lots: None,
            price,
            timestamp,
            realized_pnl: None,
        };
        self.trade_log.append(entry.clone());
        info!("bought {} {} @ {:.2}", quantity, symbol, price);

        Ok(TradeReceipt {
            balance: self.ledger.balance(),
            entry,
        })
    }

    pub fn sell_equity(
        &mut self,
        symbol: &str,
        price: f64,
        quantity: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<TradeReceipt> {
        validate_symbol(symbol)?;
        validate_price(price)?;
        validate_quantity(quantity)?;

        // The book validates held quantity before mutating any lot.
        let realized = self.equities.sell(symbol, price, quantity)?;
        self.ledger.credit(price * quantity as f64);

        let entry = TradeLogEntry {
            instrument: Instrument::Equity {
                symbol: symbol.to_string(),
            },
            side: TradeSide::Sell,
            quantity,
            lots: None,
            price,
            timestamp,
            realized_pnl: Some(realized),
        };
        self.trade_log.append(entry.clone());
        info!(
            "sold {} {} @ {:.2} | realized ₹{:.2}",
            quantity, symbol, price, realized
        );

        Ok(TradeReceipt {
            balance: self.ledger.balance(),
            entry,
        })
    }

    // ---- option actions ----

    pub fn buy_option(
        &mut self,
        index: &str,
        expiry: &str,
        strike: u32,
        option_type: OptionType,
        price: f64,
        lots: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<TradeReceipt> {
        let lot_size = lookup_lot_size(index)?;
        validate_price(price)?;
        if lots == 0 {
            return Err(TradeError::Validation("lot count must be positive".into()));
        }
        // Guard the multiply: a wrapped quantity would debit the wrong amount
        let quantity = lots
            .checked_mul(lot_size)
            .ok_or_else(|| TradeError::Validation(format!("lot count {lots} is too large")))?;

        self.ledger.debit(price * quantity as f64)?;
        let key = ContractKey::new(index, expiry, strike, option_type);
        self.options
            .open_buy(key.clone(), price, quantity, lots, timestamp);

        let entry = TradeLogEntry {
            instrument: Instrument::Option { key },
            side: TradeSide::Buy,
            quantity,
            lots: Some(lots),
            price,
            timestamp,
            realized_pnl: None,
        };
        self.trade_log.append(entry.clone());
        info!(
            "bought {} units ({} lots) {} {} {} {} @ {:.2}",
            quantity, lots, index, expiry, strike, option_type, price
        );

        Ok(TradeReceipt {
            balance: self.ledger.balance(),
            entry,
        })
    }

    pub fn sell_option(
        &mut self,
        index: &str,
        expiry: &str,
        strike: u32,
        option_type: OptionType,
        price: f64,
        quantity: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<OptionSellReceipt> {
        let lot_size = lookup_lot_size(index)?;
        validate_price(price)?;

        let key = ContractKey::new(index, expiry, strike, option_type);
        // Validates lot-size multiple and net open quantity before
        // touching any trade.
        let exits = self
            .options
            .close_sell(&key, price, quantity, lot_size, timestamp)?;
        self.ledger.credit(price * quantity as f64);

        let mut realized = 0.0;
        let mut entries = Vec::with_capacity(exits.len());
        for exit in &exits {
            realized += exit.realized_pnl.unwrap_or(0.0);
            let entry = TradeLogEntry {
                instrument: Instrument::Option { key: key.clone() },
                side: TradeSide::Sell,
                quantity: exit.quantity,
                lots: Some(exit.lots),
                price: exit.price,
                timestamp: exit.timestamp,
                realized_pnl: exit.realized_pnl,
            };
            self.trade_log.append(entry.clone());
            entries.push(entry);
        }
        info!(
            "sold {} units {} @ {:.2} | realized ₹{:.2}",
            quantity, key, price, realized
        );

        Ok(OptionSellReceipt {
            balance: self.ledger.balance(),
            realized_pnl: realized,
            entries,
        })
    }

    // ---- read-side reports ----

    /// Equity positions marked to market. `price_for` is the quote lookup;
    /// a missing quote leaves the row unmarked rather than failing the
    /// whole report.
    pub fn portfolio<F>(&self, price_for: F) -> Vec<PortfolioRow>
    where
        F: Fn(&str) -> Option<f64>,
    {
        self.equities
            .positions()
            .into_iter()
            .map(|EquityPosition { symbol, quantity, avg_price }| {
                let live_price = price_for(&symbol);
                let unrealized_pnl =
                    live_price.map(|p| self.equities.unrealized_pnl(&symbol, p));
                PortfolioRow {
                    symbol,
                    quantity,
                    avg_price,
                    live_price,
                    unrealized_pnl,
                }
            })
            .collect()
    }

    pub fn option_positions(&self) -> Vec<NetPosition> {
        self.options.net_positions()
    }

    /// Unrealized P&L across all option keys, marked with `price_for`.
    /// Keys without a quote contribute zero.
    pub fn option_unrealized_total<F>(&self, price_for: F) -> f64
    where
        F: Fn(&ContractKey) -> Option<f64>,
    {
        self.options
            .net_positions()
            .iter()
            .map(|p| {
                price_for(&p.key)
                    .map(|price| self.options.unrealized_pnl(&p.key, price))
                    .unwrap_or(0.0)
            })
            .sum()
    }

    pub fn realized_total(&self) -> f64 {
        self.trade_log.realized_total()
    }

    pub fn export_trades(&self) -> String {
        self.trade_log.export_csv()
    }

    pub fn trade_log(&self) -> &TradeLog {
        &self.trade_log
    }

    pub fn equities(&self) -> &EquityBook {
        &self.equities
    }

    pub fn options(&self) -> &OptionBook {
        &self.options
    }
}

impl Default for AccountState {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(TradeError::Validation("amount must be positive".into()));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(TradeError::Validation("price must be positive".into()));
    }
    Ok(())
}

fn validate_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(TradeError::Validation("quantity must be positive".into()));
    }
    Ok(())
}

fn validate_symbol(symbol: &str) -> Result<()> {
    if symbol.trim().is_empty() {
        return Err(TradeError::Validation("symbol must not be empty".into()));
    }
    Ok(())
}

fn lookup_lot_size(index: &str) -> Result<u32> {
    config::lot_size(index)
        .ok_or_else(|| TradeError::Validation(format!("unsupported option index: {index}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_wallet_actions() {
        let mut account = AccountState::with_balance(1_000.0);
        assert_eq!(account.add_funds(500.0).unwrap(), 1_500.0);
        assert_eq!(account.withdraw(200.0).unwrap(), 1_300.0);

        assert!(matches!(
            account.withdraw(5_000.0),
            Err(TradeError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            account.add_funds(-1.0),
            Err(TradeError::Validation(_))
        ));
        assert!(matches!(
            account.withdraw(0.0),
            Err(TradeError::Validation(_))
        ));
        assert_eq!(account.balance(), 1_300.0);

        assert_eq!(account.reset_wallet(), config::DEFAULT_STARTING_BALANCE);
    }

    #[test]
    fn test_equity_buy_rejected_without_partial_mutation() {
        let mut account = AccountState::with_balance(1_000.0);
        let err = account
            .buy_equity("RELIANCE.NS", 2800.0, 1, ts())
            .unwrap_err();

        assert!(matches!(err, TradeError::InsufficientFunds { .. }));
        assert_eq!(account.balance(), 1_000.0);
        assert!(account.equities().is_empty());
        assert!(account.trade_log().is_empty());
    }

    #[test]
    fn test_equity_sell_rejected_without_partial_mutation() {
        let mut account = AccountState::with_balance(10_000.0);
        account.buy_equity("ITC.NS", 450.0, 4, ts()).unwrap();

        let err = account.sell_equity("ITC.NS", 460.0, 5, ts()).unwrap_err();
        assert!(matches!(err, TradeError::InsufficientShares { .. }));
        assert_eq!(account.balance(), 10_000.0 - 450.0 * 4.0);
        assert_eq!(account.equities().held_quantity("ITC.NS"), 4);
        assert_eq!(account.trade_log().len(), 1);
    }

    #[test]
    fn test_absurd_lot_count_rejected() {
        let mut account = AccountState::new();
        // 57_266_232 * 75 would wrap a u32 quantity
        let err = account
            .buy_option(
                "NIFTY",
                "26-Sep-2026",
                24500,
                OptionType::CE,
                100.0,
                57_266_232,
                ts(),
            )
            .unwrap_err();
        assert!(matches!(err, TradeError::Validation(_)));
        assert_eq!(account.balance(), config::DEFAULT_STARTING_BALANCE);
        assert!(account.trade_log().is_empty());
    }

    #[test]
    fn test_option_buy_unknown_index_rejected() {
        let mut account = AccountState::new();
        let err = account
            .buy_option("FINNIFTY", "26-Sep-2026", 21000, OptionType::CE, 50.0, 1, ts())
            .unwrap_err();
        assert!(matches!(err, TradeError::Validation(_)));
        assert_eq!(account.balance(), config::DEFAULT_STARTING_BALANCE);
    }

    #[test]
    fn test_option_buy_and_sell_move_cash_exactly() {
        let mut account = AccountState::with_balance(100_000.0);
        // NIFTY lot size is 75
        account
            .buy_option("NIFTY", "26-Sep-2026", 24500, OptionType::CE, 100.0, 1, ts())
            .unwrap();
        assert_eq!(account.balance(), 100_000.0 - 100.0 * 75.0);

        let receipt = account
            .sell_option("NIFTY", "26-Sep-2026", 24500, OptionType::CE, 110.0, 75, ts())
            .unwrap();
        assert_eq!(receipt.realized_pnl, 10.0 * 75.0);
        assert_eq!(account.balance(), 100_000.0 - 7_500.0 + 110.0 * 75.0);
        assert_eq!(account.trade_log().len(), 2);
    }

    #[test]
    fn test_portfolio_marks_to_market() {
        let mut account = AccountState::with_balance(100_000.0);
        account.buy_equity("INFY.NS", 1500.0, 10, ts()).unwrap();

        let rows = account.portfolio(|_| Some(1550.0));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].unrealized_pnl, Some(500.0));

        // Missing quote leaves the row unmarked
        let rows = account.portfolio(|_| None);
        assert_eq!(rows[0].live_price, None);
        assert_eq!(rows[0].unrealized_pnl, None);
    }
}
