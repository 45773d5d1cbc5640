//! Cash ledger.
//!
//! Holds the session's wallet balance. The balance never goes negative:
//! a debit that would overdraw is rejected before any mutation.

use crate::config;
use crate::error::{Result, TradeError};

#[derive(Debug, Clone)]
pub struct Ledger {
    balance: f64,
}

impl Ledger {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            balance: initial_balance,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Add funds. Amounts are validated non-negative at the action boundary.
    pub fn credit(&mut self, amount: f64) {
        self.balance += amount;
    }

    /// Remove funds, rejecting any debit that would overdraw.
    pub fn debit(&mut self, amount: f64) -> Result<()> {
        if amount > self.balance {
            return Err(TradeError::InsufficientFunds {
                required: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    /// Reset to the configured starting balance.
    pub fn reset(&mut self) {
        self.balance = config::starting_balance();
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(config::DEFAULT_STARTING_BALANCE)
    }
}
