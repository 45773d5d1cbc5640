//! Typed failures surfaced at the action boundary.
//!
//! Business-rule rejections never leave the ledger or position books
//! partially mutated; quote failures abort the action before any mutation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TradeError {
    #[error("insufficient funds: required ₹{required:.2}, available ₹{available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("insufficient shares of {symbol}: requested {requested}, held {held}")]
    InsufficientShares {
        symbol: String,
        requested: u32,
        held: u32,
    },

    #[error("insufficient open quantity: requested {requested}, available {available}")]
    InsufficientOpenQuantity { requested: u32, available: u32 },

    #[error("invalid quantity {quantity}: must be a positive multiple of lot size {lot_size}")]
    InvalidQuantity { quantity: u32, lot_size: u32 },

    #[error("no market data for {0}")]
    NoData(String),

    #[error("quote fetch failed: {0}")]
    Fetch(String),

    #[error("invalid input: {0}")]
    Validation(String),
}

impl TradeError {
    /// Only data-fetch failures are retried; validation and business-rule
    /// rejections fail the action immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TradeError::Fetch(_) | TradeError::NoData(_))
    }
}

pub type Result<T> = std::result::Result<T, TradeError>;
