//! Paper-trading simulator for NSE equities and index options.
//!
//! The engine lives in `account` (session state), `ledger`, `equity_book`,
//! `option_book`, and `trade_log`; `quotes` is the market-data
//! collaborator and `main` is the thin session front end.

pub mod account;
pub mod config;
pub mod equity_book;
pub mod error;
pub mod indicators;
pub mod ledger;
pub mod option_book;
pub mod quotes;
pub mod trade_log;
pub mod types;

pub use account::AccountState;
pub use error::{Result, TradeError};
