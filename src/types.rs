//! Core type definitions for the paper-trading engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Option contract type (call / put) as quoted on the NSE chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    CE,
    PE,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionType::CE => write!(f, "CE"),
            OptionType::PE => write!(f, "PE"),
        }
    }
}

impl std::str::FromStr for OptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CE" => Ok(OptionType::CE),
            "PE" => Ok(OptionType::PE),
            other => Err(format!("unknown option type: {other}")),
        }
    }
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "Buy"),
            TradeSide::Sell => write!(f, "Sell"),
        }
    }
}

impl std::str::FromStr for TradeSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            other => Err(format!("unknown trade side: {other}")),
        }
    }
}

/// Identity of one option instrument: (index, expiry, strike, type).
/// Strikes are whole rupees on the NSE chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractKey {
    pub index: String,
    pub expiry: String,
    pub strike: u32,
    pub option_type: OptionType,
}

impl ContractKey {
    pub fn new(index: &str, expiry: &str, strike: u32, option_type: OptionType) -> Self {
        Self {
            index: index.to_string(),
            expiry: expiry.to_string(),
            strike,
            option_type,
        }
    }
}

impl std::fmt::Display for ContractKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.index, self.expiry, self.strike, self.option_type
        )
    }
}

/// A single open equity purchase, tracked separately for FIFO exit matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub symbol: String,
    pub unit_price: f64,
    pub quantity: u32,
    pub opened_at: DateTime<Utc>,
}

/// One executed option trade. Buy-side trades carry cumulative
/// `sold_quantity` for FIFO matching; Sell-side trades carry the realized
/// P&L attributed to the buy they closed against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionTrade {
    pub key: ContractKey,
    pub side: TradeSide,
    pub quantity: u32,
    pub lots: u32,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub sold_quantity: u32,
    pub realized_pnl: Option<f64>,
}

impl OptionTrade {
    /// Quantity of a Buy trade not yet consumed by exits.
    pub fn open_quantity(&self) -> u32 {
        self.quantity - self.sold_quantity
    }
}

/// What a trade-log row refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instrument {
    Equity { symbol: String },
    Option { key: ContractKey },
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instrument::Equity { symbol } => write!(f, "{symbol}"),
            Instrument::Option { key } => write!(f, "{key}"),
        }
    }
}

/// Immutable record of one executed trade. Appended once, never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub instrument: Instrument,
    pub side: TradeSide,
    pub quantity: u32,
    pub lots: Option<u32>,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub realized_pnl: Option<f64>,
}

/// One strike row of an option chain, validated at the quote boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChainRow {
    pub expiry_date: String,
    pub strike_price: u32,
    pub ce: Option<OptionQuote>,
    pub pe: Option<OptionQuote>,
}

/// Last traded price for one side of a strike.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OptionQuote {
    pub last_price: f64,
}

/// Typed option chain for one index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChain {
    pub index: String,
    pub expiry_dates: Vec<String>,
    pub rows: Vec<OptionChainRow>,
}

impl OptionChain {
    /// Distinct strikes quoted for an expiry, ascending.
    pub fn strikes_for(&self, expiry: &str) -> Vec<u32> {
        let mut strikes: Vec<u32> = self
            .rows
            .iter()
            .filter(|r| r.expiry_date == expiry)
            .map(|r| r.strike_price)
            .collect();
        strikes.sort_unstable();
        strikes.dedup();
        strikes
    }

    /// Last traded price for a contract, if that side is quoted.
    pub fn last_price(&self, expiry: &str, strike: u32, option_type: OptionType) -> Option<f64> {
        let row = self
            .rows
            .iter()
            .find(|r| r.expiry_date == expiry && r.strike_price == strike)?;
        let quote = match option_type {
            OptionType::CE => row.ce.as_ref(),
            OptionType::PE => row.pe.as_ref(),
        };
        quote.map(|q| q.last_price)
    }
}

/// Round to 2 decimal places for display. Internal arithmetic stays at
/// full precision to avoid cumulative drift across partial exits.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
