//! Configuration: instrument tables, wallet defaults, and retry policy.

/// Wallet balance a fresh session (or a reset) starts with, in rupees.
pub const DEFAULT_STARTING_BALANCE: f64 = 100_000.0;

/// Read-only portfolio refresh interval in seconds.
pub const REFRESH_INTERVAL_SECS: u64 = 5;

/// Quote fetch retry policy: bounded attempts with exponential backoff.
pub const QUOTE_RETRY_ATTEMPTS: u32 = 3;
pub const QUOTE_RETRY_BASE_DELAY_SECS: u64 = 1;
pub const QUOTE_RETRY_MULTIPLIER: u32 = 2;

/// Exchange-fixed lot sizes per index. Supplied as configuration, not
/// derived from the chain.
pub const INDEX_LOT_SIZES: [(&str, u32); 3] = [("NIFTY", 75), ("BANKNIFTY", 30), ("SENSEX", 20)];

/// Lot size for an index, if it is a supported option underlying.
pub fn lot_size(index: &str) -> Option<u32> {
    INDEX_LOT_SIZES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(index))
        .map(|(_, size)| *size)
}

/// Supported option indices, in display order.
pub fn supported_indices() -> impl Iterator<Item = &'static str> {
    INDEX_LOT_SIZES.iter().map(|(name, _)| *name)
}

/// Tradable equity universe: display name -> data-feed ticker.
/// In production this would be the full NIFTY 50 table; trimmed here.
pub fn equity_tickers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("ADANIENT", "ADANIENT.NS"),
        ("AXISBANK", "AXISBANK.NS"),
        ("BAJFINANCE", "BAJFINANCE.NS"),
        ("BHARTIARTL", "BHARTIARTL.NS"),
        ("HDFCBANK", "HDFCBANK.NS"),
        ("ICICIBANK", "ICICIBANK.NS"),
        ("INFY", "INFY.NS"),
        ("ITC", "ITC.NS"),
        ("RELIANCE", "RELIANCE.NS"),
        ("SBIN", "SBIN.NS"),
        ("TCS", "TCS.NS"),
        ("TATAMOTORS", "TATAMOTORS.NS"),
        ("TATASTEEL", "TATASTEEL.NS"),
        ("WIPRO", "WIPRO.NS"),
        ("NIFTY 50", "^NSEI"),
    ]
}

/// Resolve a display name to its feed ticker. Unknown names pass through
/// unchanged so raw tickers keep working.
pub fn resolve_ticker(name: &str) -> String {
    equity_tickers()
        .iter()
        .find(|(display, _)| display.eq_ignore_ascii_case(name))
        .map(|(_, ticker)| ticker.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Get starting balance from environment (default: ₹100,000)
pub fn starting_balance() -> f64 {
    std::env::var("STARTING_BALANCE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_STARTING_BALANCE)
}

/// Get refresh interval from environment (default: 5 seconds)
pub fn refresh_interval_secs() -> u64 {
    std::env::var("REFRESH_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(REFRESH_INTERVAL_SECS)
}
