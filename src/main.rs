//! NSE Paper-Trading Simulator
//!
//! A session-scoped paper-trading front end over live market data:
//! - Intraday equity quotes + NSE option chain (polled, with retry)
//! - Cash wallet with FIFO equity and option position books
//! - Realized/unrealized P&L tracking and CSV trade export
//!
//! The refresh tick is read-only; only submitted commands mutate state.

use anyhow::Result;
use chrono::Utc;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use nse_paper_trader::account::AccountState;
use nse_paper_trader::config;
use nse_paper_trader::indicators;
use nse_paper_trader::error::{Result as TradeResult, TradeError};
use nse_paper_trader::quotes::QuoteClient;
use nse_paper_trader::types::{round2, OptionType};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nse_paper_trader=info".parse().unwrap()),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    info!("🚀 NSE Paper-Trading Simulator v0.1.0");
    info!("   Starting balance: ₹{:.2}", config::starting_balance());
    info!(
        "   Lot sizes: {}",
        config::INDEX_LOT_SIZES
            .iter()
            .map(|(name, size)| format!("{name}={size}"))
            .collect::<Vec<_>>()
            .join(" ")
    );
    info!("   Refresh interval: {}s", config::refresh_interval_secs());

    let account = Arc::new(RwLock::new(AccountState::new()));
    let quotes = Arc::new(QuoteClient::new()?);

    // Spawn the read-only portfolio refresh task
    let refresh_account = account.clone();
    let refresh_quotes = quotes.clone();
    tokio::spawn(async move {
        refresh_loop(refresh_account, refresh_quotes).await;
    });

    info!("✅ Session ready | type 'help' for commands\n");

    // Command loop: the only path that mutates state
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }
        handle_command(&line, &account, &quotes).await;
    }

    info!("Session closed | final balance ₹{:.2}", account.read().unwrap().balance());
    Ok(())
}

/// Periodic read-only re-quote of held equity positions. Never mutates
/// the account; a failed quote just leaves that row unmarked this cycle.
async fn refresh_loop(account: Arc<RwLock<AccountState>>, quotes: Arc<QuoteClient>) {
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_secs(config::refresh_interval_secs()));
    loop {
        interval.tick().await;

        let symbols: Vec<String> = {
            let account = account.read().unwrap();
            account.portfolio(|_| None).into_iter().map(|r| r.symbol).collect()
        };
        if symbols.is_empty() {
            continue;
        }

        let mut prices = Vec::new();
        for symbol in &symbols {
            match quotes.equity_quote(symbol).await {
                Ok(price) => prices.push((symbol.clone(), price)),
                Err(e) => warn!("[REFRESH] {}: {}", symbol, e),
            }
        }

        let account = account.read().unwrap();
        let rows = account.portfolio(|symbol| {
            prices
                .iter()
                .find(|(s, _)| s == symbol)
                .map(|(_, price)| *price)
        });
        let total_unrealized: f64 = rows.iter().filter_map(|r| r.unrealized_pnl).sum();
        info!(
            "💓 balance ₹{:.2} | positions {} | equity unrealized ₹{:.2} | realized ₹{:.2}",
            account.balance(),
            rows.len(),
            round2(total_unrealized),
            round2(account.realized_total()),
        );
    }
}

async fn handle_command(line: &str, account: &Arc<RwLock<AccountState>>, quotes: &QuoteClient) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let result = match parts.as_slice() {
        ["help"] => {
            print_help();
            Ok(())
        }
        ["add", amount] => parse_amount(amount).and_then(|amt| {
            let balance = account.write().unwrap().add_funds(amt)?;
            info!("₹{:.2} added | balance ₹{:.2}", amt, balance);
            Ok(())
        }),
        ["withdraw", amount] => parse_amount(amount).and_then(|amt| {
            let balance = account.write().unwrap().withdraw(amt)?;
            info!("₹{:.2} withdrawn | balance ₹{:.2}", amt, balance);
            Ok(())
        }),
        ["resetwallet"] => {
            let balance = account.write().unwrap().reset_wallet();
            info!("wallet reset | balance ₹{:.2}", balance);
            Ok(())
        }
        ["buy", symbol, qty] => equity_trade(account, quotes, symbol, qty, true).await,
        ["sell", symbol, qty] => equity_trade(account, quotes, symbol, qty, false).await,
        ["buyopt", index, expiry, strike, typ, lots] => {
            option_trade(account, quotes, index, expiry, strike, typ, lots, true).await
        }
        ["sellopt", index, expiry, strike, typ, lots] => {
            option_trade(account, quotes, index, expiry, strike, typ, lots, false).await
        }
        ["chain", index] => show_chain(quotes, index).await,
        ["chart", symbol] => show_chart(quotes, symbol).await,
        ["portfolio"] => {
            show_portfolio(account);
            Ok(())
        }
        ["positions"] => {
            show_option_positions(account);
            Ok(())
        }
        ["export"] => {
            let csv = account.read().unwrap().export_trades();
            match std::fs::write("trade_history.csv", csv) {
                Ok(()) => {
                    info!("📥 trade history written to trade_history.csv");
                    Ok(())
                }
                Err(e) => Err(TradeError::Validation(format!("export failed: {e}"))),
            }
        }
        _ => {
            warn!("unknown command: {} (try 'help')", line);
            Ok(())
        }
    };

    // Business-rule failures reject this single action only
    if let Err(e) = result {
        warn!("❌ {}", e);
    }
}

async fn equity_trade(
    account: &Arc<RwLock<AccountState>>,
    quotes: &QuoteClient,
    symbol: &str,
    qty: &str,
    is_buy: bool,
) -> TradeResult<()> {
    let quantity = parse_quantity(qty)?;
    let ticker = config::resolve_ticker(symbol);

    // Quote first: a data failure aborts before any state mutation
    let price = quotes.equity_quote(&ticker).await?;

    let mut account = account.write().unwrap();
    let receipt = if is_buy {
        account.buy_equity(&ticker, price, quantity, Utc::now())?
    } else {
        account.sell_equity(&ticker, price, quantity, Utc::now())?
    };
    info!(
        "✅ {} {} {} @ ₹{:.2} | balance ₹{:.2}",
        receipt.entry.side, quantity, ticker, price, receipt.balance
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn option_trade(
    account: &Arc<RwLock<AccountState>>,
    quotes: &QuoteClient,
    index: &str,
    expiry: &str,
    strike: &str,
    typ: &str,
    lots: &str,
    is_buy: bool,
) -> TradeResult<()> {
    let index = index.to_ascii_uppercase();
    let strike: u32 = strike
        .parse()
        .map_err(|_| TradeError::Validation("strike must be a number".into()))?;
    let option_type: OptionType = typ
        .parse()
        .map_err(TradeError::Validation)?;
    let lots = parse_quantity(lots)?;
    let lot_size = config::lot_size(&index).ok_or_else(|| {
        TradeError::Validation(format!("unsupported option index: {index}"))
    })?;

    let chain = quotes.option_chain(&index).await?;
    let ltp = chain
        .last_price(expiry, strike, option_type)
        .ok_or_else(|| {
            TradeError::NoData(format!("{index} {expiry} {strike} {option_type}"))
        })?;

    let mut account = account.write().unwrap();
    if is_buy {
        let receipt =
            account.buy_option(&index, expiry, strike, option_type, ltp, lots, Utc::now())?;
        info!(
            "✅ bought {} units @ ₹{:.2} | balance ₹{:.2}",
            receipt.entry.quantity, ltp, receipt.balance
        );
    } else {
        let quantity = lots
            .checked_mul(lot_size)
            .ok_or_else(|| TradeError::Validation(format!("lot count {lots} is too large")))?;
        let receipt =
            account.sell_option(&index, expiry, strike, option_type, ltp, quantity, Utc::now())?;
        info!(
            "✅ sold {} units @ ₹{:.2} | realized ₹{:.2} | balance ₹{:.2}",
            quantity,
            ltp,
            round2(receipt.realized_pnl),
            receipt.balance
        );
    }
    Ok(())
}

/// Intraday view for one symbol: last price plus 20-bar moving averages,
/// the same overlay the live portfolio view charts.
async fn show_chart(quotes: &QuoteClient, symbol: &str) -> TradeResult<()> {
    let ticker = config::resolve_ticker(symbol);
    let closes = quotes.intraday_closes(&ticker).await?;
    let last = match closes.last() {
        Some(&price) => price,
        None => return Err(TradeError::NoData(ticker)),
    };

    info!("📈 {} | last ₹{:.2} | {} bars today", ticker, last, closes.len());
    match indicators::sma(&closes, 20).last().copied().flatten() {
        Some(v) => info!("   SMA20 ₹{:.2}", v),
        None => info!("   SMA20 needs 20 bars ({} so far)", closes.len()),
    }
    if let Some(&v) = indicators::ema(&closes, 20).last() {
        info!("   EMA20 ₹{:.2}", v);
    }
    Ok(())
}

async fn show_chain(quotes: &QuoteClient, index: &str) -> TradeResult<()> {
    let index = index.to_ascii_uppercase();
    let chain = quotes.option_chain(&index).await?;
    info!("📘 {} expiries: {}", index, chain.expiry_dates.join(", "));
    if let Some(expiry) = chain.expiry_dates.first() {
        let strikes = chain.strikes_for(expiry);
        info!("   {} strikes quoted for {}", strikes.len(), expiry);
    }
    Ok(())
}

fn show_portfolio(account: &Arc<RwLock<AccountState>>) {
    let account = account.read().unwrap();
    let rows = account.portfolio(|_| None);
    if rows.is_empty() {
        info!("💼 no stocks held");
    }
    for row in rows {
        info!(
            "💼 {} | qty {} | avg ₹{:.2}",
            row.symbol, row.quantity, row.avg_price
        );
    }
    info!("   wallet balance ₹{:.2}", account.balance());
}

fn show_option_positions(account: &Arc<RwLock<AccountState>>) {
    let account = account.read().unwrap();
    let positions = account.option_positions();
    if positions.is_empty() {
        info!("📊 no option positions");
        return;
    }
    for p in positions {
        info!(
            "📊 {} | net qty {} | avg buy ₹{:.2}",
            p.key, p.net_quantity, p.avg_buy_price
        );
    }
    info!(
        "💸 total realized P&L ₹{:.2}",
        round2(account.realized_total())
    );
}

fn parse_amount(s: &str) -> TradeResult<f64> {
    s.parse()
        .map_err(|_| TradeError::Validation("amount must be a number".into()))
}

fn parse_quantity(s: &str) -> TradeResult<u32> {
    s.parse()
        .map_err(|_| TradeError::Validation("quantity must be a whole number".into()))
}

fn print_help() {
    let indices: Vec<&str> = config::supported_indices().collect();
    info!("commands:");
    info!("  add <amt> | withdraw <amt> | resetwallet");
    info!("  buy <symbol> <qty> | sell <symbol> <qty>");
    info!("  buyopt <index> <expiry> <strike> <CE|PE> <lots>");
    info!("  sellopt <index> <expiry> <strike> <CE|PE> <lots>");
    info!("  chain <index> | chart <symbol> | portfolio | positions | export | quit");
    info!("  option indices: {}", indices.join(", "));
}
