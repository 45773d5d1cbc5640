//! Append-only trade log with CSV export and read-side aggregation.
//!
//! Entries are immutable once appended. Export writes one row per entry
//! in append order; the parser exists so exported history round-trips
//! exactly (and for loading a session's export back into tooling).

use chrono::{DateTime, Utc};

use crate::error::{Result, TradeError};
use crate::types::{ContractKey, Instrument, TradeLogEntry, TradeSide};

const CSV_HEADER: &str = "kind,instrument,expiry,strike,option_type,side,quantity,lots,price,timestamp,realized_pnl";

#[derive(Debug, Default)]
pub struct TradeLog {
    entries: Vec<TradeLogEntry>,
}

/// Per-instrument projection computed from the log alone.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub instrument: Instrument,
    pub bought_quantity: u32,
    pub sold_quantity: u32,
    pub net_quantity: i64,
    pub avg_buy_price: f64,
    pub realized_total: f64,
}

impl TradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: TradeLogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TradeLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize all entries in append order. Prices are written with
    /// their full-precision shortest representation so a re-parse
    /// reproduces every field exactly.
    pub fn export_csv(&self) -> String {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for entry in &self.entries {
            let (kind, name, expiry, strike, option_type) = match &entry.instrument {
                Instrument::Equity { symbol } => {
                    ("equity", symbol.clone(), String::new(), String::new(), String::new())
                }
                Instrument::Option { key } => (
                    "option",
                    key.index.clone(),
                    key.expiry.clone(),
                    key.strike.to_string(),
                    key.option_type.to_string(),
                ),
            };
            let lots = entry.lots.map(|l| l.to_string()).unwrap_or_default();
            let realized = entry
                .realized_pnl
                .map(|p| p.to_string())
                .unwrap_or_default();
            out.push_str(&format!(
                "{kind},{name},{expiry},{strike},{option_type},{},{},{lots},{},{},{realized}\n",
                entry.side,
                entry.quantity,
                entry.price,
                entry.timestamp.to_rfc3339(),
            ));
        }
        out
    }

    /// Parse a previously exported log. Inverse of `export_csv`.
    pub fn parse_csv(text: &str) -> Result<TradeLog> {
        let mut lines = text.lines();
        match lines.next() {
            Some(header) if header == CSV_HEADER => {}
            _ => return Err(TradeError::Validation("missing trade log header".into())),
        }

        let mut log = TradeLog::new();
        for (lineno, line) in lines.enumerate() {
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != 11 {
                return Err(TradeError::Validation(format!(
                    "line {}: expected 11 fields, got {}",
                    lineno + 2,
                    fields.len()
                )));
            }
            let bad = |what: &str| {
                TradeError::Validation(format!("line {}: invalid {what}", lineno + 2))
            };

            let instrument = match fields[0] {
                "equity" => Instrument::Equity {
                    symbol: fields[1].to_string(),
                },
                "option" => Instrument::Option {
                    key: ContractKey {
                        index: fields[1].to_string(),
                        expiry: fields[2].to_string(),
                        strike: fields[3].parse().map_err(|_| bad("strike"))?,
                        option_type: fields[4].parse().map_err(|_| bad("option type"))?,
                    },
                },
                _ => return Err(bad("instrument kind")),
            };
            let side: TradeSide = fields[5].parse().map_err(|_| bad("side"))?;
            let quantity: u32 = fields[6].parse().map_err(|_| bad("quantity"))?;
            let lots = if fields[7].is_empty() {
                None
            } else {
                Some(fields[7].parse().map_err(|_| bad("lots"))?)
            };
            let price: f64 = fields[8].parse().map_err(|_| bad("price"))?;
            let timestamp = DateTime::parse_from_rfc3339(fields[9])
                .map_err(|_| bad("timestamp"))?
                .with_timezone(&Utc);
            let realized_pnl = if fields[10].is_empty() {
                None
            } else {
                Some(fields[10].parse().map_err(|_| bad("realized pnl"))?)
            };

            log.append(TradeLogEntry {
                instrument,
                side,
                quantity,
                lots,
                price,
                timestamp,
                realized_pnl,
            });
        }
        Ok(log)
    }

    /// Group entries by instrument: net quantity, weighted average buy
    /// price, realized total. Pure read-side projection, no mutation.
    pub fn aggregate(&self) -> Vec<AggregateRow> {
        let mut rows: Vec<AggregateRow> = Vec::new();
        for entry in &self.entries {
            let row = match rows.iter_mut().find(|r| r.instrument == entry.instrument) {
                Some(row) => row,
                None => {
                    rows.push(AggregateRow {
                        instrument: entry.instrument.clone(),
                        bought_quantity: 0,
                        sold_quantity: 0,
                        net_quantity: 0,
                        avg_buy_price: 0.0,
                        realized_total: 0.0,
                    });
                    rows.last_mut().expect("just pushed")
                }
            };
            match entry.side {
                TradeSide::Buy => {
                    // Re-derive the weighted average incrementally
                    let cost = row.avg_buy_price * row.bought_quantity as f64
                        + entry.price * entry.quantity as f64;
                    row.bought_quantity += entry.quantity;
                    row.avg_buy_price = cost / row.bought_quantity as f64;
                }
                TradeSide::Sell => {
                    row.sold_quantity += entry.quantity;
                }
            }
            row.net_quantity = row.bought_quantity as i64 - row.sold_quantity as i64;
            row.realized_total += entry.realized_pnl.unwrap_or(0.0);
        }
        rows
    }

    /// Total realized P&L recorded across all entries.
    pub fn realized_total(&self) -> f64 {
        self.entries.iter().filter_map(|e| e.realized_pnl).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OptionType;

    fn sample_entries() -> Vec<TradeLogEntry> {
        let key = ContractKey::new("NIFTY", "26-Sep-2026", 24500, OptionType::CE);
        vec![
            TradeLogEntry {
                instrument: Instrument::Equity {
                    symbol: "RELIANCE.NS".into(),
                },
                side: TradeSide::Buy,
                quantity: 10,
                lots: None,
                price: 2811.55,
                timestamp: Utc::now(),
                realized_pnl: None,
            },
            TradeLogEntry {
                instrument: Instrument::Option { key: key.clone() },
                side: TradeSide::Buy,
                quantity: 150,
                lots: Some(2),
                price: 100.1,
                timestamp: Utc::now(),
                realized_pnl: None,
            },
            TradeLogEntry {
                instrument: Instrument::Option { key },
                side: TradeSide::Sell,
                quantity: 75,
                lots: Some(1),
                price: 112.35,
                timestamp: Utc::now(),
                realized_pnl: Some(918.7500000000023),
            },
        ]
    }

    #[test]
    fn test_csv_round_trip_exact() {
        let mut log = TradeLog::new();
        for entry in sample_entries() {
            log.append(entry);
        }

        let csv = log.export_csv();
        let parsed = TradeLog::parse_csv(&csv).unwrap();

        assert_eq!(parsed.entries(), log.entries());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(TradeLog::parse_csv("not,a,log").is_err());

        let bad_row = format!("{CSV_HEADER}\nequity,X,,,,Buy,ten,,1.0,2026-08-28T00:00:00+00:00,\n");
        assert!(TradeLog::parse_csv(&bad_row).is_err());
    }

    #[test]
    fn test_aggregate_nets_out_and_is_idempotent() {
        let mut log = TradeLog::new();
        for entry in sample_entries() {
            log.append(entry);
        }

        let first = log.aggregate();
        let option_row = first
            .iter()
            .find(|r| matches!(r.instrument, Instrument::Option { .. }))
            .unwrap();
        assert_eq!(option_row.net_quantity, 75);
        assert!((option_row.avg_buy_price - 100.1).abs() < 1e-9);
        assert!((option_row.realized_total - 918.75).abs() < 1e-9);

        // Recomputing without intervening trades yields identical results
        assert_eq!(log.aggregate(), first);
    }
}
