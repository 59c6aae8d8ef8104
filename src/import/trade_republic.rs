//! Trade Republic timeline export (`all_events.json`, as written by `pytr dl_docs`)
//!
//! Only executed buy and sell orders become transactions. Cancelled or expired
//! orders and non-trade events (deposits, interest, card payments) are ignored.

use super::amount::{parse_money, parse_shares, parse_times};
use super::{ImportError, Normalized, SkipReason, SkippedEvent};
use crate::core::{parse_datetime, Side, Transaction};
use rust_decimal::Decimal;
use serde_json::Value;
use std::io::Read;

const CANCELLED_MARKERS: &[&str] = &["storniert", "abgebrochen", "abgelaufen"];
const SHARES_TITLES: &[&str] = &["Aktien", "Stück", "Anteile"];
const PRICE_TITLES: &[&str] = &["Aktienkurs", "Preis", "Ausführungskurs"];

pub fn read_timeline<R: Read>(reader: R) -> Result<Normalized, ImportError> {
    let value: Value = serde_json::from_reader(reader)?;
    parse_timeline(&value)
}

pub fn parse_timeline(value: &Value) -> Result<Normalized, ImportError> {
    let events = value.as_array().ok_or(ImportError::NotAnEventList)?;
    let mut normalized = Normalized::default();

    for (index, event) in events.iter().enumerate() {
        if !event.is_object() {
            continue;
        }
        match parse_trade_event(event) {
            Ok(Some(tx)) => normalized.push(event_id(event, index), tx),
            Ok(None) => {}
            Err(reason) => {
                let id = event_id(event, index);
                log::warn!("Skipping timeline event {}: {}", id, reason);
                normalized.skipped.push(SkippedEvent { id, reason });
            }
        }
    }

    log::debug!(
        "Timeline: {} events, {} trades, {} skipped",
        events.len(),
        normalized.transactions.len(),
        normalized.skipped.len()
    );
    Ok(normalized.sorted())
}

fn event_id(event: &Value, index: usize) -> String {
    event
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", index))
}

/// Order direction from the event subtitle, `None` for non-trade events
fn trade_side(event: &Value) -> Option<Side> {
    let subtitle = str_field(event, "subtitle").unwrap_or_default().to_lowercase();
    if CANCELLED_MARKERS.iter().any(|m| subtitle.contains(m)) {
        log::debug!("Ignoring cancelled order: {}", subtitle);
        return None;
    }

    let status = str_field(event, "status").unwrap_or_default().to_lowercase();
    if !status.is_empty() && status != "executed" {
        log::debug!("Ignoring order with status {}", status);
        return None;
    }

    // "verkauf" contains "kauf", so sells are checked first
    if subtitle.contains("verkauf") || subtitle.contains("sell") {
        Some(Side::Sell)
    } else if subtitle.contains("kauf") || subtitle.contains("buy") || subtitle.contains("sparplan")
    {
        Some(Side::Buy)
    } else {
        None
    }
}

/// Figures collected from the event detail sections
#[derive(Debug, Default)]
struct TradeFields {
    isin: Option<String>,
    instrument_type: Option<String>,
    shares: Option<Decimal>,
    price: Option<Decimal>,
    fee: Option<Decimal>,
    total: Option<Decimal>,
}

impl TradeFields {
    fn collect(event: &Value) -> Self {
        let mut fields = TradeFields::default();
        let sections = event
            .pointer("/details/sections")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for section in sections {
            // the header action carries the ISIN
            if let Some(payload) = section.pointer("/action/payload").and_then(Value::as_str) {
                if payload.chars().count() == 12 {
                    fields.isin = Some(payload.to_string());
                }
            }

            let Some(data) = section.get("data").and_then(Value::as_array) else {
                continue;
            };
            for entry in data {
                fields.entry(entry);
            }
        }
        fields
    }

    fn entry(&mut self, entry: &Value) {
        let title = str_field(entry, "title").unwrap_or_default();
        let detail = entry.get("detail").unwrap_or(&Value::Null);

        if self.instrument_type.is_none() {
            self.instrument_type =
                find_instrument_type(detail).or_else(|| find_instrument_type(entry));
        }

        match title {
            "Gebühr" => self.fee = display_text(detail).and_then(parse_money),
            "Summe" => self.total = display_text(detail).and_then(parse_money),
            _ => {}
        }

        // the transaction table is nested in the entry's action payload
        if let Some(inner) = detail.pointer("/action/payload").filter(|p| p.is_object()) {
            let tables = inner
                .get("sections")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default()
                .iter()
                .filter(|s| str_field(s, "type") == Some("table"));
            for table in tables {
                let rows = table
                    .get("data")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                for row in rows {
                    self.table_row(row);
                }
            }
        }

        if let Some((shares, price)) = str_field(detail, "text").and_then(parse_times) {
            self.shares = self.shares.or(shares);
            self.price = self.price.or(price);
        }
    }

    fn table_row(&mut self, row: &Value) {
        let title = str_field(row, "title").unwrap_or_default();
        let value = row.get("detail").and_then(display_text);
        if SHARES_TITLES.contains(&title) {
            self.shares = value.and_then(parse_shares);
        } else if PRICE_TITLES.contains(&title) {
            self.price = value.and_then(parse_money);
        } else if title == "Summe" && self.total.is_none() {
            self.total = value.and_then(parse_money);
        }
    }
}

/// Convert one timeline event. `Ok(None)` for events that are not executed trades.
fn parse_trade_event(event: &Value) -> Result<Option<Transaction>, SkipReason> {
    let Some(side) = trade_side(event) else {
        return Ok(None);
    };

    let timestamp = str_field(event, "timestamp").ok_or(SkipReason::MissingTimestamp)?;
    let timestamp = parse_datetime(timestamp)
        .map_err(|_| SkipReason::InvalidTimestamp(timestamp.to_string()))?;

    let fields = TradeFields::collect(event);
    let net_amount = event.pointer("/amount/value").and_then(json_decimal);

    let isin = fields.isin.ok_or(SkipReason::MissingIsin)?;
    let shares = fields.shares.ok_or(SkipReason::MissingShares)?;
    let fees = fields.fee.map(|f| f.abs()).unwrap_or(Decimal::ZERO);
    let total = fields.total.or(net_amount);

    // the booked total (fees included) is authoritative; the displayed price
    // is only used when no total is available
    let unit_price = match total {
        Some(total) => {
            let gross = match side {
                Side::Buy => total.abs() - fees,
                Side::Sell => total + fees,
            };
            gross.checked_div(shares)
        }
        None => fields.price,
    }
    .ok_or(SkipReason::MissingAmount)?;

    Ok(Some(Transaction {
        instrument_id: isin,
        instrument_type: fields.instrument_type,
        name: str_field(event, "title").map(str::to_string),
        side,
        timestamp,
        quantity: shares,
        unit_price,
        fees,
    }))
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn display_text(detail: &Value) -> Option<&str> {
    detail
        .pointer("/displayValue/text")
        .and_then(Value::as_str)
        .or_else(|| str_field(detail, "text"))
}

fn json_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => parse_money(s),
        _ => None,
    }
}

/// Depth-first search for a non-empty `instrumentType` string
fn find_instrument_type(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(tag) = map
                .get("instrumentType")
                .and_then(Value::as_str)
                .filter(|t| !t.trim().is_empty())
            {
                return Some(tag.to_string());
            }
            map.values().find_map(find_instrument_type)
        }
        Value::Array(items) => items.iter().find_map(find_instrument_type),
        _ => None,
    }
}
