//! Report sink: per-sale CSV and the printed summary

use crate::core::{Bucket, Holding, Sale, SkippedTransaction, YearReport};
use crate::import::{Normalized, SkippedEvent};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Write;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

/// CSV record for one sale
#[derive(Debug, Serialize, Deserialize)]
pub struct SaleCsvRecord {
    pub date: String,
    pub name: String,
    pub instrument_id: String,
    pub bucket: String,
    pub quantity: String,
    pub proceeds_eur: String,
    pub cost_basis_eur: String,
    pub pnl_eur: String,
    pub warning: String,
}

impl From<&Sale> for SaleCsvRecord {
    fn from(s: &Sale) -> Self {
        SaleCsvRecord {
            date: s.date().format("%Y-%m-%d").to_string(),
            name: s.name.clone().unwrap_or_default(),
            instrument_id: s.instrument_id.clone(),
            bucket: s.bucket.to_string(),
            quantity: format_quantity(s.quantity),
            proceeds_eur: format_money(s.proceeds),
            cost_basis_eur: format_money(s.cost_basis),
            pnl_eur: format_money(s.pnl),
            warning: s.warning.as_ref().map(|w| w.to_string()).unwrap_or_default(),
        }
    }
}

/// Write sales as `;`-delimited CSV
pub fn write_sales_csv<'a, I, W>(sales: I, writer: W) -> anyhow::Result<()>
where
    I: IntoIterator<Item = &'a Sale>,
    W: Write,
{
    let mut wtr = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);
    for sale in sales {
        let record: SaleCsvRecord = sale.into();
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Debug, Clone, Tabled)]
struct BucketRow {
    #[tabled(rename = "Topf")]
    bucket: String,
    #[tabled(rename = "Sales")]
    sales: usize,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Cost Basis")]
    cost_basis: String,
    #[tabled(rename = "Gain/Loss")]
    pnl: String,
    #[tabled(rename = "Warnings")]
    warnings: usize,
}

#[derive(Debug, Clone, Tabled)]
struct SaleRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Instrument")]
    instrument: String,
    #[tabled(rename = "ISIN")]
    instrument_id: String,
    #[tabled(rename = "Topf")]
    bucket: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Cost Basis")]
    cost_basis: String,
    #[tabled(rename = "Gain/Loss")]
    pnl: String,
    #[tabled(rename = "!")]
    warning: String,
}

#[derive(Debug, Clone, Tabled)]
struct HoldingRow {
    #[tabled(rename = "Instrument")]
    instrument: String,
    #[tabled(rename = "ISIN")]
    instrument_id: String,
    #[tabled(rename = "Topf")]
    bucket: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Lots")]
    lots: usize,
    #[tabled(rename = "Since")]
    since: String,
}

/// Records dropped before matching, from either the normalizer or the ledger
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub source: String,
    pub instrument_id: String,
    pub reason: String,
}

impl From<&SkippedEvent> for SkippedRecord {
    fn from(e: &SkippedEvent) -> Self {
        SkippedRecord {
            source: e.id.clone(),
            instrument_id: String::new(),
            reason: e.reason.to_string(),
        }
    }
}

impl SkippedRecord {
    /// Ledger rejection, labelled with the record's position in the input
    pub fn from_transaction(t: &SkippedTransaction, normalized: &Normalized) -> Self {
        SkippedRecord {
            source: normalized
                .source(t.index)
                .map(str::to_string)
                .unwrap_or_else(|| format!("transaction {}", t.index + 1)),
            instrument_id: t.instrument_id.clone(),
            reason: t.error.to_string(),
        }
    }
}

pub fn print_summary(report: &YearReport, holdings: &[Holding], skipped: &[SkippedRecord]) {
    println!();
    println!("REALIZED GAINS/LOSSES {}", report.year);
    println!();

    let rows: Vec<BucketRow> = Bucket::ALL
        .iter()
        .map(|b| {
            let totals = report.bucket(*b);
            BucketRow {
                bucket: b.label().to_string(),
                sales: totals.sale_count,
                proceeds: format_eur(totals.total_proceeds),
                cost_basis: format_eur(totals.total_cost_basis),
                pnl: format_eur_signed(totals.total_pnl),
                warnings: totals.warning_count,
            }
        })
        .collect();
    println!("{}", table(rows));
    println!();

    if report.is_empty() {
        println!("No sales in {}", report.year);
    } else {
        println!("SALES");
        let rows: Vec<SaleRow> = report
            .details
            .iter()
            .map(|s| SaleRow {
                date: s.date().format("%Y-%m-%d").to_string(),
                instrument: s.name.clone().unwrap_or_default(),
                instrument_id: s.instrument_id.clone(),
                bucket: s.bucket.to_string(),
                quantity: format_quantity(s.quantity),
                proceeds: format_eur(s.proceeds),
                cost_basis: format_eur(s.cost_basis),
                pnl: format_eur_signed(s.pnl),
                warning: if s.has_warning() { "\u{26A0}".to_string() } else { String::new() },
            })
            .collect();
        println!("{}", table(rows));
    }
    println!();

    if !holdings.is_empty() {
        println!("OPEN POSITIONS");
        let rows: Vec<HoldingRow> = holdings
            .iter()
            .map(|h| HoldingRow {
                instrument: h.name.clone().unwrap_or_default(),
                instrument_id: h.instrument_id.clone(),
                bucket: h.bucket.to_string(),
                quantity: format_quantity(h.quantity),
                cost: format_eur(h.cost),
                lots: h.lots,
                since: h.since.format("%Y-%m-%d").to_string(),
            })
            .collect();
        println!("{}", table(rows));
        println!();
    }

    let warnings: Vec<_> = report.warnings().collect();
    if !warnings.is_empty() {
        println!("WARNINGS");
        for sale in warnings {
            if let Some(w) = &sale.warning {
                println!("  - {} {}", sale.date(), w);
            }
        }
        println!();
    }

    if !skipped.is_empty() {
        println!("SKIPPED RECORDS ({})", skipped.len());
        for s in skipped {
            if s.instrument_id.is_empty() {
                println!("  - {}: {}", s.source, s.reason);
            } else {
                println!("  - {} ({}): {}", s.source, s.instrument_id, s.reason);
            }
        }
        println!();
    }
}

fn table<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string()
}

/// Amount rounded to cents, without currency symbol
pub fn format_money(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

pub fn format_eur(amount: Decimal) -> String {
    format!("{:.2} €", amount.round_dp(2))
}

pub fn format_eur_signed(amount: Decimal) -> String {
    if amount < Decimal::ZERO {
        format!("-{:.2} €", amount.abs().round_dp(2))
    } else {
        format!("+{:.2} €", amount.round_dp(2))
    }
}

/// Full precision, trailing zeros removed
pub fn format_quantity(qty: Decimal) -> String {
    qty.normalize().to_string()
}
