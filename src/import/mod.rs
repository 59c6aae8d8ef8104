//! Normalizers turning broker exports into [`Transaction`] records

pub mod amount;
pub mod trade_republic;

use crate::core::Transaction;
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Input could not be read at all. Individual bad records are reported as
/// [`SkippedEvent`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("expected a JSON array of timeline events")]
    NotAnEventList,
    #[error("unrecognized input: expected a timeline event array or an object with `transactions`")]
    UnknownFormat,
}

/// Why a source record was dropped during normalization
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("no timestamp")]
    MissingTimestamp,
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("no ISIN")]
    MissingIsin,
    #[error("no share count")]
    MissingShares,
    #[error("no amount or price")]
    MissingAmount,
    #[error("malformed record: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEvent {
    /// Source event id, or row position when the source has none
    pub id: String,
    pub reason: SkipReason,
}

/// Normalizer output, sorted by timestamp
#[derive(Debug, Default)]
pub struct Normalized {
    pub transactions: Vec<Transaction>,
    /// Source position of each transaction (`row 3`, an event id, ...), index-aligned
    pub sources: Vec<String>,
    pub skipped: Vec<SkippedEvent>,
}

impl Normalized {
    pub fn push(&mut self, source: impl Into<String>, tx: Transaction) {
        self.sources.push(source.into());
        self.transactions.push(tx);
    }

    /// Where the transaction at `index` came from
    pub fn source(&self, index: usize) -> Option<&str> {
        self.sources.get(index).map(String::as_str)
    }

    fn sorted(mut self) -> Self {
        let mut records: Vec<(String, Transaction)> = self
            .sources
            .drain(..)
            .zip(self.transactions.drain(..))
            .collect();
        // stable: same-timestamp records keep their source order
        records.sort_by_key(|(_, tx)| tx.timestamp);
        (self.sources, self.transactions) = records.into_iter().unzip();
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum InputFormat {
    /// Detect from file extension and content
    #[default]
    Auto,
    /// Trade Republic timeline export (all_events.json)
    TradeRepublic,
    /// Normalized JSON: {"transactions": [...]}
    Json,
    /// Normalized CSV
    Csv,
}

/// Read the normalized JSON format. Records that fail to deserialize are skipped.
pub fn read_transactions_json<R: Read>(reader: R) -> Result<Normalized, ImportError> {
    let value: Value = serde_json::from_reader(reader)?;
    parse_transaction_input(value)
}

/// Convert `{"transactions": [...]}` record by record
fn parse_transaction_input(value: Value) -> Result<Normalized, ImportError> {
    let records = match value {
        Value::Object(mut obj) => match obj.remove("transactions") {
            Some(Value::Array(records)) => records,
            _ => return Err(ImportError::UnknownFormat),
        },
        _ => return Err(ImportError::UnknownFormat),
    };

    let mut normalized = Normalized::default();
    for (i, record) in records.into_iter().enumerate() {
        let source = format!("transaction {}", i + 1);
        match serde_json::from_value::<Transaction>(record) {
            Ok(tx) => normalized.push(source, tx),
            Err(err) => {
                log::warn!("Skipping {}: {}", source, err);
                normalized.skipped.push(SkippedEvent {
                    id: source,
                    reason: SkipReason::Malformed(err.to_string()),
                });
            }
        }
    }
    Ok(normalized.sorted())
}

/// Read the normalized CSV format. Rows that fail to deserialize are skipped.
pub fn read_transactions_csv<R: Read>(reader: R) -> Result<Normalized, ImportError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut normalized = Normalized::default();
    for (row, result) in rdr.deserialize::<Transaction>().enumerate() {
        match result {
            Ok(tx) => normalized.push(format!("row {}", row + 1), tx),
            Err(err) if matches!(err.kind(), csv::ErrorKind::Deserialize { .. }) => {
                log::warn!("Skipping CSV row {}: {}", row + 1, err);
                normalized.skipped.push(SkippedEvent {
                    id: format!("row {}", row + 1),
                    reason: SkipReason::Malformed(err.to_string()),
                });
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(normalized.sorted())
}

/// Read transactions from a file (or stdin with "-")
pub fn read_input(path: &Path, format: InputFormat) -> Result<Normalized, ImportError> {
    if path.as_os_str() == "-" {
        let stdin = io::stdin();
        return read_from(stdin.lock(), format);
    }
    let format = match format {
        InputFormat::Auto
            if path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) =>
        {
            InputFormat::Csv
        }
        other => other,
    };
    let file = File::open(path)?;
    read_from(BufReader::new(file), format)
}

fn read_from<R: Read>(reader: R, format: InputFormat) -> Result<Normalized, ImportError> {
    match format {
        InputFormat::TradeRepublic => trade_republic::read_timeline(reader),
        InputFormat::Json => read_transactions_json(reader),
        InputFormat::Csv => read_transactions_csv(reader),
        InputFormat::Auto => {
            let value: Value = serde_json::from_reader(reader)?;
            match value {
                Value::Array(_) => trade_republic::parse_timeline(&value),
                Value::Object(ref obj) if obj.contains_key("transactions") => {
                    parse_transaction_input(value)
                }
                _ => Err(ImportError::UnknownFormat),
            }
        }
    }
}
