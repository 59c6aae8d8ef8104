use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("missing instrument identifier")]
    MissingInstrumentId,
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),
    #[error("unit price must not be negative, got {0}")]
    NegativePrice(Decimal),
    #[error("fees must not be negative, got {0}")]
    NegativeFees(Decimal),
    #[error("invalid datetime: {0}")]
    InvalidDatetime(String),
}

/// Input root for normalized transaction JSON
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransactionInput {
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[serde(alias = "Buy", alias = "BUY")]
    Buy,
    #[serde(alias = "Sell", alias = "SELL")]
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// One executed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transaction {
    /// Stable instrument identifier, usually the ISIN
    pub instrument_id: String,
    /// Broker instrument type tag (e.g. "stock", "derivative"); absent means equity-like
    #[serde(default)]
    pub instrument_type: Option<String>,
    /// Human readable instrument name
    #[serde(default)]
    pub name: Option<String>,
    pub side: Side,
    /// Execution time (RFC3339 with offset; date-only assumes UTC)
    #[serde(deserialize_with = "deserialize_datetime")]
    #[schemars(with = "String")]
    pub timestamp: DateTime<FixedOffset>,
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    /// Price per unit in settlement currency
    #[schemars(with = "f64")]
    pub unit_price: Decimal,
    /// Order fees in settlement currency
    #[serde(default, deserialize_with = "deserialize_fees")]
    #[schemars(with = "Option<f64>")]
    pub fees: Decimal,
}

impl Transaction {
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.instrument_id.trim().is_empty() {
            return Err(TransactionError::MissingInstrumentId);
        }
        if self.quantity <= Decimal::ZERO {
            return Err(TransactionError::NonPositiveQuantity(self.quantity));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(TransactionError::NegativePrice(self.unit_price));
        }
        if self.fees < Decimal::ZERO {
            return Err(TransactionError::NegativeFees(self.fees));
        }
        Ok(())
    }

    /// Price times quantity, before fees
    pub fn gross(&self) -> Decimal {
        self.unit_price * self.quantity
    }

    /// Instrument type tag, ignoring blank values
    pub fn type_tag(&self) -> Option<&str> {
        self.instrument_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

pub fn parse_datetime(s: &str) -> Result<DateTime<FixedOffset>, TransactionError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    // Broker exports use a compact offset, e.g. 2025-01-01T10:00:00.000+0000
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.and_utc().fixed_offset());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc().fixed_offset());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.and_utc().fixed_offset());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc().fixed_offset());
        }
    }
    Err(TransactionError::InvalidDatetime(s.to_string()))
}

fn deserialize_datetime<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_datetime(&s).map_err(|err| serde::de::Error::custom(err.to_string()))
}

fn deserialize_fees<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let fees: Option<Decimal> = Deserialize::deserialize(deserializer)?;
    Ok(fees.unwrap_or(Decimal::ZERO))
}
