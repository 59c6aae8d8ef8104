use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Domain warnings attached to sales whose figures are unreliable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Warning {
    /// Sale exceeded the known open lots. The unmatched quantity was booked
    /// with zero cost basis, so the whole of its proceeds counts as gain.
    InsufficientCostBasis {
        instrument_id: String,
        #[schemars(with = "f64")]
        unmatched: Decimal,
    },
}

impl Warning {
    pub fn kind(&self) -> &'static str {
        match self {
            Warning::InsufficientCostBasis { .. } => "InsufficientCostBasis",
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::InsufficientCostBasis {
                instrument_id,
                unmatched,
            } => write!(
                f,
                "no or insufficient holdings for {}: {} units booked without acquisition cost",
                instrument_id,
                unmatched.normalize()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn message_names_instrument_and_quantity() {
        let warning = Warning::InsufficientCostBasis {
            instrument_id: "DE000DERIV01".to_string(),
            unmatched: dec!(3.000),
        };
        let msg = warning.to_string();
        assert!(msg.contains("DE000DERIV01"));
        assert!(msg.contains("3 units"));
    }

    #[test]
    fn serializes_with_type_tag() {
        let warning = Warning::InsufficientCostBasis {
            instrument_id: "X".to_string(),
            unmatched: dec!(1),
        };
        let json = serde_json::to_string(&warning).unwrap();
        assert!(json.contains("\"type\":\"InsufficientCostBasis\""));
    }
}
