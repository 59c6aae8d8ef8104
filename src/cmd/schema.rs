//! Schema command - print expected input formats

use crate::core::TransactionInput;
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format: json-schema or csv-header
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the normalized input format
    JsonSchema,
    /// CSV header row with column names
    CsvHeader,
    /// CSV column descriptions
    CsvFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => self.print_json_schema(),
            SchemaFormat::CsvHeader => self.print_csv_header(),
            SchemaFormat::CsvFields => self.print_csv_fields(),
        }
    }

    fn print_json_schema(&self) -> anyhow::Result<()> {
        let schema = schema_for!(TransactionInput);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }

    fn print_csv_header(&self) -> anyhow::Result<()> {
        let columns: Vec<&str> = CSV_FIELDS.iter().map(|(name, _, _)| *name).collect();
        println!("{}", columns.join(","));
        Ok(())
    }

    fn print_csv_fields(&self) -> anyhow::Result<()> {
        println!("CSV Input Format");
        println!("================");
        println!();
        for (name, required, description) in CSV_FIELDS {
            let req = if *required { "required" } else { "optional" };
            println!("{:16} ({:8})  {}", name, req, description);
        }
        println!();
        println!("Rows are sorted by timestamp on import; equal timestamps keep file order.");
        Ok(())
    }
}

const CSV_FIELDS: &[(&str, bool, &str)] = &[
    ("instrument_id", true, "Instrument identifier, usually the ISIN"),
    ("instrument_type", false, "Type tag, e.g. stock, fund, derivative (empty = stock)"),
    ("name", false, "Instrument name for the report"),
    ("side", true, "buy or sell"),
    ("timestamp", true, "RFC3339, YYYY-MM-DD HH:MM:SS or YYYY-MM-DD (UTC)"),
    ("quantity", true, "Units traded, must be positive"),
    ("unit_price", true, "Price per unit in EUR"),
    ("fees", false, "Order fees in EUR (empty = 0)"),
];
