//! Validate command - surface data quality issues without generating full reports

use super::{current_year, InputArgs};
use crate::core::aggregate;
use crate::report::format_quantity;
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Tax year to check sales for (defaults to the current year)
    #[arg(short, long)]
    year: Option<i32>,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A validation issue for output
#[derive(Debug, Clone, Serialize)]
struct ValidationIssue {
    #[serde(rename = "type")]
    issue_type: String,
    source: String,
    instrument_id: String,
    message: String,
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct ValidationOutput {
    year: i32,
    issue_count: usize,
    issues: Vec<ValidationIssue>,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let year = self.year.unwrap_or_else(current_year);
        let run = self.input.run()?;
        let report = aggregate(&run.outcome.sales, year);

        let skipped = run.skipped.iter().map(|s| ValidationIssue {
            issue_type: "Skipped".to_string(),
            source: s.source.clone(),
            instrument_id: s.instrument_id.clone(),
            message: s.reason.clone(),
        });
        let warnings = report.warnings().filter_map(|sale| {
            sale.warning.as_ref().map(|w| ValidationIssue {
                issue_type: w.kind().to_string(),
                source: format!(
                    "sale {} of {}",
                    sale.date().format("%Y-%m-%d"),
                    format_quantity(sale.quantity)
                ),
                instrument_id: sale.instrument_id.clone(),
                message: w.to_string(),
            })
        });
        let issues: Vec<ValidationIssue> = skipped.chain(warnings).collect();

        if self.json {
            self.print_json(&issues, year)?;
        } else {
            self.print_text(&issues, year);
        }

        // Exit with code 1 if issues found
        if !issues.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }

    fn print_text(&self, issues: &[ValidationIssue], year: i32) {
        println!();
        println!("VALIDATION RESULTS ({})", year);
        println!();

        if issues.is_empty() {
            println!("\u{2713} No issues found.");
            return;
        }

        println!("\u{26A0} {} issue(s) found:", issues.len());
        println!();
        for (i, issue) in issues.iter().enumerate() {
            if issue.instrument_id.is_empty() {
                println!("  {}. [{}] {}", i + 1, issue.issue_type, issue.source);
            } else {
                println!(
                    "  {}. [{}] {} ({})",
                    i + 1,
                    issue.issue_type,
                    issue.source,
                    issue.instrument_id
                );
            }
            println!("     {}", issue.message);
            println!();
        }
    }

    fn print_json(&self, issues: &[ValidationIssue], year: i32) -> anyhow::Result<()> {
        let output = ValidationOutput {
            year,
            issue_count: issues.len(),
            issues: issues.to_vec(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
