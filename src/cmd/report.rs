//! Report command - realized gains/losses per Verlusttopf for a tax year

use super::{current_year, InputArgs};
use crate::core::{aggregate, Bucket, BucketTotals, Holding, YearReport};
use crate::report::{print_summary, write_sales_csv, SaleCsvRecord, SkippedRecord};
use anyhow::Context;
use clap::Args;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ReportCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Tax year to report (defaults to the current year)
    #[arg(short, long)]
    year: Option<i32>,

    /// Write the year's sales as CSV (use "-" for stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct ReportOutput<'a> {
    year: i32,
    pots: Vec<PotSummary>,
    sales: Vec<SaleCsvRecord>,
    open_positions: &'a [Holding],
    skipped: &'a [SkippedRecord],
}

#[derive(Debug, Serialize)]
struct PotSummary {
    bucket: Bucket,
    label: &'static str,
    #[serde(flatten)]
    totals: BucketTotals,
}

impl ReportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let csv_to_stdout = self.output.as_deref().is_some_and(|p| p.as_os_str() == "-");
        if self.json && csv_to_stdout {
            anyhow::bail!("`--json` and `-o -` both write to stdout; write the CSV to a file instead");
        }

        let year = self.year.unwrap_or_else(current_year);
        let run = self.input.run()?;
        let report = aggregate(&run.outcome.sales, year);

        if let Some(path) = &self.output {
            self.write_csv(path, &report)?;
        }

        if self.json {
            print_json(&report, &run.holdings, &run.skipped)
        } else if csv_to_stdout {
            // stdout already carries the CSV
            Ok(())
        } else {
            print_summary(&report, &run.holdings, &run.skipped);
            if let Some(path) = &self.output {
                println!("CSV written: {}", path.display());
            }
            Ok(())
        }
    }

    fn write_csv(&self, path: &Path, report: &YearReport) -> anyhow::Result<()> {
        if path.as_os_str() == "-" {
            return write_sales_csv(&report.details, io::stdout().lock());
        }
        let file =
            File::create(path).with_context(|| format!("Creating `{}`", path.display()))?;
        write_sales_csv(&report.details, BufWriter::new(file))
            .with_context(|| format!("Writing `{}`", path.display()))
    }
}

fn print_json(report: &YearReport, holdings: &[Holding], skipped: &[SkippedRecord]) -> anyhow::Result<()> {
    let output = ReportOutput {
        year: report.year,
        pots: Bucket::ALL
            .iter()
            .map(|b| PotSummary {
                bucket: *b,
                label: b.label(),
                totals: report.bucket(*b),
            })
            .collect(),
        sales: report.details.iter().map(SaleCsvRecord::from).collect(),
        open_positions: holdings,
        skipped,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
