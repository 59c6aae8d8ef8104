pub mod normalize;
pub mod report;
pub mod schema;
pub mod validate;

use crate::core::{Classifier, Holding, Ledger, LedgerOutcome};
use crate::import::{self, InputFormat};
use crate::report::SkippedRecord;
use anyhow::Context;
use chrono::Datelike;
use clap::Args;
use std::path::PathBuf;

/// Input options shared by the commands
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Broker export or normalized transactions (JSON or CSV). Reads stdin with "-"
    #[arg(short, long)]
    input: PathBuf,

    /// Input format
    #[arg(short, long, value_enum, default_value_t = InputFormat::Auto)]
    format: InputFormat,

    /// Additional instrument type tag booked into the "other" pot (repeatable)
    #[arg(long = "other-type", value_name = "TAG")]
    other_types: Vec<String>,
}

/// Everything the reporting commands need from one pass over the input
pub struct Run {
    pub outcome: LedgerOutcome,
    pub holdings: Vec<Holding>,
    pub skipped: Vec<SkippedRecord>,
}

impl InputArgs {
    pub fn read(&self) -> anyhow::Result<import::Normalized> {
        import::read_input(&self.input, self.format)
            .with_context(|| format!("Reading `{}`", self.input.display()))
    }

    pub fn run(&self) -> anyhow::Result<Run> {
        let normalized = self.read()?;
        let mut ledger = Ledger::new(Classifier::with_other_tags(&self.other_types));
        let outcome = ledger.process(&normalized.transactions);

        let skipped = normalized
            .skipped
            .iter()
            .map(SkippedRecord::from)
            .chain(
                outcome
                    .skipped
                    .iter()
                    .map(|t| SkippedRecord::from_transaction(t, &normalized)),
            )
            .collect();

        Ok(Run {
            holdings: ledger.holdings(),
            outcome,
            skipped,
        })
    }
}

fn current_year() -> i32 {
    chrono::Local::now().year()
}
