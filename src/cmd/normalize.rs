//! Normalize command - convert a broker export into the normalized CSV format

use super::InputArgs;
use clap::Args;
use std::io;

#[derive(Args, Debug)]
pub struct NormalizeCommand {
    #[command(flatten)]
    input: InputArgs,
}

impl NormalizeCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let normalized = self.input.read()?;
        for skipped in &normalized.skipped {
            log::warn!("Not exported: {}: {}", skipped.id, skipped.reason);
        }

        let mut wtr = csv::Writer::from_writer(io::stdout().lock());
        for tx in &normalized.transactions {
            wtr.serialize(tx)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
