use clap::{Parser, Subcommand};
use verlusttopf::cmd::{
    normalize::NormalizeCommand, report::ReportCommand, schema::SchemaCommand,
    validate::ValidateCommand,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Realized gains and losses per Verlusttopf for a tax year
    Report(ReportCommand),
    /// Check input data for skipped records and missing cost basis
    Validate(ValidateCommand),
    /// Convert a broker export into normalized transaction CSV
    Normalize(NormalizeCommand),
    /// Print the normalized input format
    Schema(SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Report(report) => report.exec(),
        Command::Validate(validate) => validate.exec(),
        Command::Normalize(normalize) => normalize.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
