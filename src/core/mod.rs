pub mod aggregate;
pub mod classify;
pub mod fifo;
pub mod transaction;
pub mod warnings;

// Flat public surface for domain types and functions.
pub use aggregate::{aggregate, BucketTotals, YearReport};
pub use classify::{classify, Bucket, Classifier, OTHER_TAGS};
pub use fifo::{Holding, Ledger, LedgerOutcome, Lot, Sale, SkippedTransaction};
pub use transaction::{
    parse_datetime, Side, Transaction, TransactionError, TransactionInput,
};
pub use warnings::Warning;
