//! FIFO capital gains for German Verlusttöpfe (Aktien and Sonstige)

pub mod cmd;
pub mod core;
pub mod import;
pub mod report;
