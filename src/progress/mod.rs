//! Transfer-progress aggregation and reference-update formatting.

pub mod refs;
pub mod transfer;

pub use transfer::{TransferReporter, TransferSnapshot};
