pub mod config;
pub mod error;
pub mod graph;
pub mod report;
pub mod select;
pub mod snapshot;
pub mod store;
pub mod units;

pub use error::{ReportError, Result};
