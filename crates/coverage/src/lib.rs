#![doc = include_str!("../README.md")]

pub mod aggregator;
pub mod error;
pub mod report;
pub mod runner;
pub mod upload;

pub use aggregator::{AggregateOutcome, CoverageAggregator, PackageFailure};
pub use error::CoverageError;
pub use report::{CoverMode, CoverageReport};
pub use runner::{GoTestRunner, PackageTestRunner, TestStatus};
pub use upload::{CommandUploader, ReportUploader, upload_best_effort};
