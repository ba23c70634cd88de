pub mod chart;
pub mod config;
pub mod error;
pub mod sample;
pub mod stats;

pub use chart::*;
pub use config::Config;
pub use error::*;
pub use sample::{DataSample, FieldClassification, Record};
pub use stats::StatsSummary;
