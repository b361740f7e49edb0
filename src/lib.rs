//! Stuck-orders analytics: load an order export, derive how long each order
//! has been stuck, filter, and summarize.

pub mod aggregate;
pub mod api;
pub mod churn;
pub mod config;
pub mod dataset;
pub mod derivation;
pub mod error;
pub mod export;
pub mod filter;
pub mod impact;
pub mod loader;
pub mod models;
pub mod report;
pub mod table;
pub mod timestamp;

#[cfg(test)]
mod test_support;

pub use config::AnalysisConfig;
pub use dataset::Dataset;
pub use error::LoadError;
pub use filter::{FilterSelection, FilterSpec};
pub use loader::LoadOptions;
pub use models::{DerivedOrder, OrderRecord};
pub use report::DashboardReport;
