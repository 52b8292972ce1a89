//! Utility functions and types

pub mod data_loader;
pub mod dates;
pub mod frame;

pub use data_loader::{DataLoader, DataSaver};
pub use dates::{date_to_days, days_to_date, parse_date};
