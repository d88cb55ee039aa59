pub mod config;
pub mod error;
pub mod gedcom;
pub mod geocoding;
pub mod lineage;
pub mod reports;
pub mod types;
