pub mod asset;
pub mod export;
pub mod field;
pub mod metrics;
