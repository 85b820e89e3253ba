pub mod config;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod output;
pub mod rates;
pub mod source;
