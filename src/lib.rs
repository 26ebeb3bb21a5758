// Library crate so integration tests can reach the pipeline modules

pub mod cache;
pub mod config;
pub mod error;
pub mod exchange;
pub mod indicators;
pub mod notifier;
pub mod orderbook;
pub mod risk;
pub mod sentiment;
pub mod signal;
pub mod stream;
pub mod types;
