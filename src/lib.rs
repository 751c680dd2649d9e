pub mod catalog;
pub mod comparison;
pub mod config;
pub mod errors;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod ranking;
pub mod recommend;
pub mod server;
pub mod store;
