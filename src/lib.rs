pub mod api;
pub mod clients;
pub mod config;
pub mod crypto;
pub mod metrics;
pub mod models;
pub mod processor;
pub mod stores;
