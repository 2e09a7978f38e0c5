pub mod bot;
pub mod chat;
pub mod command;
pub mod config;
pub mod error;
pub mod holdings;
pub mod ingest;
pub mod message;
pub mod pricing;
pub mod valuation;
