//! Course catalog aggregation: scrape course listings from multiple sites,
//! queue the work durably, and normalize everything into one comparable
//! catalog.

pub mod cli;
pub mod compliance;
pub mod config;
pub mod ingest;
pub mod models;
pub mod queue;
pub mod repository;
pub mod scheduler;
pub mod scrapers;
pub mod session;
