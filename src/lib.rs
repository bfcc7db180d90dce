pub mod aggregator;
pub mod cache;
pub mod config;
pub mod models;
pub mod server;
pub mod sources;

pub use cache::Cache;
pub use config::AppConfig;
pub use models::{Category, Event, Venue};
