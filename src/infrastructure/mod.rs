// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod error_classifier;
pub mod mapping;
pub mod pagination;
pub mod query;
pub mod store;
pub mod trend_store;
