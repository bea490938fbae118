// Application layer - Use cases and the repository contract
pub mod asset_trends;
pub mod time_conversion;
pub mod trend_repository;
pub mod trend_service;
