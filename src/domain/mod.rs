// Domain layer - Value types shared by every layer
pub mod outcome;
pub mod request;
pub mod trend;
