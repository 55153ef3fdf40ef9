pub mod config;
pub mod executor;
pub mod fetch;
pub mod harvest;
pub mod model;
pub mod output;
pub mod traits;

// Re-export common types for convenience
pub use config::*;
pub use executor::*;
pub use fetch::HttpIndexFetcher;
pub use harvest::{HarvestError, HarvestResult, HarvestStats, Harvester};
pub use model::*;
pub use traits::*;
