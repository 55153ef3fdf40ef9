//! Harvest module - recursive traversal of the remote release index.
//!
//! This module provides:
//! - **Filters**: per-level entry filtering and architecture inference in [`filter`]
//! - **Pipeline**: the sequential tree walker [`pipeline::Harvester`]

pub mod filter;
pub mod pipeline;

// Re-export commonly used types
pub use filter::{classify_major, infer_arch, is_checksum_file, MajorVersion, CURRENT};

pub use pipeline::{HarvestError, HarvestResult, HarvestStats, Harvester};
