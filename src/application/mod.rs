pub mod archive_catalog;
pub mod batch_loader;
pub mod job_planner;
pub mod pair_registry;
pub mod pipeline;
pub mod record_parser;

pub use pipeline::{KlineLoader, RunOptions, RunSummary};
