// Archive name decoding
pub mod archive_name;

// Domain-specific error types
pub mod errors;

// Repository traits
pub mod repositories;

// Fixed timeframe set and table mapping
pub mod timeframe;

// Pairs, candle records, planning units
pub mod types;
