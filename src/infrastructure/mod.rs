pub mod persistence;

pub use persistence::{Database, SqliteKlineRepository, SqlitePairRepository};
