mod kline_repository;
mod pair_repository;

pub use kline_repository::SqliteKlineRepository;
pub use pair_repository::SqlitePairRepository;
