use anyhow::{Context, Result};

use crate::domain::timeframe::TimeFrame;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

const PAIR_TABLE: &str = "market_pair";

/// Storage handle for one run. Opened at run start, released with `close`.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Create the pair table and one kline table per timeframe
    pub async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS market_pair (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create market_pair table")?;

        for timeframe in TimeFrame::ALL {
            let ddl = kline_table_ddl(timeframe.table_name());
            sqlx::query(&ddl)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("Failed to create {} table", timeframe.table_name()))?;
        }

        info!("Database schema initialized.");
        Ok(())
    }

    /// Drop every table and recreate the schema empty
    pub async fn reset(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        // Kline tables reference market_pair, drop them first
        for timeframe in TimeFrame::ALL {
            let ddl = format!("DROP TABLE IF EXISTS {}", timeframe.table_name());
            sqlx::query(&ddl)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("Failed to drop {} table", timeframe.table_name()))?;
        }
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", PAIR_TABLE))
            .execute(&mut *conn)
            .await
            .context("Failed to drop market_pair table")?;
        drop(conn);

        info!("Database tables dropped.");
        self.init().await
    }

    /// Number of rows currently stored for `timeframe`
    pub async fn count_records(&self, timeframe: TimeFrame) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", timeframe.table_name());
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {} rows", timeframe.table_name()))?;
        Ok(count as u64)
    }

    pub async fn close(self) {
        self.pool.close().await;
        info!("Database connection closed.");
    }
}

fn kline_table_ddl(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            pair_id INTEGER NOT NULL REFERENCES market_pair(id),
            open_time TIMESTAMP NOT NULL,
            open REAL NOT NULL,
            high REAL NOT NULL,
            low REAL NOT NULL,
            close REAL NOT NULL,
            volume REAL NOT NULL,
            close_time TIMESTAMP NOT NULL,
            quote_volume REAL NOT NULL,
            trade_count INTEGER NOT NULL,
            taker_buy_base_volume REAL NOT NULL,
            taker_buy_quote_volume REAL NOT NULL,
            ignored REAL NOT NULL,
            PRIMARY KEY (pair_id, open_time)
        );
        "#
    )
}
