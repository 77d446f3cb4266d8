use crate::domain::repositories::{ConflictPolicy, KlineRepository};
use crate::domain::timeframe::TimeFrame;
use crate::domain::types::CandleRecord;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

// 13 binds per row keeps a full chunk well under SQLite's variable limit
const ROWS_PER_STATEMENT: usize = 500;

const KLINE_COLUMNS: &str = "pair_id, open_time, open, high, low, close, volume, close_time, \
     quote_volume, trade_count, taker_buy_base_volume, taker_buy_quote_volume, ignored";

pub struct SqliteKlineRepository {
    database: Database,
}

impl SqliteKlineRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl KlineRepository for SqliteKlineRepository {
    async fn insert_batch(
        &self,
        timeframe: TimeFrame,
        records: &[CandleRecord],
        policy: ConflictPolicy,
    ) -> Result<u64> {
        let table = timeframe.table_name();
        let verb = match policy {
            ConflictPolicy::Reject => "INSERT INTO",
            ConflictPolicy::Skip => "INSERT OR IGNORE INTO",
        };

        // Dropping the transaction without commit rolls the batch back
        let mut tx = self
            .database
            .pool
            .begin()
            .await
            .with_context(|| format!("Failed to open transaction on {}", table))?;

        let mut written = 0;
        for chunk in records.chunks(ROWS_PER_STATEMENT) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("{} {} ({}) ", verb, table, KLINE_COLUMNS));

            builder.push_values(chunk, |mut row, record| {
                row.push_bind(record.pair_id)
                    .push_bind(record.open_time)
                    .push_bind(record.open)
                    .push_bind(record.high)
                    .push_bind(record.low)
                    .push_bind(record.close)
                    .push_bind(record.volume)
                    .push_bind(record.close_time)
                    .push_bind(record.quote_volume)
                    .push_bind(record.trade_count)
                    .push_bind(record.taker_buy_base_volume)
                    .push_bind(record.taker_buy_quote_volume)
                    .push_bind(record.ignore);
            });

            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert {} rows into {}", chunk.len(), table))?;
            written += result.rows_affected();
        }

        tx.commit()
            .await
            .with_context(|| format!("Failed to commit batch into {}", table))?;

        debug!("Committed {} rows into {}", written, table);
        Ok(written)
    }
}
