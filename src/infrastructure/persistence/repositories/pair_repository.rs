use crate::domain::repositories::PairRepository;
use crate::domain::types::Pair;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use tracing::debug;

pub struct SqlitePairRepository {
    database: Database,
}

impl SqlitePairRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl PairRepository for SqlitePairRepository {
    async fn insert_missing(&self, names: &[String]) -> Result<u64> {
        let mut tx = self
            .database
            .pool
            .begin()
            .await
            .context("Failed to open pair registration transaction")?;

        let mut inserted = 0;
        for name in names {
            // A name registered earlier (or concurrently) counts as present
            let result = sqlx::query(
                r#"
                INSERT INTO market_pair (name)
                VALUES (?)
                ON CONFLICT(name) DO NOTHING
                "#,
            )
            .bind(name)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to register pair {}", name))?;
            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .context("Failed to commit pair registration")?;

        debug!("Registered {} new pairs out of {}", inserted, names.len());
        Ok(inserted)
    }

    async fn load_all(&self) -> Result<Vec<Pair>> {
        let rows = sqlx::query("SELECT id, name FROM market_pair ORDER BY name ASC")
            .fetch_all(&self.database.pool)
            .await
            .context("Failed to load market pairs")?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            pairs.push(Pair {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
            });
        }
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repository(dir: &tempfile::TempDir) -> SqlitePairRepository {
        let url = format!("sqlite://{}", dir.path().join("pairs.db").display());
        SqlitePairRepository::new(Database::new(&url).await.unwrap())
    }

    #[tokio::test]
    async fn test_insert_missing_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(&dir).await;
        let names = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];

        assert_eq!(repo.insert_missing(&names).await.unwrap(), 2);
        let first = repo.load_all().await.unwrap();

        assert_eq!(repo.insert_missing(&names).await.unwrap(), 0);
        let second = repo.load_all().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_existing_ids_are_stable() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repository(&dir).await;

        repo.insert_missing(&["ETHUSDT".to_string()]).await.unwrap();
        let eth_id = repo.load_all().await.unwrap()[0].id;

        repo.insert_missing(&["AAVEUSDT".to_string(), "ETHUSDT".to_string()])
            .await
            .unwrap();
        let pairs = repo.load_all().await.unwrap();

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].name, "AAVEUSDT");
        assert_eq!(pairs[1].name, "ETHUSDT");
        assert_eq!(pairs[1].id, eth_id);
        assert_ne!(pairs[0].id, eth_id);
    }
}
