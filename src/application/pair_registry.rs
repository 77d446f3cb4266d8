use crate::application::archive_catalog::ArchiveCatalog;
use crate::domain::errors::LoaderError;
use crate::domain::repositories::PairRepository;
use crate::domain::types::PairMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Distinct pair names present in `dir`, upper-cased
pub async fn discover(dir: &Path) -> Result<BTreeSet<String>, LoaderError> {
    Ok(ArchiveCatalog::scan(dir).await?.pairs())
}

/// Authoritative name -> id mapping, backed by a `PairRepository`
pub struct PairRegistry {
    repository: Arc<dyn PairRepository>,
}

impl PairRegistry {
    pub fn new(repository: Arc<dyn PairRepository>) -> Self {
        Self { repository }
    }

    /// Persist every name not yet registered. Returns how many were new.
    ///
    /// A failed attempt is retried once with the names that are already
    /// stored filtered out; a second failure is fatal for the run.
    pub async fn register(&self, pairs: &BTreeSet<String>) -> Result<u64, LoaderError> {
        let names: Vec<String> = pairs.iter().cloned().collect();

        match self.repository.insert_missing(&names).await {
            Ok(inserted) => {
                info!(
                    "#{} MarketPairs are inserted ({} already known)",
                    inserted,
                    (names.len() as u64).saturating_sub(inserted)
                );
                Ok(inserted)
            }
            Err(e) => {
                warn!("Pair registration failed, retrying without known pairs: {:#}", e);
                let known = self.load_all().await?;
                let missing: Vec<String> = names
                    .into_iter()
                    .filter(|name| !known.contains_key(name))
                    .collect();

                let inserted = self
                    .repository
                    .insert_missing(&missing)
                    .await
                    .map_err(LoaderError::Registration)?;
                info!("#{} MarketPairs are inserted on retry", inserted);
                Ok(inserted)
            }
        }
    }

    /// Every registered pair. Call after `register` has returned.
    pub async fn load_all(&self) -> Result<PairMap, LoaderError> {
        let pairs = self
            .repository
            .load_all()
            .await
            .map_err(LoaderError::Registration)?;
        Ok(pairs.into_iter().map(|pair| (pair.name, pair.id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Pair;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Stores pairs in memory and fails the first `failures` inserts
    #[derive(Default)]
    struct FlakyPairRepository {
        pairs: Mutex<Vec<Pair>>,
        failures: Mutex<usize>,
        attempts: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl PairRepository for FlakyPairRepository {
        async fn insert_missing(&self, names: &[String]) -> Result<u64> {
            self.attempts.lock().unwrap().push(names.to_vec());
            {
                let mut failures = self.failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    anyhow::bail!("UNIQUE constraint failed: market_pair.name");
                }
            }
            let mut pairs = self.pairs.lock().unwrap();
            let mut inserted = 0;
            for name in names {
                if !pairs.iter().any(|p| &p.name == name) {
                    let id = pairs.len() as i64 + 1;
                    pairs.push(Pair {
                        id,
                        name: name.clone(),
                    });
                    inserted += 1;
                }
            }
            Ok(inserted)
        }

        async fn load_all(&self) -> Result<Vec<Pair>> {
            Ok(self.pairs.lock().unwrap().clone())
        }
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_register_twice_keeps_one_id() {
        let repo = Arc::new(FlakyPairRepository::default());
        let registry = PairRegistry::new(repo.clone());

        assert_eq!(registry.register(&set(&["BTCUSDT"])).await.unwrap(), 1);
        let first = registry.load_all().await.unwrap();
        assert_eq!(registry.register(&set(&["BTCUSDT"])).await.unwrap(), 0);
        let second = registry.load_all().await.unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(first["BTCUSDT"], second["BTCUSDT"]);
    }

    #[tokio::test]
    async fn test_register_retries_without_known_pairs() {
        let repo = Arc::new(FlakyPairRepository::default());
        let registry = PairRegistry::new(repo.clone());
        registry.register(&set(&["ETHUSDT"])).await.unwrap();

        *repo.failures.lock().unwrap() = 1;
        let inserted = registry
            .register(&set(&["BTCUSDT", "ETHUSDT"]))
            .await
            .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(registry.load_all().await.unwrap().len(), 2);
        let attempts = repo.attempts.lock().unwrap();
        assert_eq!(attempts.last().unwrap(), &vec!["BTCUSDT".to_string()]);
    }

    #[tokio::test]
    async fn test_register_fails_after_retry() {
        let repo = Arc::new(FlakyPairRepository::default());
        *repo.failures.lock().unwrap() = 2;
        let registry = PairRegistry::new(repo);

        let result = registry.register(&set(&["BTCUSDT"])).await;
        assert!(matches!(result, Err(LoaderError::Registration(_))));
    }

    #[tokio::test]
    async fn test_discover_dedups_and_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "BTCUSDT-1d-2021-01.zip",
            "BTCUSDT-1h-2021-01.zip",
            "ethusdt-1d-2021-01.zip",
            "README.txt",
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let pairs = discover(dir.path()).await.unwrap();
        assert_eq!(pairs, set(&["BTCUSDT", "ETHUSDT"]));
    }
}
