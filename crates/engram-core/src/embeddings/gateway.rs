//! Bounded-concurrency gateway in front of the embedding model
//!
//! All model traffic flows through here: text validation, the LRU cache
//! keyed by (sector, content hash, model id), the concurrency pool, retries
//! with exponential backoff, and the per-call deadline.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lru::LruCache;
use tokio::sync::Semaphore;

use crate::config::EmbeddingConfig;
use crate::error::{EngramError, Result};
use crate::sector::Sector;
use crate::vecmath;

use super::model::EmbeddingModel;

/// Attempts per sector before giving up
const MAX_ATTEMPTS: u32 = 3;

/// First backoff step; doubles per attempt
const BACKOFF_BASE_MS: u64 = 25;

type CacheKey = (Sector, u64, String);

// ============================================================================
// GATEWAY
// ============================================================================

/// The embedding gateway
///
/// Cheap to clone behind `Arc`; the cache and pool are shared.
pub struct EmbeddingGateway {
    model: Arc<dyn EmbeddingModel>,
    pool: Arc<Semaphore>,
    cache: Mutex<LruCache<CacheKey, Arc<Vec<f32>>>>,
    config: EmbeddingConfig,
}

impl EmbeddingGateway {
    /// Create a gateway around a model
    pub fn new(model: Arc<dyn EmbeddingModel>, config: EmbeddingConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            pool: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            cache: Mutex::new(LruCache::new(capacity)),
            model,
            config,
        }
    }

    /// The wrapped model's id
    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Output dimension for a sector
    pub fn dimensions(&self, sector: Sector) -> usize {
        self.model.dimensions(sector)
    }

    /// Validate and trim input text
    ///
    /// Empty or whitespace-only input fails with `EmptyText`; oversized
    /// input fails with `TextTooLong`. Both are non-retriable and propagate
    /// immediately, before any model call.
    pub fn normalize_text(&self, text: &str) -> Result<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(EngramError::EmptyText);
        }
        if trimmed.chars().count() > self.config.max_text_length {
            return Err(EngramError::TextTooLong {
                len: trimmed.chars().count(),
                max: self.config.max_text_length,
            });
        }
        Ok(trimmed.to_string())
    }

    fn cache_key(&self, text: &str, sector: Sector) -> CacheKey {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        (sector, hasher.finish(), self.model.model_id().to_string())
    }

    /// Embed one text into one sector, through cache, pool, and retries
    pub async fn embed(&self, text: &str, sector: Sector) -> Result<Vec<f32>> {
        let text = self.normalize_text(text)?;
        let key = self.cache_key(&text, sector);

        if let Some(hit) = self.lookup(&key) {
            return Ok((*hit).clone());
        }

        let deadline = Duration::from_millis(self.config.embedding_deadline_ms);
        let vector = tokio::time::timeout(deadline, self.embed_with_retry(&text, sector))
            .await
            .map_err(|_| {
                EngramError::EmbeddingUnavailable(format!(
                    "deadline of {} ms exceeded for sector {sector}",
                    self.config.embedding_deadline_ms
                ))
            })??;

        self.insert(key, Arc::new(vector.clone()));
        Ok(vector)
    }

    /// Embed one text into all five sectors in parallel
    ///
    /// Fails if any single sector fails after retries; the whole call shares
    /// one deadline.
    pub async fn embed_all_sectors(&self, text: &str) -> Result<HashMap<Sector, Vec<f32>>> {
        let text = self.normalize_text(text)?;
        let deadline = Duration::from_millis(self.config.embedding_deadline_ms);

        let work = async {
            let futures = Sector::all().map(|sector| self.embed_cached_pooled(&text, sector));
            let [a, b, c, d, e] = futures;
            let (a, b, c, d, e) = tokio::try_join!(a, b, c, d, e)?;
            let mut map = HashMap::with_capacity(5);
            for (sector, vector) in Sector::all().into_iter().zip([a, b, c, d, e]) {
                map.insert(sector, vector);
            }
            Ok::<_, EngramError>(map)
        };

        tokio::time::timeout(deadline, work).await.map_err(|_| {
            EngramError::EmbeddingUnavailable(format!(
                "deadline of {} ms exceeded embedding all sectors",
                self.config.embedding_deadline_ms
            ))
        })?
    }

    /// Cache-then-pool path without the outer deadline (the caller owns it)
    async fn embed_cached_pooled(&self, text: &str, sector: Sector) -> Result<Vec<f32>> {
        let key = self.cache_key(text, sector);
        if let Some(hit) = self.lookup(&key) {
            return Ok((*hit).clone());
        }
        let vector = self.embed_with_retry(text, sector).await?;
        self.insert(key, Arc::new(vector.clone()));
        Ok(vector)
    }

    async fn embed_with_retry(&self, text: &str, sector: Sector) -> Result<Vec<f32>> {
        let _permit = self
            .pool
            .acquire()
            .await
            .map_err(|_| EngramError::ConcurrencyLimit)?;

        let mut last_err = EngramError::EmbeddingUnavailable("no attempt made".to_string());
        for attempt in 0..MAX_ATTEMPTS {
            match self.model.embed(text, sector).await {
                Ok(vector) => {
                    self.check_output(&vector, sector)?;
                    return Ok(vector);
                }
                // Validation failures are not retried
                Err(e @ EngramError::EmptyText)
                | Err(e @ EngramError::TextTooLong { .. })
                | Err(e @ EngramError::InvalidVector(_)) => return Err(e),
                Err(e) => {
                    tracing::debug!(sector = %sector, attempt, error = %e, "embed attempt failed");
                    last_err = e;
                    let backoff = BACKOFF_BASE_MS << attempt;
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
            }
        }
        Err(EngramError::EmbeddingUnavailable(last_err.to_string()))
    }

    fn check_output(&self, vector: &[f32], sector: Sector) -> Result<()> {
        vecmath::validate(vector)?;
        let expected = self.model.dimensions(sector);
        if vector.len() != expected {
            return Err(EngramError::InvalidVector(format!(
                "model returned {} dims for sector {sector}, expected {expected}",
                vector.len()
            )));
        }
        Ok(())
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<Vec<f32>>> {
        let mut cache = self.cache.lock().ok()?;
        cache.get(key).cloned()
    }

    fn insert(&self, key: CacheKey, value: Arc<Vec<f32>>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, value);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
