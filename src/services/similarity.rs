use futures::future::try_join_all;
use ndarray::{ArrayView1, ArrayView2};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{Cocktail, ScoredMatch};
use crate::services::record_store::{cocktail_key, RecordStore};
use crate::services::vector_index::{CocktailVectorIndex, IndexSnapshot, RawHit};

/// Similarity-search outcome. `degraded` is set when candidates were dropped
/// because the record store failed transiently, so callers can tell "no good
/// matches" apart from "the infrastructure was limping".
#[derive(Debug)]
pub struct SimilarMatches {
    pub matches: Vec<ScoredMatch>,
    pub degraded: bool,
}

/// Vector search joined with record hydration.
///
/// Searches over-fetch by the configured factor so that downstream
/// filtering (similarity threshold, missing records, allergy exclusion)
/// does not require a second index round-trip.
pub struct SimilaritySearch {
    index: RwLock<CocktailVectorIndex>,
    store: Arc<dyn RecordStore>,
    min_similarity: f32,
    overfetch: usize,
    record_ttl: Duration,
}

impl SimilaritySearch {
    pub fn new(
        index: CocktailVectorIndex,
        store: Arc<dyn RecordStore>,
        min_similarity: f32,
        overfetch: usize,
        record_ttl: Duration,
    ) -> Self {
        Self {
            index: RwLock::new(index),
            store,
            min_similarity,
            overfetch: overfetch.max(1),
            record_ttl,
        }
    }

    pub fn index_len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_clustered(&self) -> bool {
        self.index.read().is_clustered()
    }

    pub fn dimension(&self) -> usize {
        self.index.read().dimension()
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        self.index.read().to_snapshot()
    }

    /// Index a batch of cocktails and persist their records. Store failures
    /// here are propagated: ingestion must not silently lose records.
    pub async fn add_cocktails(
        &self,
        cocktails: &[Cocktail],
        embeddings: ArrayView2<'_, f32>,
    ) -> Result<()> {
        let ids: Vec<i64> = cocktails.iter().map(|c| c.id).collect();
        self.index.write().insert(&ids, embeddings)?;

        try_join_all(cocktails.iter().map(|cocktail| {
            let store = Arc::clone(&self.store);
            async move {
                let value = serde_json::to_value(cocktail)?;
                store
                    .put(&cocktail_key(cocktail.id), value, Some(self.record_ttl))
                    .await
            }
        }))
        .await?;

        debug!(count = cocktails.len(), "indexed cocktail batch");
        Ok(())
    }

    /// Nearest cocktails to `query`, as `(cocktail, similarity)` in
    /// descending similarity. At most `k` results; candidates below the
    /// similarity floor are dropped before counting toward `k`. Candidates
    /// whose record is missing or expired are silently skipped; a transient
    /// store failure skips the candidate and flags the result degraded.
    pub async fn find_similar(
        &self,
        query: &[f32],
        k: usize,
        min_similarity: Option<f32>,
    ) -> Result<SimilarMatches> {
        let min_similarity = min_similarity.unwrap_or(self.min_similarity);

        let raw: Vec<RawHit> = {
            let index = self.index.read();
            index.search(ArrayView1::from(query), k * self.overfetch)?
        };

        let mut matches = Vec::new();
        let mut degraded = false;

        for hit in raw {
            let similarity = similarity_from_distance(hit.distance);
            if similarity < min_similarity {
                continue;
            }

            match self.store.get(&cocktail_key(hit.id)).await {
                Ok(Some(value)) => match serde_json::from_value::<Cocktail>(value) {
                    Ok(cocktail) => matches.push(ScoredMatch {
                        cocktail,
                        similarity,
                    }),
                    Err(e) => {
                        warn!(id = hit.id, error = %e, "stored record is unreadable");
                        degraded = true;
                    }
                },
                // The id was indexed but its record expired or was never
                // written; tolerated consistency gap.
                Ok(None) => {
                    debug!(id = hit.id, "candidate has no resolvable record");
                }
                Err(e) => {
                    warn!(id = hit.id, error = %e, "record store lookup failed");
                    degraded = true;
                }
            }

            if matches.len() >= k {
                break;
            }
        }

        Ok(SimilarMatches { matches, degraded })
    }
}

/// Map Euclidean distance into a (0, 1] similarity. Monotonically
/// decreasing; exactly 1.0 only at distance zero.
pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}
