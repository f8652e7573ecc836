use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{AdvisorError, Result};
use crate::ml::TextEmbedder;
use crate::models::{Cocktail, SearchQuery, UserPreference};
use crate::services::preferences::PreferenceService;
use crate::services::scoring::PreferenceScorer;
use crate::services::similarity::SimilaritySearch;

/// Result of a recommendation or search request. `degraded` means some
/// candidates (or the preference lookup) were lost to transient
/// infrastructure failures; an empty, non-degraded list is a genuine "no
/// good matches".
#[derive(Debug)]
pub struct Recommendations {
    pub cocktails: Vec<Cocktail>,
    pub degraded: bool,
}

/// Per-request pipeline: embed the query, search the index with over-fetch,
/// hydrate records, optionally re-rank by preferences, truncate. Holds no
/// state across requests.
pub struct RecommendationService {
    embedder: Arc<dyn TextEmbedder>,
    search: Arc<SimilaritySearch>,
    preferences: Arc<PreferenceService>,
    scorer: PreferenceScorer,
    candidate_overfetch: usize,
    max_recommendations: usize,
}

impl RecommendationService {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        search: Arc<SimilaritySearch>,
        preferences: Arc<PreferenceService>,
        scorer: PreferenceScorer,
        candidate_overfetch: usize,
        max_recommendations: usize,
    ) -> Self {
        Self {
            embedder,
            search,
            preferences,
            scorer,
            candidate_overfetch: candidate_overfetch.max(1),
            max_recommendations: max_recommendations.max(1),
        }
    }

    /// Personalized recommendations for a free-form query.
    ///
    /// An embedding failure fails the whole request; the caller retries.
    /// Record-store trouble only degrades the result.
    pub async fn recommend_cocktails(
        &self,
        query: &str,
        prefs: Option<&UserPreference>,
        limit: usize,
    ) -> Result<Recommendations> {
        let limit = self.validated_limit(limit)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(AdvisorError::InvalidInput("query cannot be empty".into()));
        }

        let embedding = self.embed_query(query).await?;

        // Over-fetch so allergy exclusion and missing records do not leave
        // the caller short.
        let found = self
            .search
            .find_similar(&embedding, limit * self.candidate_overfetch, None)
            .await?;
        let degraded = found.degraded;

        let candidates: Vec<Cocktail> = found.matches.into_iter().map(|m| m.cocktail).collect();
        debug!(candidates = candidates.len(), "retrieved similarity candidates");

        let mut cocktails = match prefs {
            Some(prefs) => self.scorer.rank(candidates, prefs),
            None => candidates,
        };
        cocktails.truncate(limit);

        info!(
            query,
            returned = cocktails.len(),
            degraded,
            personalized = prefs.is_some(),
            "recommendation request complete"
        );
        Ok(Recommendations {
            cocktails,
            degraded,
        })
    }

    /// Structured search. When `user_id` resolves to stored preferences the
    /// candidates are re-ranked; a failed preference lookup falls back to
    /// unpersonalized results and flags the response degraded.
    pub async fn search_cocktails(
        &self,
        query: &str,
        limit: usize,
        user_id: Option<&str>,
    ) -> Result<Recommendations> {
        let request = SearchQuery::new(query, limit);
        if request.query.is_empty() {
            return Err(AdvisorError::InvalidInput("query cannot be empty".into()));
        }

        let embedding = self.embed_query(&request.query).await?;
        let found = self
            .search
            .find_similar(&embedding, request.limit, None)
            .await?;
        let mut degraded = found.degraded;

        let candidates: Vec<Cocktail> = found.matches.into_iter().map(|m| m.cocktail).collect();

        let mut cocktails = match user_id {
            Some(user_id) => match self.preferences.get_preferences(user_id).await {
                Ok(Some(prefs)) => self.scorer.rank(candidates, &prefs),
                Ok(None) => candidates,
                Err(e) => {
                    warn!(user_id, error = %e, "preference lookup failed, returning unpersonalized results");
                    degraded = true;
                    candidates
                }
            },
            None => candidates,
        };
        cocktails.truncate(request.limit);

        Ok(Recommendations {
            cocktails,
            degraded,
        })
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embedder.embed(&[query.to_string()]).await?;
        if embeddings.is_empty() {
            return Err(AdvisorError::EmbeddingFailed(
                "provider returned no vectors".into(),
            ));
        }
        Ok(embeddings.remove(0))
    }

    fn validated_limit(&self, limit: usize) -> Result<usize> {
        if limit == 0 {
            return Err(AdvisorError::InvalidInput(
                "limit must be greater than zero".into(),
            ));
        }
        Ok(limit.min(self.max_recommendations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::record_store::{MemoryRecordStore, RecordStore};
    use crate::services::vector_index::CocktailVectorIndex;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FailingEmbedder;

    #[async_trait]
    impl TextEmbedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(AdvisorError::EmbeddingFailed("provider offline".into()))
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn service(embedder: Arc<dyn TextEmbedder>) -> RecommendationService {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let search = Arc::new(SimilaritySearch::new(
            CocktailVectorIndex::new(2, None, 8),
            Arc::clone(&store),
            0.7,
            2,
            Duration::from_secs(3600),
        ));
        RecommendationService::new(
            embedder,
            search,
            Arc::new(PreferenceService::new(store)),
            PreferenceScorer::with_defaults(),
            2,
            10,
        )
    }

    #[tokio::test]
    async fn empty_query_is_rejected_before_embedding() {
        let service = service(Arc::new(FailingEmbedder));
        let err = service
            .recommend_cocktails("   ", None, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn zero_limit_is_rejected() {
        let service = service(Arc::new(FailingEmbedder));
        let err = service
            .recommend_cocktails("anything", None, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn embedding_failure_fails_the_whole_request() {
        let service = service(Arc::new(FailingEmbedder));
        let err = service
            .recommend_cocktails("refreshing citrus drink", None, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::EmbeddingFailed(_)));
        assert!(err.is_transient());
    }
}
