use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::error::{AdvisorError, Result};
use crate::ml::{HttpEmbedder, TextEmbedder};
use crate::services::{
    CatalogService, CocktailVectorIndex, MemoryRecordStore, PreferenceScorer, PreferenceService,
    RecommendationService, RecordStore, RestRecordStore, SimilaritySearch, SnapshotStore,
};

/// The assembled recommendation pipeline.
///
/// Every component is constructed explicitly here and handed its
/// dependencies; nothing lives in process-global state. Construction
/// restores the vector index from the active snapshot when one exists, and
/// [`Advisor::save_index`] persists it again before shutdown. Network
/// clients release their connections on drop.
pub struct Advisor {
    pub recommendations: Arc<RecommendationService>,
    pub catalog: Arc<CatalogService>,
    pub preferences: Arc<PreferenceService>,
    similarity: Arc<SimilaritySearch>,
    snapshots: SnapshotStore,
}

impl Advisor {
    /// Wire the pipeline from configuration: HTTP embedding client, REST
    /// record store when configured (in-memory otherwise), snapshot-backed
    /// vector index.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder: Arc<dyn TextEmbedder> = Arc::new(HttpEmbedder::new(
            &config.embedding,
            config.embedding_dimension,
        )?);
        let store: Arc<dyn RecordStore> = match &config.record_store {
            Some(rest) => Arc::new(RestRecordStore::new(rest)),
            None => Arc::new(MemoryRecordStore::new()),
        };
        Self::with_components(config, embedder, store)
    }

    /// Wire the pipeline around injected embedder and store implementations.
    pub fn with_components(
        config: &Config,
        embedder: Arc<dyn TextEmbedder>,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self> {
        // The clustering upgrade is a production-only behavior.
        let clustering_threshold = config
            .is_production()
            .then_some(config.index_clustering_threshold);

        let snapshots = SnapshotStore::new(config.vector_db_path.clone());
        let index = match snapshots.load_index(clustering_threshold, config.index_probe_count)? {
            Some(index) => {
                if index.dimension() != config.embedding_dimension {
                    return Err(AdvisorError::DimensionMismatch {
                        expected: config.embedding_dimension,
                        got: index.dimension(),
                    });
                }
                info!(rows = index.len(), "restored vector index from snapshot");
                index
            }
            None => CocktailVectorIndex::new(
                config.embedding_dimension,
                clustering_threshold,
                config.index_probe_count,
            ),
        };

        let similarity = Arc::new(SimilaritySearch::new(
            index,
            Arc::clone(&store),
            config.min_similarity,
            config.candidate_overfetch,
            Duration::from_secs(config.record_ttl_secs),
        ));
        let preferences = Arc::new(PreferenceService::new(Arc::clone(&store)));
        let catalog = Arc::new(CatalogService::new(
            Arc::clone(&embedder),
            Arc::clone(&similarity),
            store,
        ));
        let recommendations = Arc::new(RecommendationService::new(
            embedder,
            Arc::clone(&similarity),
            Arc::clone(&preferences),
            PreferenceScorer::new(config.scoring),
            config.candidate_overfetch,
            config.max_recommendations,
        ));

        Ok(Self {
            recommendations,
            catalog,
            preferences,
            similarity,
            snapshots,
        })
    }

    pub fn similarity(&self) -> &SimilaritySearch {
        &self.similarity
    }

    /// Snapshot the vector index to disk and repoint the manifest.
    pub fn save_index(&self) -> Result<String> {
        self.snapshots.save(&self.similarity.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingConfig, ScoringWeights};
    use crate::models::{Cocktail, CocktailIngredient};
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct ConstantEmbedder;

    #[async_trait]
    impl TextEmbedder for ConstantEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|text| vec![text.len() as f32, 1.0])
                .collect())
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn test_config(vector_db_path: PathBuf) -> Config {
        Config {
            environment: "development".to_string(),
            embedding_dimension: 2,
            min_similarity: 0.0,
            candidate_overfetch: 2,
            max_recommendations: 10,
            record_ttl_secs: 3600,
            vector_db_path,
            index_clustering_threshold: 1000,
            index_probe_count: 8,
            embedding: EmbeddingConfig {
                api_key: "test".to_string(),
                base_url: "http://localhost".to_string(),
                model: "test-model".to_string(),
                timeout_secs: 5,
            },
            record_store: None,
            scoring: ScoringWeights::default(),
        }
    }

    fn sample_cocktail() -> Cocktail {
        Cocktail::new(
            1,
            "Daiquiri",
            true,
            "Cocktail",
            "Coupe",
            "Shake with ice.",
            None,
            vec![CocktailIngredient::new("rum", Some("2 oz"))],
            0.3,
            0.5,
        )
    }

    #[tokio::test]
    async fn wired_pipeline_serves_recommendations() {
        let dir = tempfile::tempdir().unwrap();
        let advisor = Advisor::with_components(
            &test_config(dir.path().to_path_buf()),
            Arc::new(ConstantEmbedder),
            Arc::new(MemoryRecordStore::new()),
        )
        .unwrap();

        advisor.catalog.ingest(vec![sample_cocktail()]).await.unwrap();

        let result = advisor
            .recommendations
            .recommend_cocktails("rum drink", None, 3)
            .await
            .unwrap();
        assert_eq!(result.cocktails.len(), 1);
        assert_eq!(result.cocktails[0].name, "Daiquiri");
    }

    #[tokio::test]
    async fn saved_index_is_restored_on_next_construction() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());

        let advisor = Advisor::with_components(
            &config,
            Arc::new(ConstantEmbedder),
            Arc::new(MemoryRecordStore::new()),
        )
        .unwrap();
        advisor.catalog.ingest(vec![sample_cocktail()]).await.unwrap();
        advisor.save_index().unwrap();

        let reopened = Advisor::with_components(
            &config,
            Arc::new(ConstantEmbedder),
            Arc::new(MemoryRecordStore::new()),
        )
        .unwrap();
        assert_eq!(reopened.similarity().index_len(), 1);
    }
}
