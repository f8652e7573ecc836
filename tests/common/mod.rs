use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cocktail_advisor::error::{AdvisorError, Result};
use cocktail_advisor::ml::TextEmbedder;
use cocktail_advisor::models::{Cocktail, CocktailIngredient};
use cocktail_advisor::services::record_store::{MemoryRecordStore, RecordStore};
use cocktail_advisor::services::vector_index::CocktailVectorIndex;
use cocktail_advisor::services::{
    CatalogService, PreferenceScorer, PreferenceService, RecommendationService, SimilaritySearch,
};

pub const DIMENSION: usize = 3;

/// Embedder with canned vectors keyed by substring, so both ingestion texts
/// ("Mojito rum lime ...") and queries resolve deterministically. Unknown
/// text behaves like a provider outage.
pub struct KeyedEmbedder {
    keys: Vec<(&'static str, [f32; DIMENSION])>,
}

impl KeyedEmbedder {
    pub fn new() -> Self {
        Self {
            keys: vec![
                ("refreshing citrus drink", [0.97, 0.03, 0.0]),
                ("mojito", [1.0, 0.0, 0.0]),
                ("daiquiri", [0.9, 0.1, 0.0]),
                ("espresso martini", [0.0, 1.0, 0.0]),
                ("negroni", [0.0, 0.0, 1.0]),
            ],
        }
    }
}

#[async_trait]
impl TextEmbedder for KeyedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| {
                let lowered = text.to_lowercase();
                self.keys
                    .iter()
                    .find(|(key, _)| lowered.contains(*key))
                    .map(|(_, vector)| vector.to_vec())
                    .ok_or_else(|| {
                        AdvisorError::EmbeddingFailed(format!("no embedding for '{text}'"))
                    })
            })
            .collect()
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Record store whose reads can be switched off to simulate an outage.
/// Writes always land in the wrapped in-memory store.
pub struct FlakyStore {
    inner: MemoryRecordStore,
    fail_reads: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryRecordStore::new(),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn set_read_failures(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.inner.put(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AdvisorError::StoreUnavailable("connection refused".into()));
        }
        self.inner.get(key).await
    }
}

pub fn cocktail(id: i64, name: &str, ingredients: &[&str]) -> Cocktail {
    Cocktail::new(
        id,
        name,
        true,
        "Cocktail",
        "Highball glass",
        "Shake with ice and strain.",
        None,
        ingredients
            .iter()
            .map(|i| CocktailIngredient::new(i, None))
            .collect(),
        0.5,
        0.5,
    )
}

pub fn sample_catalog() -> Vec<Cocktail> {
    vec![
        cocktail(1, "Mojito", &["rum", "lime", "mint", "soda"]),
        cocktail(2, "Daiquiri", &["rum", "lime", "sugar"]),
        cocktail(3, "Espresso Martini", &["vodka", "coffee liqueur", "espresso"]),
        cocktail(4, "Negroni", &["gin", "campari", "sweet vermouth"]),
    ]
}

pub struct Pipeline {
    pub recommendations: RecommendationService,
    pub catalog: CatalogService,
    pub preferences: Arc<PreferenceService>,
    pub store: Arc<FlakyStore>,
}

/// Fully wired pipeline over the keyed embedder and the flaky in-memory
/// store, loaded with the sample catalog.
pub async fn pipeline() -> Pipeline {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cocktail_advisor=warn".into()),
        )
        .with_test_writer()
        .try_init();

    let store = Arc::new(FlakyStore::new());
    let embedder: Arc<dyn TextEmbedder> = Arc::new(KeyedEmbedder::new());

    let search = Arc::new(SimilaritySearch::new(
        CocktailVectorIndex::new(DIMENSION, None, 8),
        Arc::clone(&store) as Arc<dyn RecordStore>,
        0.7,
        2,
        Duration::from_secs(3600),
    ));
    let preferences = Arc::new(PreferenceService::new(
        Arc::clone(&store) as Arc<dyn RecordStore>
    ));

    let catalog = CatalogService::new(
        Arc::clone(&embedder),
        Arc::clone(&search),
        Arc::clone(&store) as Arc<dyn RecordStore>,
    );
    catalog.ingest(sample_catalog()).await.unwrap();

    let recommendations = RecommendationService::new(
        embedder,
        search,
        Arc::clone(&preferences),
        PreferenceScorer::with_defaults(),
        2,
        10,
    );

    Pipeline {
        recommendations,
        catalog,
        preferences,
        store,
    }
}
