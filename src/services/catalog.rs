use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::ml::{embeddings_to_matrix, TextEmbedder};
use crate::models::{Cocktail, CocktailIngredient};
use crate::services::record_store::{cocktail_key, RecordStore};
use crate::services::recommendation::Recommendations;
use crate::services::similarity::SimilaritySearch;

const INGEST_BATCH_SIZE: usize = 100;

const TECHNIQUE_WORDS: [&str; 6] = ["shake", "stir", "blend", "muddle", "layer", "float"];

/// Catalog ingestion and ingredient lookup.
///
/// Ingestion embeds each cocktail's name, ingredient list and instructions
/// as one text, feeds the similarity index and record store in batches, and
/// maintains an ingredient → cocktail-ids inverted index for exact
/// ingredient queries.
pub struct CatalogService {
    embedder: Arc<dyn TextEmbedder>,
    search: Arc<SimilaritySearch>,
    store: Arc<dyn RecordStore>,
    ingredient_index: RwLock<HashMap<String, Vec<i64>>>,
}

impl CatalogService {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        search: Arc<SimilaritySearch>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            embedder,
            search,
            store,
            ingredient_index: RwLock::new(HashMap::new()),
        }
    }

    /// Embed and index a set of cocktails. Returns the number ingested.
    /// Embedding and store failures abort the remaining batches: a partial
    /// catalog load is surfaced to the operator, not papered over.
    pub async fn ingest(&self, cocktails: Vec<Cocktail>) -> Result<usize> {
        let total = cocktails.len();

        for batch in cocktails.chunks(INGEST_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(embedding_text).collect();
            let embeddings = self.embedder.embed(&texts).await?;
            let matrix = embeddings_to_matrix(&embeddings, self.embedder.dimension())?;

            self.search.add_cocktails(batch, matrix.view()).await?;

            let mut index = self.ingredient_index.write();
            for cocktail in batch {
                for ingredient in &cocktail.ingredients {
                    index
                        .entry(ingredient.name.clone())
                        .or_default()
                        .push(cocktail.id);
                }
            }
            debug!(batch = batch.len(), "ingested cocktail batch");
        }

        info!(total, "catalog ingestion complete");
        Ok(total)
    }

    /// Cocktails containing **all** of the given ingredients, ordered by
    /// descending complexity. Record-store failures degrade the result
    /// instead of failing it.
    pub async fn cocktails_by_ingredients(
        &self,
        ingredients: &[String],
        limit: usize,
    ) -> Result<Recommendations> {
        if ingredients.is_empty() {
            return Ok(Recommendations {
                cocktails: Vec::new(),
                degraded: false,
            });
        }

        let mut matching_ids: Option<HashSet<i64>> = None;
        {
            let index = self.ingredient_index.read();
            for ingredient in ingredients {
                let ids: HashSet<i64> = index
                    .get(&ingredient.trim().to_lowercase())
                    .map(|ids| ids.iter().copied().collect())
                    .unwrap_or_default();
                matching_ids = Some(match matching_ids {
                    None => ids,
                    Some(acc) => acc.intersection(&ids).copied().collect(),
                });
            }
        }

        let mut ids: Vec<i64> = matching_ids.unwrap_or_default().into_iter().collect();
        ids.sort_unstable();

        let mut cocktails = Vec::new();
        let mut degraded = false;
        for id in ids {
            match self.store.get(&cocktail_key(id)).await {
                Ok(Some(value)) => match serde_json::from_value::<Cocktail>(value) {
                    Ok(cocktail) => cocktails.push(cocktail),
                    Err(e) => {
                        warn!(id, error = %e, "stored record is unreadable");
                        degraded = true;
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    warn!(id, error = %e, "record store lookup failed");
                    degraded = true;
                }
            }
        }

        cocktails.sort_by(|a, b| {
            b.complexity_score
                .partial_cmp(&a.complexity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        cocktails.truncate(limit);

        Ok(Recommendations {
            cocktails,
            degraded,
        })
    }
}

/// The text a cocktail is embedded under: name, ingredient names,
/// instructions.
pub fn embedding_text(cocktail: &Cocktail) -> String {
    let ingredients = cocktail
        .ingredients
        .iter()
        .map(|i| i.name.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "{} {} {}",
        cocktail.name, ingredients, cocktail.instructions
    )
}

/// Complexity in [0, 1] from ingredient count, instruction length and
/// technique keywords.
pub fn complexity_score(ingredients: &[CocktailIngredient], instructions: &str) -> f32 {
    let ingredients_score = (ingredients.len() as f32 / 10.0).min(1.0);
    let instructions_score = (instructions.len() as f32 / 500.0).min(1.0);

    let lowered = instructions.to_lowercase();
    let technique_score = TECHNIQUE_WORDS
        .iter()
        .filter(|word| lowered.contains(**word))
        .count() as f32
        / TECHNIQUE_WORDS.len() as f32;

    ingredients_score * 0.4 + instructions_score * 0.3 + technique_score * 0.3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::record_store::MemoryRecordStore;
    use crate::services::vector_index::CocktailVectorIndex;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StubEmbedder {
        dimension: usize,
    }

    #[async_trait]
    impl TextEmbedder for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|text| {
                    let mut vector = vec![0.0; self.dimension];
                    for (i, byte) in text.bytes().enumerate() {
                        vector[i % self.dimension] += byte as f32 / 255.0;
                    }
                    vector
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    fn cocktail(id: i64, name: &str, ingredients: &[&str], complexity: f32) -> Cocktail {
        Cocktail::new(
            id,
            name,
            true,
            "Cocktail",
            "Coupe",
            "Shake well with ice.",
            None,
            ingredients
                .iter()
                .map(|i| CocktailIngredient::new(i, None))
                .collect(),
            complexity,
            0.5,
        )
    }

    fn catalog() -> CatalogService {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let search = Arc::new(SimilaritySearch::new(
            CocktailVectorIndex::new(4, None, 8),
            Arc::clone(&store),
            0.0,
            2,
            Duration::from_secs(3600),
        ));
        CatalogService::new(Arc::new(StubEmbedder { dimension: 4 }), search, store)
    }

    #[tokio::test]
    async fn ingest_feeds_index_store_and_ingredient_lookup() {
        let catalog = catalog();
        let ingested = catalog
            .ingest(vec![
                cocktail(1, "Daiquiri", &["rum", "lime", "sugar"], 0.3),
                cocktail(2, "Mojito", &["rum", "lime", "mint", "soda"], 0.6),
                cocktail(3, "Gimlet", &["gin", "lime"], 0.2),
            ])
            .await
            .unwrap();

        assert_eq!(ingested, 3);
        assert_eq!(catalog.search.index_len(), 3);

        let both = catalog
            .cocktails_by_ingredients(&["rum".into(), "lime".into()], 10)
            .await
            .unwrap();
        let ids: Vec<i64> = both.cocktails.iter().map(|c| c.id).collect();
        // Mojito is more complex than Daiquiri; Gimlet has no rum.
        assert_eq!(ids, vec![2, 1]);
        assert!(!both.degraded);
    }

    #[tokio::test]
    async fn ingredient_lookup_requires_every_ingredient() {
        let catalog = catalog();
        catalog
            .ingest(vec![cocktail(1, "Daiquiri", &["rum", "lime"], 0.3)])
            .await
            .unwrap();

        let none = catalog
            .cocktails_by_ingredients(&["rum".into(), "mint".into()], 10)
            .await
            .unwrap();
        assert!(none.cocktails.is_empty());
    }

    #[tokio::test]
    async fn empty_ingredient_list_returns_nothing() {
        let catalog = catalog();
        let result = catalog.cocktails_by_ingredients(&[], 10).await.unwrap();
        assert!(result.cocktails.is_empty());
    }

    #[test]
    fn complexity_is_bounded_and_grows_with_ingredients() {
        let few = vec![CocktailIngredient::new("rum", None)];
        let many: Vec<CocktailIngredient> = (0..12)
            .map(|i| CocktailIngredient::new(&format!("ingredient-{i}"), None))
            .collect();

        let simple = complexity_score(&few, "Pour.");
        let complex = complexity_score(&many, "Shake hard, then stir, muddle the mint and layer.");

        assert!((0.0..=1.0).contains(&simple));
        assert!((0.0..=1.0).contains(&complex));
        assert!(complex > simple);
    }

    #[test]
    fn embedding_text_joins_name_ingredients_and_instructions() {
        let c = cocktail(1, "Daiquiri", &["rum", "lime"], 0.3);
        assert_eq!(embedding_text(&c), "Daiquiri rum lime Shake well with ice.");
    }
}
