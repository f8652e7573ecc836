use anyhow::{Context, Result};
use dotenv::dotenv;
use std::env;
use std::path::PathBuf;

/// Additive weights applied by the preference scorer. Kept as configuration
/// defaults for behavioral compatibility with the deployed service.
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub favorite_ingredient: f32,
    pub alcohol_type: f32,
    pub favorite_cocktail: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            favorite_ingredient: 0.3,
            alcohol_type: 0.2,
            favorite_cocktail: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RecordStoreConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub embedding_dimension: usize,
    pub min_similarity: f32,
    pub candidate_overfetch: usize,
    pub max_recommendations: usize,
    pub record_ttl_secs: u64,
    pub vector_db_path: PathBuf,
    pub index_clustering_threshold: usize,
    pub index_probe_count: usize,
    pub embedding: EmbeddingConfig,
    pub record_store: Option<RecordStoreConfig>,
    pub scoring: ScoringWeights,
}

const DEFAULT_EMBEDDING_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let embedding = EmbeddingConfig {
            api_key: env::var("APP_EMBEDDING_API_KEY")
                .context("APP_EMBEDDING_API_KEY must be set")?,
            base_url: env::var("APP_EMBEDDING_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_BASE_URL.to_string()),
            model: env::var("APP_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
            timeout_secs: parse_env("APP_EMBEDDING_TIMEOUT_SECONDS", DEFAULT_TIMEOUT_SECONDS),
        };

        // The REST record store is optional; local deployments run on the
        // in-memory store instead.
        let record_store = match (env::var("APP_RECORD_STORE_URL"), env::var("APP_RECORD_STORE_KEY"))
        {
            (Ok(base_url), Ok(api_key)) => Some(RecordStoreConfig { base_url, api_key }),
            _ => None,
        };

        Ok(Config {
            environment: env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            embedding_dimension: parse_env("APP_EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION),
            min_similarity: parse_env("APP_MIN_SIMILARITY_SCORE", 0.7),
            candidate_overfetch: parse_env("APP_CANDIDATE_OVERFETCH", 2),
            max_recommendations: parse_env("APP_MAX_RECOMMENDATIONS", 10),
            record_ttl_secs: parse_env("APP_CACHE_TTL_SECONDS", 3600),
            vector_db_path: PathBuf::from(
                env::var("APP_VECTOR_DB_PATH").unwrap_or_else(|_| "data/vector_store".to_string()),
            ),
            index_clustering_threshold: parse_env("APP_INDEX_CLUSTERING_THRESHOLD", 1000),
            index_probe_count: parse_env("APP_INDEX_PROBE_COUNT", 8),
            embedding,
            record_store,
            scoring: ScoringWeights::default(),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoring_weights_defaults_match_deployed_values() {
        let weights = ScoringWeights::default();
        assert_eq!(weights.favorite_ingredient, 0.3);
        assert_eq!(weights.alcohol_type, 0.2);
        assert_eq!(weights.favorite_cocktail, 0.5);
    }

    #[test]
    fn parse_env_falls_back_to_default() {
        assert_eq!(parse_env("APP_NO_SUCH_VARIABLE", 42usize), 42);
    }
}
