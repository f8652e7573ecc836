pub mod catalog;
pub mod preferences;
pub mod record_store;
pub mod recommendation;
pub mod scoring;
pub mod similarity;
pub mod snapshot;
pub mod vector_index;

// Re-export public types
pub use catalog::CatalogService;
pub use preferences::PreferenceService;
pub use record_store::{MemoryRecordStore, RecordStore, RestRecordStore};
pub use recommendation::{RecommendationService, Recommendations};
pub use scoring::PreferenceScorer;
pub use similarity::{SimilarMatches, SimilaritySearch};
pub use snapshot::SnapshotStore;
pub use vector_index::CocktailVectorIndex;
