pub mod embedder;

pub use embedder::{embeddings_to_matrix, HttpEmbedder, TextEmbedder};
