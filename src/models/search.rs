use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::models::Cocktail;

pub const MAX_SEARCH_LIMIT: usize = 20;

static NON_WORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());

/// A structured search request, sanitized on construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(query: &str, limit: usize) -> Self {
        Self {
            query: sanitize_query(query),
            limit: limit.clamp(1, MAX_SEARCH_LIMIT),
        }
    }
}

/// Strip special characters and collapse runs of whitespace.
pub fn sanitize_query(raw: &str) -> String {
    let cleaned = NON_WORD_PATTERN.replace_all(raw, " ");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One similarity-search hit: a cocktail and its score in (0, 1].
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMatch {
    pub cocktail: Cocktail,
    pub similarity: f32,
}
