use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored taste profile for one user. An update fully replaces the previous
/// record for that `user_id`; records are never merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: String,
    #[serde(default)]
    pub favorite_ingredients: Vec<String>,
    #[serde(default)]
    pub favorite_cocktails: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub preferred_alcohol_types: Vec<String>,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl UserPreference {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            favorite_ingredients: Vec::new(),
            favorite_cocktails: Vec::new(),
            allergies: Vec::new(),
            preferred_alcohol_types: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// Trim and lowercase the ingredient-like lists, dropping empties.
    /// `favorite_cocktails` keeps its case: entries are matched exactly
    /// against title-cased cocktail names.
    pub fn normalized(mut self) -> Self {
        self.favorite_ingredients = normalize_terms(&self.favorite_ingredients);
        self.allergies = normalize_terms(&self.allergies);
        self.preferred_alcohol_types = normalize_terms(&self.preferred_alcohol_types);
        self.favorite_cocktails = self
            .favorite_cocktails
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        self
    }
}

fn normalize_terms(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
