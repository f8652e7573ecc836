use std::cmp::Ordering;
use tracing::debug;

use crate::config::ScoringWeights;
use crate::models::{Cocktail, UserPreference};

/// Pure relevance scoring of candidates against a user's stored
/// preferences. Owns no state beyond its weights; ranking the same input
/// twice yields the same output.
#[derive(Debug, Clone)]
pub struct PreferenceScorer {
    weights: ScoringWeights,
}

impl PreferenceScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn with_defaults() -> Self {
        Self::new(ScoringWeights::default())
    }

    /// True if any ingredient name contains any allergy term as a
    /// case-insensitive substring. Allergen matches exclude the cocktail
    /// entirely; they are never expressed as a negative score.
    pub fn contains_allergen(&self, cocktail: &Cocktail, prefs: &UserPreference) -> bool {
        prefs
            .allergies
            .iter()
            .any(|allergy| cocktail.any_ingredient_contains(allergy))
    }

    /// Additive score. Each rule awards its weight at most once, no matter
    /// how many entries match.
    pub fn score(&self, cocktail: &Cocktail, prefs: &UserPreference) -> f32 {
        let mut score = 0.0;

        if prefs
            .favorite_ingredients
            .iter()
            .any(|favorite| cocktail.has_ingredient(favorite))
        {
            score += self.weights.favorite_ingredient;
        }

        if prefs
            .preferred_alcohol_types
            .iter()
            .any(|alcohol| cocktail.any_ingredient_contains(alcohol))
        {
            score += self.weights.alcohol_type;
        }

        if prefs
            .favorite_cocktails
            .iter()
            .any(|name| name == &cocktail.name)
        {
            score += self.weights.favorite_cocktail;
        }

        score
    }

    /// Drop allergen matches, then order by descending score. The sort is
    /// stable: equal scores keep their input order, so zero-score cocktails
    /// trail in their original similarity order.
    pub fn rank(&self, cocktails: Vec<Cocktail>, prefs: &UserPreference) -> Vec<Cocktail> {
        let mut scored: Vec<(Cocktail, f32)> = cocktails
            .into_iter()
            .filter(|cocktail| !self.contains_allergen(cocktail, prefs))
            .map(|cocktail| {
                let score = self.score(&cocktail, prefs);
                (cocktail, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        debug!(
            user_id = %prefs.user_id,
            candidates = scored.len(),
            "ranked candidates by preference score"
        );

        scored.into_iter().map(|(cocktail, _)| cocktail).collect()
    }
}
