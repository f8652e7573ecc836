use serde::{Deserialize, Deserializer, Serialize};

fn deserialize_cocktail_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(title_case(raw.trim()))
}

fn deserialize_ingredient_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_lowercase())
}

fn deserialize_measure<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty()))
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    // Source data sometimes carries tags as a comma-separated string.
    match StringOrVec::deserialize(deserializer)? {
        StringOrVec::String(s) => Ok(s
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()),
        StringOrVec::Vec(v) => Ok(v),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocktailIngredient {
    #[serde(deserialize_with = "deserialize_ingredient_name")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_measure")]
    pub measure: Option<String>,
}

impl CocktailIngredient {
    pub fn new(name: &str, measure: Option<&str>) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            measure: measure
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cocktail {
    pub id: i64,
    #[serde(deserialize_with = "deserialize_cocktail_name")]
    pub name: String,
    pub alcoholic: bool,
    pub category: String,
    pub glass_type: String,
    pub instructions: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub ingredients: Vec<CocktailIngredient>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    pub complexity_score: f32,
    pub popularity_score: f32,
}

impl Cocktail {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i64,
        name: &str,
        alcoholic: bool,
        category: &str,
        glass_type: &str,
        instructions: &str,
        thumbnail_url: Option<&str>,
        ingredients: Vec<CocktailIngredient>,
        complexity_score: f32,
        popularity_score: f32,
    ) -> Self {
        Self {
            id,
            name: title_case(name.trim()),
            alcoholic,
            category: category.to_string(),
            glass_type: glass_type.to_string(),
            instructions: instructions.to_string(),
            thumbnail_url: thumbnail_url.map(|u| u.to_string()),
            ingredients,
            tags: Vec::new(),
            complexity_score: complexity_score.clamp(0.0, 1.0),
            popularity_score: popularity_score.clamp(0.0, 1.0),
        }
    }

    /// True if any ingredient name contains `term` as a case-insensitive
    /// substring.
    pub fn any_ingredient_contains(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.ingredients.iter().any(|i| i.name.contains(&term))
    }

    /// True if any ingredient name equals `name` case-insensitively.
    pub fn has_ingredient(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.ingredients.iter().any(|i| i.name == name)
    }
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut at_word_start = true;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
                at_word_start = false;
            } else {
                out.extend(ch.to_lowercase());
            }
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}
