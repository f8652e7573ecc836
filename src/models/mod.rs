pub mod cocktail;
pub mod preferences;
pub mod search;

pub use cocktail::{Cocktail, CocktailIngredient};
pub use preferences::UserPreference;
pub use search::{ScoredMatch, SearchQuery};
