use serde::{Deserialize, Serialize};
use std::fmt::Display;

mod recipe;
mod user_ingredients;

pub use recipe::{split_ingredients, Recipe};
pub use user_ingredients::UserIngredients;

// ============================================================================
// Recommendation Pipeline Types
// ============================================================================

/// A recipe paired with its match score for one ranking request
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecipe {
    pub recipe: Recipe,
    /// Normalized ingredient list the score was computed from
    pub ingredients: Vec<String>,
    pub match_score: f64,
}

/// Reduced view of a shortlist entry sent to the completion service
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSummary {
    pub id: String,
    pub name: String,
    pub match_score: f64,
    pub matched_ingredients: Vec<String>,
    pub contains_disliked: bool,
    pub contains_allergic: bool,
    pub category: Option<String>,
}

/// Structured reply expected back from the completion service
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CompletionReply {
    #[serde(rename = "recommendedRecipes")]
    pub recommended_recipes: Vec<ReplyEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ReplyEntry {
    pub id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Where a final recommendation came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSource {
    /// Chosen by the completion service
    Model,
    /// Taken from the top of the ranked shortlist
    Fallback,
}

impl Display for RecommendationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecommendationSource::Model => write!(f, "model"),
            RecommendationSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// One of the final three recipes returned to the client
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendedRecipe {
    #[serde(flatten)]
    pub recipe: Recipe,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preference_tag: Option<String>,
    pub source: RecommendationSource,
}

// ============================================================================
// Label Detection Types
// ============================================================================

/// A single label returned by the image-labeling service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelAnnotation {
    pub description: String,
    /// Confidence in [0, 1]
    #[serde(default)]
    pub score: f32,
}

// ============================================================================
// Auth Types
// ============================================================================

/// Identity of a caller whose ID token was verified
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
}
