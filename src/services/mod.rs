pub mod ingredients;
pub mod matching;
pub mod pipeline;
pub mod providers;
pub mod ranking;
pub mod recommendation;

pub use ingredients::{IngredientMap, IngredientRegistry};
pub use pipeline::{PipelineOutcome, RecommendationPipeline};
pub use ranking::rank_recipes;
pub use recommendation::{RecommendationSelector, ShortlistFallback};
