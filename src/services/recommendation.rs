//! Final recipe selection
//!
//! The completion service picks three recipes out of the ranked shortlist. Its reply is
//! untrusted: anything we cannot parse, validate or resolve, and rate limiting, degrades to the
//! top of the shortlist through [`ShortlistFallback`]. Every other failure propagates.
use std::{collections::HashSet, sync::Arc};

use crate::{
    db::RecipeStore,
    error::{AppError, AppResult},
    models::{
        CandidateSummary, CompletionReply, RecommendationSource, RecommendedRecipe, ReplyEntry,
        ScoredRecipe, UserIngredients,
    },
    services::providers::{CompletionProvider, CompletionRequest},
};

/// Number of recipes in a final recommendation
pub const RECOMMENDATION_COUNT: usize = 3;

/// Reason attached to shortlist-derived recommendations after an unusable reply
pub const FALLBACK_REASON: &str = "Top ingredient match";

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 500;

const SYSTEM_PROMPT: &str = "From the candidate recipes, recommend the best 3 using these criteria:\n\
    1. Exclude recipes that contain an allergic ingredient\n\
    2. Avoid recipes that contain a disliked ingredient where possible\n\
    3. Prefer recipes with a higher ingredient match score\n\
    4. Take the user's preference type into account\n\
    5. Keep the categories diverse\n\
    Answer with JSON only.";

/// Builds the reduced per-candidate payload sent to the completion service
///
/// Ingredient overlap uses substring containment, so a recipe's "green onion" counts for an
/// owned "onion".
pub fn summarize_candidates(
    shortlist: &[ScoredRecipe],
    user: &UserIngredients,
) -> Vec<CandidateSummary> {
    let owned = user.normalized_owned();
    let disliked = user.normalized_disliked();
    let allergic = user.normalized_allergic();

    shortlist
        .iter()
        .map(|candidate| CandidateSummary {
            id: candidate.recipe.id.clone(),
            name: candidate.recipe.name.clone(),
            match_score: candidate.match_score,
            matched_ingredients: candidate
                .ingredients
                .iter()
                .filter(|ingredient| contains_any(ingredient.as_str(), &owned))
                .cloned()
                .collect(),
            contains_disliked: candidate
                .ingredients
                .iter()
                .any(|ingredient| contains_any(ingredient.as_str(), &disliked)),
            contains_allergic: candidate
                .ingredients
                .iter()
                .any(|ingredient| contains_any(ingredient.as_str(), &allergic)),
            category: candidate.recipe.category.clone(),
        })
        .collect()
}

fn contains_any(ingredient: &str, names: &[String]) -> bool {
    names.iter().any(|name| ingredient.contains(name.as_str()))
}

/// Builds the completion prompt from the user's preferences and candidate summaries
pub fn build_prompt(
    user: &UserIngredients,
    summaries: &[CandidateSummary],
) -> AppResult<CompletionRequest> {
    let candidates = serde_json::to_string_pretty(summaries)
        .map_err(|e| AppError::Internal(format!("Failed to serialize candidates: {}", e)))?;

    let user_prompt = format!(
        "User preferences:\n\
         - Owned ingredients: {owned}\n\
         - Disliked ingredients: {disliked}\n\
         - Allergic ingredients: {allergic}\n\
         - Preference type: {preference}\n\n\
         Candidate recipes:\n{candidates}\n\n\
         Reply in exactly this format, with {count} entries whose ids come from the candidates:\n\
         {{\"recommendedRecipes\": [{{\"id\": \"recipe id\", \"reason\": \"why it fits\"}}]}}",
        owned = user.owned.join(", "),
        disliked = user.disliked.join(", "),
        allergic = user.allergic.join(", "),
        preference = user.preference_tag.as_deref().unwrap_or("unknown"),
        candidates = candidates,
        count = RECOMMENDATION_COUNT,
    );

    Ok(CompletionRequest {
        system: SYSTEM_PROMPT.to_string(),
        user: user_prompt,
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    })
}

/// Parses the completion text into the structured reply
///
/// A single surrounding markdown code fence is tolerated.
pub fn parse_reply(reply: &str) -> AppResult<CompletionReply> {
    serde_json::from_str(strip_code_fence(reply))
        .map_err(|e| AppError::MalformedReply(format!("Reply is not valid JSON: {}", e)))
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.split_once('\n') {
        // Drop the info string line ("json")
        Some((_, body)) => body,
        // Single-line fence; an info string runs straight into the JSON
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Checks that the reply names enough distinct shortlist recipes
///
/// Returns the first [`RECOMMENDATION_COUNT`] distinct entries in reply order. Any id outside
/// the shortlist invalidates the whole reply.
fn validate_reply(
    reply: CompletionReply,
    shortlist: &[ScoredRecipe],
) -> AppResult<Vec<ReplyEntry>> {
    let known: HashSet<&str> = shortlist.iter().map(|c| c.recipe.id.as_str()).collect();
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for entry in reply.recommended_recipes {
        let id = entry.id.trim().to_string();
        if !known.contains(id.as_str()) {
            return Err(AppError::InsufficientRecommendations(format!(
                "Reply names recipe {} which is not on the shortlist",
                id
            )));
        }
        if seen.insert(id.clone()) {
            entries.push(ReplyEntry {
                id,
                reason: entry.reason,
            });
        }
    }

    if entries.len() < RECOMMENDATION_COUNT {
        return Err(AppError::InsufficientRecommendations(format!(
            "Reply names {} distinct recipes, {} required",
            entries.len(),
            RECOMMENDATION_COUNT
        )));
    }

    entries.truncate(RECOMMENDATION_COUNT);
    Ok(entries)
}

/// Degrades selector failures to the top of the ranked shortlist
pub struct ShortlistFallback;

impl ShortlistFallback {
    /// Passes successes through, recovers fallback-eligible errors, propagates the rest
    pub fn apply(
        outcome: AppResult<Vec<RecommendedRecipe>>,
        shortlist: &[ScoredRecipe],
        user: &UserIngredients,
    ) -> AppResult<Vec<RecommendedRecipe>> {
        match outcome {
            Ok(recommendations) => Ok(recommendations),
            Err(AppError::RateLimited(detail)) => {
                tracing::warn!(detail = %detail, fallback = "rate_limited", "Completion rate limited, using shortlist");
                Ok(Self::top_of_shortlist(shortlist, user, None))
            }
            Err(e) if e.is_recoverable_by_fallback() => {
                tracing::warn!(error = %e, fallback = "unusable_reply", "Completion reply unusable, using shortlist");
                Ok(Self::top_of_shortlist(
                    shortlist,
                    user,
                    Some(FALLBACK_REASON.to_string()),
                ))
            }
            Err(e) => Err(e),
        }
    }

    /// The first [`RECOMMENDATION_COUNT`] shortlist entries, in rank order
    pub fn top_of_shortlist(
        shortlist: &[ScoredRecipe],
        user: &UserIngredients,
        reason: Option<String>,
    ) -> Vec<RecommendedRecipe> {
        shortlist
            .iter()
            .take(RECOMMENDATION_COUNT)
            .map(|candidate| RecommendedRecipe {
                recipe: candidate.recipe.clone(),
                reason: reason.clone(),
                preference_tag: user.preference_tag.clone(),
                source: RecommendationSource::Fallback,
            })
            .collect()
    }
}

/// Picks the final recipes from a shortlist with the help of a completion service
#[derive(Clone)]
pub struct RecommendationSelector {
    completion: Arc<dyn CompletionProvider>,
    recipes: Arc<dyn RecipeStore>,
}

impl RecommendationSelector {
    pub fn new(completion: Arc<dyn CompletionProvider>, recipes: Arc<dyn RecipeStore>) -> Self {
        Self {
            completion,
            recipes,
        }
    }

    /// Final recommendation with the shortlist fallback applied
    ///
    /// An empty shortlist is `NoCandidates`; the completion service is not called.
    pub async fn recommend(
        &self,
        user: &UserIngredients,
        shortlist: &[ScoredRecipe],
    ) -> AppResult<Vec<RecommendedRecipe>> {
        if shortlist.is_empty() {
            return Err(AppError::NoCandidates);
        }

        let outcome = self.select(user, shortlist).await;
        let recommendations = ShortlistFallback::apply(outcome, shortlist, user)?;

        tracing::info!(
            count = recommendations.len(),
            source = %recommendations
                .first()
                .map(|r| r.source)
                .unwrap_or(RecommendationSource::Fallback),
            "Recommendations selected"
        );

        Ok(recommendations)
    }

    /// Strict selection: every problem with the reply surfaces as an error
    pub async fn select(
        &self,
        user: &UserIngredients,
        shortlist: &[ScoredRecipe],
    ) -> AppResult<Vec<RecommendedRecipe>> {
        let summaries = summarize_candidates(shortlist, user);
        let request = build_prompt(user, &summaries)?;

        tracing::debug!(
            candidates = summaries.len(),
            provider = self.completion.name(),
            "Requesting completion"
        );

        let reply = self.completion.complete(&request).await?;
        let reply = parse_reply(&reply)?;
        let entries = validate_reply(reply, shortlist)?;

        self.resolve(entries, user).await
    }

    /// Loads the full records for the chosen ids concurrently, keeping reply order
    async fn resolve(
        &self,
        entries: Vec<ReplyEntry>,
        user: &UserIngredients,
    ) -> AppResult<Vec<RecommendedRecipe>> {
        let tasks: Vec<_> = entries
            .iter()
            .map(|entry| {
                let store = Arc::clone(&self.recipes);
                let id = entry.id.clone();
                tokio::spawn(async move { store.get_recipe(&id).await })
            })
            .collect();

        let mut resolved = Vec::with_capacity(entries.len());

        for (entry, task) in entries.into_iter().zip(tasks) {
            match task.await {
                Ok(Ok(Some(recipe))) => resolved.push(RecommendedRecipe {
                    recipe,
                    reason: entry.reason,
                    preference_tag: user.preference_tag.clone(),
                    source: RecommendationSource::Model,
                }),
                Ok(Ok(None)) => {
                    tracing::warn!(recipe_id = %entry.id, "Recommended recipe not found in store");
                }
                Ok(Err(e)) => {
                    tracing::warn!(recipe_id = %entry.id, error = %e, "Recipe lookup failed");
                }
                Err(e) => {
                    tracing::error!(recipe_id = %entry.id, error = %e, "Recipe lookup task failed");
                }
            }
        }

        if resolved.len() < RECOMMENDATION_COUNT {
            return Err(AppError::InsufficientRecommendations(format!(
                "Only {} of {} recommended recipes could be loaded",
                resolved.len(),
                RECOMMENDATION_COUNT
            )));
        }

        Ok(resolved)
    }
}
