use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything the recommendation pipeline knows about one user's pantry and tastes
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct UserIngredients {
    /// Canonical names of ingredients the user has
    pub owned: Vec<String>,
    #[serde(default)]
    pub disliked: Vec<String>,
    #[serde(default)]
    pub allergic: Vec<String>,
    /// Personality-style tag from the food quiz, if the user took it
    #[serde(default)]
    pub preference_tag: Option<String>,
    /// Last time the owned set changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserIngredients {
    /// Creates a context holding only owned ingredients
    pub fn with_owned(owned: Vec<String>) -> Self {
        Self {
            owned,
            ..Self::default()
        }
    }

    /// Owned ingredients trimmed and lower-cased for matching
    pub fn normalized_owned(&self) -> Vec<String> {
        normalize(&self.owned)
    }

    pub fn normalized_disliked(&self) -> Vec<String> {
        normalize(&self.disliked)
    }

    pub fn normalized_allergic(&self) -> Vec<String> {
        normalize(&self.allergic)
    }

    /// Unions new canonical names into the owned set, keeping first-seen order
    pub fn add_owned<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            if !self.owned.iter().any(|existing| existing == name) {
                self.owned.push(name.to_string());
            }
        }
    }

    pub fn has_owned(&self) -> bool {
        self.owned.iter().any(|name| !name.trim().is_empty())
    }
}

fn normalize(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}
