use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::{
    db::IngredientStore,
    error::{AppError, AppResult},
    models::{LabelAnnotation, UserIngredients},
    services::providers::LabelDetector,
};

/// Minimum label confidence considered when translating a detection
pub const LABEL_SCORE_THRESHOLD: f32 = 0.7;

/// Translation table from detected (English) labels to canonical ingredient names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngredientMap {
    entries: HashMap<String, String>,
}

impl IngredientMap {
    /// Builds the table; keys are trimmed and lower-cased
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(label, canonical)| (label.trim().to_lowercase(), canonical))
                .collect(),
        }
    }

    pub fn translate(&self, label: &str) -> Option<&str> {
        self.entries
            .get(&label.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Picks the canonical ingredient for a set of detected labels
///
/// Only labels above [`LABEL_SCORE_THRESHOLD`] that exist in the table are candidates; the
/// most confident one wins, and on equal confidence the label listed first.
pub fn select_canonical(labels: &[LabelAnnotation], map: &IngredientMap) -> AppResult<String> {
    labels
        .iter()
        .filter(|label| label.score > LABEL_SCORE_THRESHOLD)
        .filter_map(|label| map.translate(&label.description).map(|name| (label, name)))
        // min_by keeps the first of equal elements, max_by the last
        .min_by(|(a, _), (b, _)| b.score.total_cmp(&a.score))
        .map(|(_, name)| name.to_string())
        .ok_or_else(|| {
            let seen: Vec<&str> = labels.iter().map(|l| l.description.as_str()).collect();
            AppError::UnmappedLabel(format!("No mapped ingredient among labels {:?}", seen))
        })
}

/// Owns the translation table and mediates every change to a user's ingredient set
pub struct IngredientRegistry {
    map: IngredientMap,
    store: Arc<dyn IngredientStore>,
    detector: Arc<dyn LabelDetector>,
    detection_timeout: Duration,
}

impl IngredientRegistry {
    pub fn new(
        map: IngredientMap,
        store: Arc<dyn IngredientStore>,
        detector: Arc<dyn LabelDetector>,
        detection_timeout: Duration,
    ) -> Self {
        Self {
            map,
            store,
            detector,
            detection_timeout,
        }
    }

    /// Loads the translation table from the store and builds the registry
    pub async fn load(
        store: Arc<dyn IngredientStore>,
        detector: Arc<dyn LabelDetector>,
        detection_timeout: Duration,
    ) -> AppResult<Self> {
        let map = IngredientMap::new(store.load_ingredient_map().await?);

        if map.is_empty() {
            tracing::warn!("Ingredient translation table is empty; every detection will be unmapped");
        } else {
            tracing::info!(entries = map.len(), "Ingredient translation table loaded");
        }

        Ok(Self::new(map, store, detector, detection_timeout))
    }

    pub fn map(&self) -> &IngredientMap {
        &self.map
    }

    /// Detects the ingredient in a photo, translates it and saves it against the user
    ///
    /// The whole flow is bounded by the configured detection timeout.
    pub async fn detect_and_save(&self, user_id: &str, image: &[u8]) -> AppResult<String> {
        let flow = async {
            let labels = self.detector.detect_labels(image).await?;
            let canonical = select_canonical(&labels, &self.map)?;
            self.save_ingredients(user_id, &[canonical.clone()]).await?;
            Ok::<_, AppError>(canonical)
        };

        let canonical = tokio::time::timeout(self.detection_timeout, flow)
            .await
            .map_err(|_| {
                AppError::Timeout(format!(
                    "Ingredient detection exceeded {:?}",
                    self.detection_timeout
                ))
            })??;

        tracing::info!(
            user_id = %user_id,
            ingredient = %canonical,
            detector = self.detector.name(),
            "Ingredient detected and saved"
        );

        Ok(canonical)
    }

    /// Unions canonical names into the user's owned set
    pub async fn save_ingredients(
        &self,
        user_id: &str,
        names: &[String],
    ) -> AppResult<UserIngredients> {
        let mut deduped = UserIngredients::default();
        deduped.add_owned(names.iter().cloned());

        if deduped.owned.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one ingredient name is required".to_string(),
            ));
        }

        self.store.add_owned_ingredients(user_id, &deduped.owned).await
    }

    /// The user's ingredient context, empty when nothing was ever saved
    pub async fn get_user_ingredients(&self, user_id: &str) -> AppResult<UserIngredients> {
        Ok(self
            .store
            .get_user_ingredients(user_id)
            .await?
            .unwrap_or_default())
    }
}
