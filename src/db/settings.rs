//! Well-known keys of the settings collection.

use crate::db::Store;
use crate::error::StoreError;

/// Gemini API key used by the generation client.
pub const GEMINI_API_KEY: &str = "gemini_api_key";
/// Model id for plot and character-profile generation.
pub const TEXT_MODEL: &str = "text_model";
/// Model id for character sheets and comic pages.
pub const IMAGE_MODEL: &str = "image_model";

pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";

/// Model choice as stored by the user, with defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPreferences {
    pub text_model: String,
    pub image_model: String,
}

impl Default for ModelPreferences {
    fn default() -> Self {
        Self {
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }
}

impl ModelPreferences {
    /// Blank stored values count as unset.
    pub async fn load(store: &Store) -> Result<Self, StoreError> {
        let defaults = Self::default();
        Ok(Self {
            text_model: non_blank(store.get_setting(TEXT_MODEL).await?)
                .unwrap_or(defaults.text_model),
            image_model: non_blank(store.get_setting(IMAGE_MODEL).await?)
                .unwrap_or(defaults.image_model),
        })
    }

    pub async fn save(&self, store: &Store) -> Result<(), StoreError> {
        store.set_setting(TEXT_MODEL, &self.text_model).await?;
        store.set_setting(IMAGE_MODEL, &self.image_model).await
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
