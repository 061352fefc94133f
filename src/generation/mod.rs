//! Calls to the Gemini API producing plots, character sheets, and comic pages.
//!
//! Images come back as `data:` URLs, which is also what the store keeps in
//! `image_preview_url` and `comic_image_url`.

mod client;
pub mod media;
pub mod prompts;
pub mod story;

use async_trait::async_trait;

pub use client::GenerationClient;
pub use prompts::{ComicCharacter, ComicRequest, ProjectInfo};
pub use story::{CharacterBrief, CharacterProfile, PANEL_COUNT, Story, StoryContext};

use crate::error::GenerationError;

/// The generation operations the episode workflow depends on.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate_episode_story(
        &self,
        topic: &str,
        context: &StoryContext,
    ) -> Result<Story, GenerationError>;

    /// Character reference sheet as a `data:` URL.
    async fn generate_character_image(
        &self,
        character: &CharacterBrief,
        project: &ProjectInfo,
        reference_images: &[String],
    ) -> Result<String, GenerationError>;

    /// Full four-panel page as a `data:` URL.
    async fn generate_full_comic(&self, request: &ComicRequest) -> Result<String, GenerationError>;

    async fn edit_comic_image(
        &self,
        existing_image: &str,
        instructions: &str,
        character_images: &[String],
    ) -> Result<String, GenerationError>;
}
