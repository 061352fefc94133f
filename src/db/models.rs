use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A story world: the root record owning characters and episodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Story premise.
    pub description: String,
    /// Art style label, usually one of [`crate::types::ArtStyle`]'s labels.
    pub art_style: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        art_style: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_record_id(),
            name: name.into(),
            description: description.into(),
            art_style: art_style.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    pub project_id: String,
    pub name: String,
    /// Visual appearance.
    pub description: String,
    /// Remote URL or `data:` URL of the reference sheet.
    pub image_preview_url: String,
    /// Self-reference pronoun used in dialogue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_person: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Character {
    pub fn new(
        project_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        image_preview_url: impl Into<String>,
    ) -> Self {
        Self {
            id: new_record_id(),
            project_id: project_id.into(),
            name: name.into(),
            description: description.into(),
            image_preview_url: image_preview_url.into(),
            first_person: None,
            personality: None,
            created_at: Utc::now(),
        }
    }
}

/// One four-panel comic within a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub project_id: String,
    /// Not unique-enforced; callers pick it (see `next_episode_number`).
    pub episode_number: u32,
    pub title: String,
    /// Panel descriptions, top to bottom.
    #[sqlx(json)]
    pub plot: Vec<String>,
    /// Referenced characters; entries may dangle after a character delete.
    #[sqlx(json)]
    pub character_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comic_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Episode {
    pub fn new(
        project_id: impl Into<String>,
        episode_number: u32,
        title: impl Into<String>,
        plot: Vec<String>,
        character_ids: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_record_id(),
            project_id: project_id.into(),
            episode_number,
            title: title.into(),
            plot,
            character_ids,
            comic_image_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of a cascading project delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub project_removed: bool,
    pub characters_removed: u64,
    pub episodes_removed: u64,
}

pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}
