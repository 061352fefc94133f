use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::GenerationError;

/// Panels per episode.
pub const PANEL_COUNT: usize = 4;

/// A character as the prompts see it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterBrief {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_person: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
}

impl From<&crate::db::Character> for CharacterBrief {
    fn from(c: &crate::db::Character) -> Self {
        Self {
            name: c.name.clone(),
            description: c.description.clone(),
            first_person: c.first_person.clone(),
            personality: c.personality.clone(),
        }
    }
}

/// Project context for plot generation.
#[derive(Debug, Clone, Default)]
pub struct StoryContext {
    pub project_description: String,
    pub art_style: String,
    pub existing_characters: Vec<CharacterBrief>,
    pub allow_new_characters: bool,
    pub max_new_characters: usize,
}

/// Generated episode plot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    pub title: String,
    /// Always exactly [`PANEL_COUNT`] entries.
    pub panels: Vec<String>,
    pub characters: Vec<CharacterBrief>,
}

/// Character details expanded from a short description.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterProfile {
    pub name: String,
    pub appearance: String,
    #[serde(default)]
    pub first_person: String,
    #[serde(default)]
    pub personality: String,
}

#[derive(Deserialize)]
struct RawStory {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    panels: Vec<String>,
    #[serde(default)]
    characters: Vec<CharacterBrief>,
}

/// Models often wrap JSON in markdown fences despite being told not to.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Parse a plot response; never fails.
///
/// A missing title becomes the topic, the panel list is padded or cut to
/// four, and unparsable output degrades to placeholder panels.
pub fn parse_story(topic: &str, text: &str) -> Story {
    match serde_json::from_str::<RawStory>(strip_code_fences(text)) {
        Ok(raw) => {
            let title = raw
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| topic.to_string());
            let mut panels = raw.panels;
            panels.truncate(PANEL_COUNT);
            while panels.len() < PANEL_COUNT {
                panels.push(placeholder_panel(topic, panels.len()));
            }
            Story {
                title,
                panels,
                characters: raw.characters,
            }
        }
        Err(e) => {
            warn!(error = %e, "Story response was not valid JSON, using placeholder plot");
            fallback_story(topic)
        }
    }
}

pub fn fallback_story(topic: &str) -> Story {
    Story {
        title: topic.to_string(),
        panels: (0..PANEL_COUNT)
            .map(|i| placeholder_panel(topic, i))
            .collect(),
        characters: Vec::new(),
    }
}

pub fn parse_character_profile(text: &str) -> Result<CharacterProfile, GenerationError> {
    Ok(serde_json::from_str(strip_code_fences(text))?)
}

fn placeholder_panel(topic: &str, index: usize) -> String {
    format!("{topic} - panel {}", index + 1)
}
