use std::fmt::Write as _;

use super::story::{CharacterBrief, PANEL_COUNT, StoryContext};
use crate::types::ArtStyle;

pub const STORY_SYSTEM_INSTRUCTION: &str = "You are a professional four-panel comic artist and \
writer. Your goal is to create funny, engaging, visually detailed four-panel comics.";

const JSON_ONLY: &str = "Output only the raw JSON object. Do not use markdown or code blocks.";

/// Aspect ratio of the finished comic page.
pub const COMIC_ASPECT_RATIO: &str = "9:16";

pub fn story_prompt(topic: &str, ctx: &StoryContext) -> String {
    let mut prompt = format!(
        "Project: \"{}\"\nArt style: {}\n\n",
        ctx.project_description, ctx.art_style
    );

    if !ctx.existing_characters.is_empty() {
        prompt.push_str("Existing characters:\n");
        for c in &ctx.existing_characters {
            let _ = writeln!(prompt, "{}: {}", c.name, c.description);
        }
        prompt.push('\n');
    }

    if ctx.allow_new_characters {
        let _ = writeln!(
            prompt,
            "You may create new characters if the story needs them (at most {}). \
             Use existing characters as they are.\n",
            ctx.max_new_characters.max(1)
        );
    } else {
        prompt.push_str(
            "Use only the existing characters. Do not create new characters.\n\n",
        );
    }

    let _ = write!(
        prompt,
        r#"Episode topic: "{topic}"

Write a {PANEL_COUNT}-panel comic story for this topic.

Step 1: define the characters. Keep existing characters unchanged. For new
characters describe appearance (hair, eyes, clothing, accessories), the
first-person pronoun they use, and personality.

Step 2: write the storyboard with a detailed visual description per panel.

Respond with a JSON object of this shape:
{{
  "title": "a catchy title",
  "characters": [
    {{"name": "...", "description": "...", "firstPerson": "...", "personality": "..."}}
  ],
  "panels": ["Panel 1: [scene] [dialogue]", "Panel 2: ...", "Panel 3: ...", "Panel 4: ..."]
}}
{JSON_ONLY}"#
    );
    prompt
}

pub fn character_profile_prompt(description: &str) -> String {
    format!(
        r#"Generate character details from this description:

{description}

Respond with a JSON object of this shape:
{{
  "name": "character name",
  "appearance": "detailed appearance (hairstyle, eye color, clothing, ...)",
  "firstPerson": "first-person pronoun",
  "personality": "short personality summary"
}}
{JSON_ONLY}"#
    )
}

/// Project details that shape a character sheet.
#[derive(Debug, Clone, Default)]
pub struct ProjectInfo {
    pub art_style: String,
    pub description: Option<String>,
    pub existing_characters: Vec<CharacterBrief>,
}

pub fn character_sheet_prompt(
    character: &CharacterBrief,
    project: &ProjectInfo,
    has_template: bool,
) -> String {
    let mut prompt = String::new();
    if has_template {
        prompt.push_str(
            "The first image is the character-sheet layout template. Reproduce its layout \
             exactly: name box at the top, full-body front view on the left, full-body back \
             view in the middle, and a 2x2 expression grid on the right (smiling, crying, \
             angry, surprised).\n\n",
        );
    } else {
        prompt.push_str(
            "Draw a character sheet: name box at the top, full-body front and back views, \
             and a 2x2 expression grid (smiling, crying, angry, surprised).\n\n",
        );
    }

    let _ = writeln!(
        prompt,
        "Art style: {}",
        ArtStyle::guidance_for(&project.art_style)
    );
    if let Some(description) = project.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(prompt, "World: {description}");
    }

    if !project.existing_characters.is_empty() {
        prompt.push_str("\nExisting characters in this project:\n");
        for c in &project.existing_characters {
            let _ = write!(prompt, "- {}: {}", c.name, c.description);
            if let Some(personality) = &c.personality {
                let _ = write!(prompt, ", personality: {personality}");
            }
            if let Some(first_person) = &c.first_person {
                let _ = write!(prompt, ", first person: {first_person}");
            }
            prompt.push('\n');
        }
        prompt.push_str(
            "If the new character is described relative to an existing one (a parent, a \
             sibling), design them consistently with that character.\n",
        );
    }

    let _ = write!(
        prompt,
        "\nNew character\nName: {}\nAppearance: {}\n\nPut \"{}\" in the name box and keep \
         the background neutral.",
        character.name, character.description, character.name
    );
    prompt
}

/// Everything needed to draw one comic page.
#[derive(Debug, Clone, Default)]
pub struct ComicRequest {
    pub topic: String,
    pub title: String,
    pub panels: Vec<String>,
    pub characters: Vec<ComicCharacter>,
}

#[derive(Debug, Clone, Default)]
pub struct ComicCharacter {
    pub name: String,
    pub description: String,
    /// Reference sheet; only `data:` image URLs are forwarded.
    pub image_preview_url: Option<String>,
}

pub fn comic_prompt(request: &ComicRequest, has_template: bool) -> String {
    let mut prompt = String::new();
    if has_template {
        prompt.push_str(
            "The first image is the layout template. Reproduce its title box and the \
             placement, size, and spacing of its four panels exactly.\n\n",
        );
    }
    let _ = write!(
        prompt,
        "Layout: one vertical column of four wide panels stacked top to bottom, \
         {COMIC_ASPECT_RATIO} overall. Not a 2x2 grid.\n\n\
         Topic: \"{}\"\nTitle: \"{}\" (place it inside the title box)\n\nCharacters:\n",
        request.topic, request.title
    );
    for c in &request.characters {
        let _ = writeln!(prompt, "{}: {}", c.name, c.description);
    }
    prompt.push_str("\nPlot:\n");
    for (i, panel) in request.panels.iter().enumerate() {
        let _ = writeln!(prompt, "Panel {}: {panel}", i + 1);
    }
    prompt.push_str(
        "\nStyle: high-quality, detailed manga. Reading order top to bottom.\n\
         Keep each character consistent with the provided reference sheets.\n\
         Include speech bubbles with dialogue. Draw sound effects as large lettering \
         outside the bubbles, never inside the dialogue text.",
    );
    prompt
}

pub fn edit_prompt(instructions: &str) -> String {
    format!(
        "The attached image is an existing four-panel comic.\n\nEdit instructions:\n\
         {instructions}\n\nApply the instructions while keeping the layout and overall \
         composition: a vertical page of four panels."
    )
}
