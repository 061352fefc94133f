use chrono::Utc;
use tracing::{debug, info};

use crate::db::{Character, Episode, Project, Store};
use crate::error::WorkflowError;
use crate::generation::{
    CharacterBrief, ComicCharacter, ComicRequest, Generator, PANEL_COUNT, ProjectInfo,
    StoryContext,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    /// Choosing topic and cast.
    Topic,
    /// Reviewing the generated plot.
    Plot,
    /// Drawing reference sheets for new characters.
    CharacterImages,
    /// Drawing the comic page.
    Comic,
    /// The episode is stored; edits save immediately.
    Committed,
}

/// A character appearing in the episode being built.
#[derive(Debug, Clone, PartialEq)]
pub enum CastMember {
    /// Already stored under the project.
    Existing(Character),
    /// Proposed by the plot generator, not stored yet.
    Draft(Character),
}

impl CastMember {
    pub fn character(&self) -> &Character {
        match self {
            CastMember::Existing(c) | CastMember::Draft(c) => c,
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, CastMember::Draft(_))
    }
}

/// Headless episode-creation wizard.
///
/// Every step that produces something the user accepts writes it through
/// the [`Store`]; nothing is kept outside the database once committed.
pub struct EpisodeWorkflow {
    store: Store,
    project: Project,
    project_characters: Vec<Character>,
    step: WorkflowStep,

    topic: String,
    selected_character_ids: Vec<String>,
    max_new_characters: usize,

    title: String,
    panels: Vec<String>,
    cast: Vec<CastMember>,
    comic_image_url: Option<String>,
    episode: Option<Episode>,
}

impl EpisodeWorkflow {
    /// Begin a new episode for `project_id`.
    pub async fn start(store: Store, project_id: &str) -> Result<Self, WorkflowError> {
        let project = store
            .get_project(project_id)
            .await?
            .ok_or_else(|| WorkflowError::ProjectNotFound(project_id.to_string()))?;
        let project_characters = store.get_characters_by_project(project_id).await?;

        Ok(Self {
            store,
            project,
            project_characters,
            step: WorkflowStep::Topic,
            topic: String::new(),
            selected_character_ids: Vec::new(),
            max_new_characters: 0,
            title: String::new(),
            panels: vec![String::new(); PANEL_COUNT],
            cast: Vec::new(),
            comic_image_url: None,
            episode: None,
        })
    }

    /// Reopen a stored episode. Characters deleted since are left out of the cast.
    pub async fn resume(store: Store, episode_id: &str) -> Result<Self, WorkflowError> {
        let episode = store
            .get_episode(episode_id)
            .await?
            .ok_or_else(|| WorkflowError::EpisodeNotFound(episode_id.to_string()))?;
        let mut workflow = Self::start(store, &episode.project_id).await?;

        for id in &episode.character_ids {
            match workflow.store.get_character(id).await? {
                Some(c) => workflow.cast.push(CastMember::Existing(c)),
                None => debug!(character_id = %id, "Skipping deleted character"),
            }
        }
        workflow.title.clone_from(&episode.title);
        workflow.panels.clone_from(&episode.plot);
        workflow.comic_image_url.clone_from(&episode.comic_image_url);
        workflow.episode = Some(episode);
        workflow.step = WorkflowStep::Committed;
        Ok(workflow)
    }

    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn project_characters(&self) -> &[Character] {
        &self.project_characters
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn panels(&self) -> &[String] {
        &self.panels
    }

    pub fn cast(&self) -> &[CastMember] {
        &self.cast
    }

    pub fn comic_image_url(&self) -> Option<&str> {
        self.comic_image_url.as_deref()
    }

    /// The stored episode, once committed or resumed.
    pub fn episode(&self) -> Option<&Episode> {
        self.episode.as_ref()
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) -> Result<(), WorkflowError> {
        self.expect_step(&[WorkflowStep::Topic])?;
        self.topic = topic.into();
        Ok(())
    }

    /// Restrict the plot to these project characters; empty means all of them.
    pub fn select_characters(&mut self, ids: &[String]) -> Result<(), WorkflowError> {
        self.expect_step(&[WorkflowStep::Topic])?;
        if let Some(unknown) = ids.iter().find(|id| self.find_project_character(id).is_none()) {
            return Err(WorkflowError::UnknownCharacter(unknown.clone()));
        }
        self.selected_character_ids = ids.to_vec();
        Ok(())
    }

    /// Let the plot introduce up to `max` new characters; 0 disables.
    pub fn allow_new_characters(&mut self, max: usize) -> Result<(), WorkflowError> {
        self.expect_step(&[WorkflowStep::Topic])?;
        self.max_new_characters = max;
        Ok(())
    }

    /// Generate (or regenerate) title, panels and cast.
    pub async fn generate_plot(&mut self, generator: &dyn Generator) -> Result<(), WorkflowError> {
        self.expect_step(&[WorkflowStep::Topic, WorkflowStep::Plot])?;
        if self.topic.trim().is_empty() {
            return Err(WorkflowError::EmptyTopic);
        }

        let context = StoryContext {
            project_description: self.project.description.clone(),
            art_style: self.project.art_style.clone(),
            existing_characters: self
                .available_characters()
                .map(CharacterBrief::from)
                .collect(),
            allow_new_characters: self.max_new_characters > 0,
            max_new_characters: self.max_new_characters,
        };
        let story = generator
            .generate_episode_story(&self.topic, &context)
            .await?;

        let mut cast = Vec::new();
        for definition in story.characters {
            if let Some(existing) = self
                .project_characters
                .iter()
                .find(|c| c.name == definition.name)
            {
                if !cast
                    .iter()
                    .any(|m: &CastMember| m.character().id == existing.id)
                {
                    cast.push(CastMember::Existing(existing.clone()));
                }
                continue;
            }
            let mut draft =
                Character::new(&self.project.id, definition.name, definition.description, "");
            draft.first_person = definition.first_person;
            draft.personality = definition.personality;
            cast.push(CastMember::Draft(draft));
        }

        info!(
            project_id = %self.project.id,
            title = %story.title,
            cast = cast.len(),
            drafts = cast.iter().filter(|m| m.is_draft()).count(),
            "Plot generated"
        );
        self.title = story.title;
        self.panels = story.panels;
        self.cast = cast;
        self.step = WorkflowStep::Plot;
        Ok(())
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<(), WorkflowError> {
        self.expect_step(&[WorkflowStep::Plot])?;
        self.title = title.into();
        Ok(())
    }

    pub fn set_panel(&mut self, index: usize, text: impl Into<String>) -> Result<(), WorkflowError> {
        self.expect_step(&[WorkflowStep::Plot])?;
        let panel = self
            .panels
            .get_mut(index)
            .ok_or(WorkflowError::PanelIndex(index))?;
        *panel = text.into();
        Ok(())
    }

    pub fn confirm_plot(&mut self) -> Result<(), WorkflowError> {
        self.expect_step(&[WorkflowStep::Plot])?;
        self.step = WorkflowStep::CharacterImages;
        Ok(())
    }

    /// Draw the reference sheet for the draft at `index`.
    pub async fn generate_character_image(
        &mut self,
        generator: &dyn Generator,
        index: usize,
    ) -> Result<(), WorkflowError> {
        self.expect_step(&[WorkflowStep::CharacterImages])?;
        let brief = CharacterBrief::from(self.draft_mut(index)?.character());

        let project = ProjectInfo {
            art_style: self.project.art_style.clone(),
            description: Some(self.project.description.clone()),
            existing_characters: self
                .project_characters
                .iter()
                .map(CharacterBrief::from)
                .collect(),
        };
        let image = generator
            .generate_character_image(&brief, &project, &[])
            .await?;

        if let CastMember::Draft(draft) = self.draft_mut(index)? {
            draft.image_preview_url = image;
        }
        Ok(())
    }

    /// Use a user-supplied image for the draft at `index`.
    pub fn set_character_image(
        &mut self,
        index: usize,
        image_url: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        self.expect_step(&[WorkflowStep::CharacterImages])?;
        if let CastMember::Draft(draft) = self.draft_mut(index)? {
            draft.image_preview_url = image_url.into();
        }
        Ok(())
    }

    /// Cast an existing project character in the draft's role.
    pub fn assign_existing_character(
        &mut self,
        index: usize,
        character_id: &str,
    ) -> Result<(), WorkflowError> {
        self.expect_step(&[WorkflowStep::CharacterImages])?;
        let existing = self
            .find_project_character(character_id)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownCharacter(character_id.to_string()))?;
        *self.draft_mut(index)? = CastMember::Existing(existing);
        Ok(())
    }

    /// Store every draft that has an image and move on to the comic.
    ///
    /// Drafts without an image stay unsaved; their ids still end up in the
    /// episode's `character_ids`. Returns the number of characters saved.
    pub async fn proceed_to_comic(&mut self) -> Result<usize, WorkflowError> {
        self.expect_step(&[WorkflowStep::CharacterImages])?;

        let mut saved = 0;
        for member in &mut self.cast {
            let draft = match member {
                CastMember::Draft(draft) if !draft.image_preview_url.is_empty() => draft.clone(),
                _ => continue,
            };
            self.store.save_character(draft.clone()).await?;
            self.project_characters.push(draft.clone());
            *member = CastMember::Existing(draft);
            saved += 1;
        }

        info!(project_id = %self.project.id, saved, "Episode characters stored");
        self.step = WorkflowStep::Comic;
        Ok(saved)
    }

    /// Draw the page. Once committed, the new image is saved right away.
    pub async fn generate_comic(&mut self, generator: &dyn Generator) -> Result<(), WorkflowError> {
        self.expect_step(&[WorkflowStep::Comic, WorkflowStep::Committed])?;

        let request = ComicRequest {
            topic: format!("{} (Style: {})", self.topic, self.project.art_style),
            title: self.title.clone(),
            panels: self.panels.clone(),
            characters: self
                .cast
                .iter()
                .map(|m| {
                    let c = m.character();
                    ComicCharacter {
                        name: c.name.clone(),
                        description: c.description.clone(),
                        image_preview_url: Some(c.image_preview_url.clone())
                            .filter(|url| !url.is_empty()),
                    }
                })
                .collect(),
        };
        let image = generator.generate_full_comic(&request).await?;
        self.comic_image_url = Some(image);

        if self.step == WorkflowStep::Committed {
            self.save_episode().await?;
        }
        Ok(())
    }

    /// Redraw the page following `instructions`.
    ///
    /// Once committed only the stored `comic_image_url` is replaced.
    pub async fn edit_comic(
        &mut self,
        generator: &dyn Generator,
        instructions: &str,
    ) -> Result<(), WorkflowError> {
        self.expect_step(&[WorkflowStep::Comic, WorkflowStep::Committed])?;
        let existing = self
            .comic_image_url
            .as_deref()
            .ok_or(WorkflowError::MissingComic)?;

        let references: Vec<String> = self
            .cast
            .iter()
            .map(|m| m.character().image_preview_url.clone())
            .filter(|url| !url.is_empty())
            .collect();
        let image = generator
            .edit_comic_image(existing, instructions.trim(), &references)
            .await?;
        self.comic_image_url = Some(image.clone());

        if self.step == WorkflowStep::Committed {
            self.patch_episode(|episode| episode.comic_image_url = Some(image))
                .await?;
        }
        Ok(())
    }

    /// Store the episode and bump the project's `updated_at`.
    ///
    /// New episodes take the next free episode number of the project.
    pub async fn commit(&mut self) -> Result<&Episode, WorkflowError> {
        self.expect_step(&[WorkflowStep::Comic])?;
        if self.comic_image_url.is_none() {
            return Err(WorkflowError::MissingComic);
        }
        self.save_episode().await?;
        self.step = WorkflowStep::Committed;
        self.episode.as_ref().ok_or(WorkflowError::MissingComic)
    }

    /// Renumber the stored episode. Episode numbers start at 1.
    pub async fn set_episode_number(&mut self, episode_number: u32) -> Result<(), WorkflowError> {
        self.expect_step(&[WorkflowStep::Committed])?;
        if episode_number == 0 {
            return Err(WorkflowError::InvalidEpisodeNumber(episode_number));
        }
        self.patch_episode(|episode| episode.episode_number = episode_number)
            .await
    }

    /// Delete the stored episode. Characters stay with the project.
    pub async fn delete_episode(self) -> Result<(), WorkflowError> {
        self.expect_step(&[WorkflowStep::Committed])?;
        if let Some(episode) = &self.episode {
            self.store.delete_episode(&episode.id).await?;
            info!(episode_id = %episode.id, "Episode deleted");
        }
        Ok(())
    }

    async fn save_episode(&mut self) -> Result<(), WorkflowError> {
        let character_ids: Vec<String> = self
            .cast
            .iter()
            .map(|m| m.character().id.clone())
            .collect();

        let episode = match self.episode.take() {
            Some(mut episode) => {
                episode.title.clone_from(&self.title);
                episode.plot.clone_from(&self.panels);
                episode.character_ids = character_ids;
                episode.comic_image_url.clone_from(&self.comic_image_url);
                episode.updated_at = Utc::now();
                episode
            }
            None => {
                let number = self.store.next_episode_number(&self.project.id).await?;
                let mut episode = Episode::new(
                    &self.project.id,
                    number,
                    &self.title,
                    self.panels.clone(),
                    character_ids,
                );
                episode.comic_image_url.clone_from(&self.comic_image_url);
                episode
            }
        };

        self.store.save_episode(episode.clone()).await?;
        self.store.touch_project(&self.project.id).await?;
        info!(
            episode_id = %episode.id,
            episode_number = episode.episode_number,
            "Episode saved"
        );
        self.episode = Some(episode);
        Ok(())
    }

    /// Change one field of the stored episode and bump its `updated_at`.
    ///
    /// Other fields, including dangling `character_ids`, stay as stored.
    async fn patch_episode(
        &mut self,
        apply: impl FnOnce(&mut Episode),
    ) -> Result<(), WorkflowError> {
        let Some(episode) = self.episode.as_mut() else {
            return Ok(());
        };
        apply(episode);
        episode.updated_at = Utc::now();

        self.store.save_episode(episode.clone()).await?;
        debug!(
            episode_id = %episode.id,
            episode_number = episode.episode_number,
            "Episode patched"
        );
        Ok(())
    }

    fn available_characters(&self) -> impl Iterator<Item = &Character> {
        self.project_characters.iter().filter(|c| {
            self.selected_character_ids.is_empty() || self.selected_character_ids.contains(&c.id)
        })
    }

    fn find_project_character(&self, id: &str) -> Option<&Character> {
        self.project_characters.iter().find(|c| c.id == id)
    }

    fn draft_mut(&mut self, index: usize) -> Result<&mut CastMember, WorkflowError> {
        match self.cast.get_mut(index) {
            Some(member) if member.is_draft() => Ok(member),
            _ => Err(WorkflowError::CharacterIndex(index)),
        }
    }

    fn expect_step(&self, allowed: &[WorkflowStep]) -> Result<(), WorkflowError> {
        if allowed.contains(&self.step) {
            return Ok(());
        }
        Err(WorkflowError::InvalidStep {
            expected: allowed[0],
            actual: self.step,
        })
    }
}
