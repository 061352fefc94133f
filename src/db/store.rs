use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use crate::db::actor::{self, DbActorHandle};
use crate::db::models::{CascadeReport, Character, Episode, Project};
use crate::error::StoreError;

/// Long-lived handle to the local comic database.
///
/// Cheap to clone. The backing actor is spawned on the first call to
/// [`Store::initialize`] (or any operation) and shared by every clone.
#[derive(Clone)]
pub struct Store {
    database_url: Arc<str>,
    handle: Arc<OnceCell<DbActorHandle>>,
}

impl Store {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: Arc::from(database_url.into()),
            handle: Arc::new(OnceCell::new()),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Open (creating and upgrading as needed) the database.
    ///
    /// Idempotent: concurrent and repeated calls share one actor.
    pub async fn initialize(&self) -> Result<&DbActorHandle, StoreError> {
        self.handle
            .get_or_try_init(|| async {
                let handle = actor::spawn(&self.database_url).await?;
                info!(database_url = %self.database_url, "Store opened");
                Ok::<_, StoreError>(handle)
            })
            .await
    }

    pub async fn get_all_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.initialize().await?.get_all_projects().await
    }

    pub async fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        self.initialize().await?.get_project(id).await
    }

    /// Upsert by id with full replace. Callers set `updated_at`.
    pub async fn save_project(&self, project: Project) -> Result<(), StoreError> {
        self.initialize().await?.save_project(project).await
    }

    /// Delete a project together with its characters and episodes, atomically.
    pub async fn delete_project(&self, id: &str) -> Result<CascadeReport, StoreError> {
        self.initialize().await?.delete_project(id).await
    }

    /// Set `updated_at` to now. Returns `false` when the project is missing.
    pub async fn touch_project(&self, id: &str) -> Result<bool, StoreError> {
        self.initialize().await?.touch_project(id).await
    }

    pub async fn get_characters_by_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<Character>, StoreError> {
        self.initialize()
            .await?
            .get_characters_by_project(project_id)
            .await
    }

    pub async fn get_character(&self, id: &str) -> Result<Option<Character>, StoreError> {
        self.initialize().await?.get_character(id).await
    }

    pub async fn save_character(&self, character: Character) -> Result<(), StoreError> {
        self.initialize().await?.save_character(character).await
    }

    /// Single-record delete; episodes keep their (now dangling) references.
    pub async fn delete_character(&self, id: &str) -> Result<(), StoreError> {
        self.initialize().await?.delete_character(id).await
    }

    /// Episodes of a project sorted ascending by episode number.
    pub async fn get_episodes_by_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<Episode>, StoreError> {
        self.initialize()
            .await?
            .get_episodes_by_project(project_id)
            .await
    }

    pub async fn get_episode(&self, id: &str) -> Result<Option<Episode>, StoreError> {
        self.initialize().await?.get_episode(id).await
    }

    pub async fn save_episode(&self, episode: Episode) -> Result<(), StoreError> {
        self.initialize().await?.save_episode(episode).await
    }

    pub async fn delete_episode(&self, id: &str) -> Result<(), StoreError> {
        self.initialize().await?.delete_episode(id).await
    }

    /// Highest episode number in the project plus one; 1 when it has none.
    pub async fn next_episode_number(&self, project_id: &str) -> Result<u32, StoreError> {
        self.initialize()
            .await?
            .next_episode_number(project_id)
            .await
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.initialize().await?.get_setting(key).await
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.initialize().await?.set_setting(key, value).await
    }
}
