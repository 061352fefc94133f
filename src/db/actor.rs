use crate::db::models::{CascadeReport, Character, Episode, Project};
use crate::db::schema::{MIGRATIONS, SCHEMA_VERSION, statements};
use crate::error::StoreError;
use chrono::Utc;
use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::types::Json;
use std::{str::FromStr, time::Duration};
use tracing::{debug, info};

type Reply<T> = RpcReplyPort<Result<T, StoreError>>;

#[derive(Debug)]
pub enum DbActorMessage {
    ListProjects(Reply<Vec<Project>>),
    GetProject(String, Reply<Option<Project>>),
    SaveProject(Project, Reply<()>),
    /// Remove a project with its characters and episodes in one transaction.
    DeleteProject(String, Reply<CascadeReport>),
    /// Bump `updated_at` to now; replies whether the project exists.
    TouchProject(String, Reply<bool>),

    ListCharactersByProject(String, Reply<Vec<Character>>),
    GetCharacter(String, Reply<Option<Character>>),
    SaveCharacter(Character, Reply<()>),
    DeleteCharacter(String, Reply<()>),

    /// Episodes of a project, ascending by episode number.
    ListEpisodesByProject(String, Reply<Vec<Episode>>),
    GetEpisode(String, Reply<Option<Episode>>),
    SaveEpisode(Episode, Reply<()>),
    DeleteEpisode(String, Reply<()>),
    NextEpisodeNumber(String, Reply<u32>),

    GetSetting(String, Reply<Option<String>>),
    SetSetting(String, String, Reply<()>),
}

#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

macro_rules! rpc {
    ($actor:expr, $name:literal, $msg:expr $(, $arg:expr)*) => {
        ractor::call!($actor, $msg $(, $arg)*).map_err(|e| {
            StoreError::RactorError(format!(concat!("DbActor ", $name, " RPC failed: {}"), e))
        })?
    };
}

impl DbActorHandle {
    pub fn actor_id(&self) -> ActorId {
        self.actor.get_id()
    }

    pub async fn get_all_projects(&self) -> Result<Vec<Project>, StoreError> {
        rpc!(self.actor, "ListProjects", DbActorMessage::ListProjects)
    }

    pub async fn get_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        rpc!(self.actor, "GetProject", DbActorMessage::GetProject, id.to_string())
    }

    pub async fn save_project(&self, project: Project) -> Result<(), StoreError> {
        rpc!(self.actor, "SaveProject", DbActorMessage::SaveProject, project)
    }

    pub async fn delete_project(&self, id: &str) -> Result<CascadeReport, StoreError> {
        rpc!(self.actor, "DeleteProject", DbActorMessage::DeleteProject, id.to_string())
    }

    pub async fn touch_project(&self, id: &str) -> Result<bool, StoreError> {
        rpc!(self.actor, "TouchProject", DbActorMessage::TouchProject, id.to_string())
    }

    pub async fn get_characters_by_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<Character>, StoreError> {
        rpc!(
            self.actor,
            "ListCharactersByProject",
            DbActorMessage::ListCharactersByProject,
            project_id.to_string()
        )
    }

    pub async fn get_character(&self, id: &str) -> Result<Option<Character>, StoreError> {
        rpc!(self.actor, "GetCharacter", DbActorMessage::GetCharacter, id.to_string())
    }

    pub async fn save_character(&self, character: Character) -> Result<(), StoreError> {
        rpc!(self.actor, "SaveCharacter", DbActorMessage::SaveCharacter, character)
    }

    pub async fn delete_character(&self, id: &str) -> Result<(), StoreError> {
        rpc!(self.actor, "DeleteCharacter", DbActorMessage::DeleteCharacter, id.to_string())
    }

    pub async fn get_episodes_by_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<Episode>, StoreError> {
        rpc!(
            self.actor,
            "ListEpisodesByProject",
            DbActorMessage::ListEpisodesByProject,
            project_id.to_string()
        )
    }

    pub async fn get_episode(&self, id: &str) -> Result<Option<Episode>, StoreError> {
        rpc!(self.actor, "GetEpisode", DbActorMessage::GetEpisode, id.to_string())
    }

    pub async fn save_episode(&self, episode: Episode) -> Result<(), StoreError> {
        rpc!(self.actor, "SaveEpisode", DbActorMessage::SaveEpisode, episode)
    }

    pub async fn delete_episode(&self, id: &str) -> Result<(), StoreError> {
        rpc!(self.actor, "DeleteEpisode", DbActorMessage::DeleteEpisode, id.to_string())
    }

    pub async fn next_episode_number(&self, project_id: &str) -> Result<u32, StoreError> {
        rpc!(
            self.actor,
            "NextEpisodeNumber",
            DbActorMessage::NextEpisodeNumber,
            project_id.to_string()
        )
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        rpc!(self.actor, "GetSetting", DbActorMessage::GetSetting, key.to_string())
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        rpc!(
            self.actor,
            "SetSetting",
            DbActorMessage::SetSetting,
            key.to_string(),
            value.to_string()
        )
    }
}

struct DbActorState {
    pool: SqlitePool,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = String;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        database_url: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_opts = SqliteConnectOptions::from_str(database_url.as_str())
            .map_err(|e| ActorProcessingErr::from(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_opts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db connect failed: {e}")))?;

        apply_schema(&pool)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db schema init failed: {e}")))?;

        info!("DbActor initialized");
        Ok(DbActorState { pool })
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.pool.close().await;
        Ok(())
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let pool = &state.pool;
        match message {
            DbActorMessage::ListProjects(reply) => {
                let _ = reply.send(self.list_projects(pool).await);
            }
            DbActorMessage::GetProject(id, reply) => {
                let _ = reply.send(self.get_project(pool, &id).await);
            }
            DbActorMessage::SaveProject(project, reply) => {
                let _ = reply.send(self.save_project(pool, project).await);
            }
            DbActorMessage::DeleteProject(id, reply) => {
                let _ = reply.send(self.delete_project(pool, &id).await);
            }
            DbActorMessage::TouchProject(id, reply) => {
                let _ = reply.send(self.touch_project(pool, &id).await);
            }
            DbActorMessage::ListCharactersByProject(project_id, reply) => {
                let _ = reply.send(self.list_characters_by_project(pool, &project_id).await);
            }
            DbActorMessage::GetCharacter(id, reply) => {
                let _ = reply.send(self.get_character(pool, &id).await);
            }
            DbActorMessage::SaveCharacter(character, reply) => {
                let _ = reply.send(self.save_character(pool, character).await);
            }
            DbActorMessage::DeleteCharacter(id, reply) => {
                let _ = reply.send(delete_by_id(pool, "characters", &id).await);
            }
            DbActorMessage::ListEpisodesByProject(project_id, reply) => {
                let _ = reply.send(self.list_episodes_by_project(pool, &project_id).await);
            }
            DbActorMessage::GetEpisode(id, reply) => {
                let _ = reply.send(self.get_episode(pool, &id).await);
            }
            DbActorMessage::SaveEpisode(episode, reply) => {
                let _ = reply.send(self.save_episode(pool, episode).await);
            }
            DbActorMessage::DeleteEpisode(id, reply) => {
                let _ = reply.send(delete_by_id(pool, "episodes", &id).await);
            }
            DbActorMessage::NextEpisodeNumber(project_id, reply) => {
                let _ = reply.send(self.next_episode_number(pool, &project_id).await);
            }
            DbActorMessage::GetSetting(key, reply) => {
                let _ = reply.send(self.get_setting(pool, &key).await);
            }
            DbActorMessage::SetSetting(key, value, reply) => {
                let _ = reply.send(self.set_setting(pool, &key, &value).await);
            }
        }
        Ok(())
    }
}

impl DbActor {
    async fn list_projects(&self, pool: &SqlitePool) -> Result<Vec<Project>, StoreError> {
        sqlx::query_as::<_, Project>(
            r#"
        SELECT id, name, description, art_style, created_at, updated_at
        FROM projects
        "#,
        )
        .fetch_all(pool)
        .await
        .map_err(StoreError::StorageRead)
    }

    async fn get_project(
        &self,
        pool: &SqlitePool,
        id: &str,
    ) -> Result<Option<Project>, StoreError> {
        sqlx::query_as::<_, Project>(
            r#"
        SELECT id, name, description, art_style, created_at, updated_at
        FROM projects
        WHERE id = ?
        "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::StorageRead)
    }

    async fn save_project(&self, pool: &SqlitePool, project: Project) -> Result<(), StoreError> {
        sqlx::query(
            r#"
        INSERT INTO projects (id, name, description, art_style, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            description = excluded.description,
            art_style = excluded.art_style,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at
        "#,
        )
        .bind(project.id)
        .bind(project.name)
        .bind(project.description)
        .bind(project.art_style)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(pool)
        .await
        .map_err(StoreError::StorageWrite)?;

        Ok(())
    }

    async fn delete_project(
        &self,
        pool: &SqlitePool,
        id: &str,
    ) -> Result<CascadeReport, StoreError> {
        // Dropping `tx` on any error rolls back all three deletes.
        let mut tx = pool.begin().await.map_err(StoreError::StorageWrite)?;

        let characters_removed = sqlx::query("DELETE FROM characters WHERE project_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::StorageWrite)?
            .rows_affected();

        let episodes_removed = sqlx::query("DELETE FROM episodes WHERE project_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::StorageWrite)?
            .rows_affected();

        let project_removed = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::StorageWrite)?
            .rows_affected()
            > 0;

        tx.commit().await.map_err(StoreError::StorageWrite)?;

        info!(
            project_id = %id,
            project_removed,
            characters_removed,
            episodes_removed,
            "Project deleted with cascade"
        );
        Ok(CascadeReport {
            project_removed,
            characters_removed,
            episodes_removed,
        })
    }

    async fn touch_project(&self, pool: &SqlitePool, id: &str) -> Result<bool, StoreError> {
        let rows = sqlx::query("UPDATE projects SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await
            .map_err(StoreError::StorageWrite)?
            .rows_affected();

        Ok(rows > 0)
    }

    async fn list_characters_by_project(
        &self,
        pool: &SqlitePool,
        project_id: &str,
    ) -> Result<Vec<Character>, StoreError> {
        sqlx::query_as::<_, Character>(
            r#"
        SELECT id, project_id, name, description, image_preview_url, first_person, personality, created_at
        FROM characters
        WHERE project_id = ?
        "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
        .map_err(StoreError::StorageRead)
    }

    async fn get_character(
        &self,
        pool: &SqlitePool,
        id: &str,
    ) -> Result<Option<Character>, StoreError> {
        sqlx::query_as::<_, Character>(
            r#"
        SELECT id, project_id, name, description, image_preview_url, first_person, personality, created_at
        FROM characters
        WHERE id = ?
        "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::StorageRead)
    }

    async fn save_character(
        &self,
        pool: &SqlitePool,
        character: Character,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
        INSERT INTO characters (
            id, project_id, name, description, image_preview_url, first_person, personality, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            project_id = excluded.project_id,
            name = excluded.name,
            description = excluded.description,
            image_preview_url = excluded.image_preview_url,
            first_person = excluded.first_person,
            personality = excluded.personality,
            created_at = excluded.created_at
        "#,
        )
        .bind(character.id)
        .bind(character.project_id)
        .bind(character.name)
        .bind(character.description)
        .bind(character.image_preview_url)
        .bind(character.first_person)
        .bind(character.personality)
        .bind(character.created_at)
        .execute(pool)
        .await
        .map_err(StoreError::StorageWrite)?;

        Ok(())
    }

    async fn list_episodes_by_project(
        &self,
        pool: &SqlitePool,
        project_id: &str,
    ) -> Result<Vec<Episode>, StoreError> {
        sqlx::query_as::<_, Episode>(
            r#"
        SELECT id, project_id, episode_number, title, plot, character_ids, comic_image_url, created_at, updated_at
        FROM episodes
        WHERE project_id = ?
        ORDER BY episode_number ASC, rowid ASC
        "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
        .map_err(StoreError::StorageRead)
    }

    async fn get_episode(
        &self,
        pool: &SqlitePool,
        id: &str,
    ) -> Result<Option<Episode>, StoreError> {
        sqlx::query_as::<_, Episode>(
            r#"
        SELECT id, project_id, episode_number, title, plot, character_ids, comic_image_url, created_at, updated_at
        FROM episodes
        WHERE id = ?
        "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::StorageRead)
    }

    async fn save_episode(&self, pool: &SqlitePool, episode: Episode) -> Result<(), StoreError> {
        sqlx::query(
            r#"
        INSERT INTO episodes (
            id, project_id, episode_number, title, plot, character_ids, comic_image_url, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            project_id = excluded.project_id,
            episode_number = excluded.episode_number,
            title = excluded.title,
            plot = excluded.plot,
            character_ids = excluded.character_ids,
            comic_image_url = excluded.comic_image_url,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at
        "#,
        )
        .bind(episode.id)
        .bind(episode.project_id)
        .bind(episode.episode_number)
        .bind(episode.title)
        .bind(Json(episode.plot))
        .bind(Json(episode.character_ids))
        .bind(episode.comic_image_url)
        .bind(episode.created_at)
        .bind(episode.updated_at)
        .execute(pool)
        .await
        .map_err(StoreError::StorageWrite)?;

        Ok(())
    }

    async fn next_episode_number(
        &self,
        pool: &SqlitePool,
        project_id: &str,
    ) -> Result<u32, StoreError> {
        let highest: Option<i64> =
            sqlx::query_scalar("SELECT MAX(episode_number) FROM episodes WHERE project_id = ?")
                .bind(project_id)
                .fetch_one(pool)
                .await
                .map_err(StoreError::StorageRead)?;

        let highest = u32::try_from(highest.unwrap_or(0).max(0)).unwrap_or(u32::MAX);
        Ok(highest.saturating_add(1))
    }

    async fn get_setting(
        &self,
        pool: &SqlitePool,
        key: &str,
    ) -> Result<Option<String>, StoreError> {
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await
            .map_err(StoreError::StorageRead)
    }

    async fn set_setting(
        &self,
        pool: &SqlitePool,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await
        .map_err(StoreError::StorageWrite)?;

        Ok(())
    }
}

/// Single-record delete; deleting a missing id is not an error.
async fn delete_by_id(pool: &SqlitePool, table: &'static str, id: &str) -> Result<(), StoreError> {
    let sql = format!("DELETE FROM {table} WHERE id = ?");
    let rows = sqlx::query(&sql)
        .bind(id)
        .execute(pool)
        .await
        .map_err(StoreError::StorageWrite)?
        .rows_affected();

    debug!(table, id, rows, "Record deleted");
    Ok(())
}

/// Spawn the database actor and return a cloneable handle.
///
/// The actor is unnamed so several stores can live in one process.
pub async fn spawn(database_url: &str) -> Result<DbActorHandle, StoreError> {
    let (actor, _jh) = ractor::Actor::spawn(None, DbActor, database_url.to_string())
        .await
        .map_err(|e| StoreError::StorageUnavailable(format!("failed to start DbActor: {e}")))?;

    Ok(DbActorHandle { actor })
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    let current: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(StoreError::StorageRead)?;

    if current > SCHEMA_VERSION {
        return Err(StoreError::StorageUnavailable(format!(
            "database schema version {current} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let mut tx = pool.begin().await.map_err(StoreError::StorageWrite)?;
        for stmt in statements(migration.sql) {
            sqlx::query(stmt)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::StorageWrite)?;
        }
        // PRAGMA arguments cannot be bound.
        sqlx::query(&format!("PRAGMA user_version = {}", migration.version))
            .execute(&mut *tx)
            .await
            .map_err(StoreError::StorageWrite)?;
        tx.commit().await.map_err(StoreError::StorageWrite)?;

        info!(
            from = current,
            to = migration.version,
            "Schema migration applied"
        );
    }
    Ok(())
}
