//! Versioned SQLite DDL.
//!
//! The applied version lives in `PRAGMA user_version`. Each migration only
//! creates what is missing, so upgrading never touches existing rows.

/// Newest schema version this crate understands.
pub const SCHEMA_VERSION: i64 = 2;

pub struct Migration {
    pub version: i64,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: SQLITE_V1,
    },
    Migration {
        version: 2,
        sql: SQLITE_V2,
    },
];

/// Version 1:
/// - `projects` keyed by `id`
/// - `characters` keyed by `id`, non-unique index on `project_id`
/// - `episodes` keyed by `id`, non-unique index on `project_id`
pub const SQLITE_V1: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    art_style TEXT NOT NULL,
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL  -- RFC3339
);

CREATE TABLE IF NOT EXISTS characters (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    image_preview_url TEXT NOT NULL,
    first_person TEXT NULL,
    personality TEXT NULL,
    created_at TEXT NOT NULL  -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_characters_project_id ON characters(project_id);

CREATE TABLE IF NOT EXISTS episodes (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    episode_number INTEGER NOT NULL,
    title TEXT NOT NULL,
    plot TEXT NOT NULL,          -- JSON array of panel strings
    character_ids TEXT NOT NULL, -- JSON array of character ids
    comic_image_url TEXT NULL,
    created_at TEXT NOT NULL,    -- RFC3339
    updated_at TEXT NOT NULL     -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_episodes_project_id ON episodes(project_id);
"#;

/// Version 2 adds the flat key/value `settings` table.
pub const SQLITE_V2: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
"#;

/// Split a migration script into executable statements.
pub(crate) fn statements(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(';').map(str::trim).filter(|s| !s.is_empty())
}
