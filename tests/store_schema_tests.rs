use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;
use tokio::fs;
use yonkoma::StoreError;
use yonkoma::db::schema::{MIGRATIONS, SCHEMA_VERSION};
use yonkoma::db::{Project, Store};

fn temp_db(tag: &str) -> (PathBuf, String) {
    let mut hasher = DefaultHasher::new();
    SystemTime::now().hash(&mut hasher);
    let db_path = std::env::temp_dir().join(format!("test_{tag}_{}.sqlite", hasher.finish()));
    let database_url = format!("sqlite:{}", db_path.to_str().unwrap());
    (db_path, database_url)
}

async fn remove_db(db_path: &Path) {
    let wal_path = PathBuf::from(format!("{}-wal", db_path.to_string_lossy()));
    let shm_path = PathBuf::from(format!("{}-shm", db_path.to_string_lossy()));
    let _ = fs::remove_file(&wal_path).await;
    let _ = fs::remove_file(&shm_path).await;
    fs::remove_file(db_path).await.unwrap();
}

async fn user_version(database_url: &str) -> i64 {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await
        .unwrap();
    let version = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    pool.close().await;
    version
}

#[tokio::test]
async fn test_fresh_database_gets_latest_schema() {
    let (db_path, database_url) = temp_db("schema_fresh");
    let store = Store::new(&database_url);
    store.initialize().await.unwrap();

    assert_eq!(user_version(&database_url).await, SCHEMA_VERSION);

    remove_db(&db_path).await;
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let (db_path, database_url) = temp_db("schema_idempotent");
    let store = Store::new(&database_url);

    let first = store.initialize().await.unwrap().actor_id();
    let second = store.initialize().await.unwrap().actor_id();
    assert_eq!(first, second, "initialize() must reuse the open handle");

    // Clones share the handle as well
    let clone = store.clone();
    assert_eq!(clone.initialize().await.unwrap().actor_id(), first);

    // Concurrent first use spawns a single actor
    let (db_path2, database_url2) = temp_db("schema_idempotent_concurrent");
    let fresh = Store::new(&database_url2);
    let (a, b) = tokio::join!(fresh.initialize(), fresh.initialize());
    assert_eq!(a.unwrap().actor_id(), b.unwrap().actor_id());

    remove_db(&db_path).await;
    remove_db(&db_path2).await;
}

#[tokio::test]
async fn test_version_one_database_is_upgraded_in_place() {
    let (db_path, database_url) = temp_db("schema_upgrade");

    // Build a version-1 file by hand
    let opts = SqliteConnectOptions::from_str(&database_url)
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .unwrap();
    sqlx::raw_sql(MIGRATIONS[0].sql).execute(&pool).await.unwrap();
    sqlx::query("PRAGMA user_version = 1")
        .execute(&pool)
        .await
        .unwrap();
    let project = Project::new("Old", "from v1", "Webtoon");
    sqlx::query(
        "INSERT INTO projects (id, name, description, art_style, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&project.id)
    .bind(&project.name)
    .bind(&project.description)
    .bind(&project.art_style)
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let store = Store::new(&database_url);
    assert_eq!(store.get_all_projects().await.unwrap(), vec![project]);

    // The settings table only exists from version 2 on
    store.set_setting("gemini_api_key", "k").await.unwrap();
    assert_eq!(
        store.get_setting("gemini_api_key").await.unwrap().as_deref(),
        Some("k")
    );
    assert_eq!(user_version(&database_url).await, SCHEMA_VERSION);

    remove_db(&db_path).await;
}

#[tokio::test]
async fn test_newer_schema_version_is_rejected() {
    let (db_path, database_url) = temp_db("schema_newer");

    let opts = SqliteConnectOptions::from_str(&database_url)
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .unwrap();
    sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION + 1))
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let store = Store::new(&database_url);
    let err = store.get_all_projects().await.unwrap_err();
    assert!(
        matches!(err, StoreError::StorageUnavailable(_)),
        "Expected StorageUnavailable, got {err:?}"
    );

    remove_db(&db_path).await;
}
