//! Local persistence for projects, characters, episodes, and settings.
//!
//! Layout:
//! - `models.rs`: records mirroring DB rows
//! - `schema.rs`: versioned SQLite DDL
//! - `actor.rs`: the actor owning the connection pool
//! - `store.rs`: the lazily opened, cloneable `Store`
//! - `settings.rs`: well-known setting keys

pub mod actor;
pub mod models;
pub mod schema;
pub mod settings;
mod store;

pub use actor::{DbActorHandle, spawn};
pub use models::{CascadeReport, Character, Episode, Project};
pub use schema::SCHEMA_VERSION;
pub use settings::ModelPreferences;
pub use store::Store;
