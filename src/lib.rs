pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod types;
mod utils;
pub mod workflow;

pub use config::Config;
pub use db::Store;
pub use error::{GenerationError, StoreError, WorkflowError};
pub use generation::{GenerationClient, Generator};
pub use workflow::EpisodeWorkflow;
