use thiserror::Error as ThisError;

use super::generation::GenerationError;
use super::store::StoreError;
use crate::workflow::WorkflowStep;

#[derive(Debug, ThisError)]
pub enum WorkflowError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Episode not found: {0}")]
    EpisodeNotFound(String),

    #[error("Operation requires step {expected:?}, workflow is at {actual:?}")]
    InvalidStep {
        expected: WorkflowStep,
        actual: WorkflowStep,
    },

    #[error("Episode topic must not be empty")]
    EmptyTopic,

    #[error("No draft character at index {0}")]
    CharacterIndex(usize),

    #[error("No panel at index {0}")]
    PanelIndex(usize),

    #[error("Character {0} does not belong to this project")]
    UnknownCharacter(String),

    #[error("Episode number must be at least 1, got {0}")]
    InvalidEpisodeNumber(u32),

    #[error("No comic image to save; generate one first")]
    MissingComic,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}
