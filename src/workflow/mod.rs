//! Step-by-step episode creation on top of the store and a [`Generator`].
//!
//! [`Generator`]: crate::generation::Generator

mod episode;

pub use episode::{CastMember, EpisodeWorkflow, WorkflowStep};
