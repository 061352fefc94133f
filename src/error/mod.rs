mod generation;
mod store;
mod workflow;

pub use generation::GenerationError;
pub use store::StoreError;
pub use workflow::WorkflowError;

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
