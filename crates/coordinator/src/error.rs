use pagelock_core::CoreError;
use pagelock_events::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// The coordinator task has shut down; the handle is no longer usable.
    #[error("Lock coordinator has stopped")]
    Stopped,

    #[error("Invalid configuration: {0}")]
    Config(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
