use thiserror::Error;

/// The turn's cancellation token fired (usually a client disconnect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("turn cancelled")]
pub struct Cancelled;
