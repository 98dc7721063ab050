use thiserror::Error;

/// Domain failures surfaced to callers. Persistence and I/O errors stay in
/// `anyhow` at the adapter layer.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("duplicate id: {0}")]
    DuplicateId(String),
}
