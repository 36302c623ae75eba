use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Graph backend error: {0}")]
    Backend(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, MatchError>;
