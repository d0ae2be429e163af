use thiserror::Error;

use crate::storage::photo_store::PhotoError;
use crate::storage::RepositoryError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Repository unavailable: {0}")]
    RepositoryUnavailable(#[from] RepositoryError),

    #[error("Photo store error: {0}")]
    Photo(#[from] PhotoError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid occurrence identifier")]
    InvalidEntry,

    #[error("Wrong confirmation key")]
    WrongKey,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
