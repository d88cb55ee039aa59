use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GedcomError>;

#[derive(Error, Debug)]
pub enum GedcomError {
    #[error("Source unreadable: {path:?}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Person not found: {0}")]
    PersonNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Geocoding error: {0}")]
    Geocoding(String),
}
