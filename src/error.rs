use crate::{config::ConfigError, project::ResolveError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("type {name} not found in package \"{package}\"")]
    NotFound { package: String, name: String },
    #[error("{package}.{name} is not a struct type: {reason}")]
    NotAStruct {
        package: String,
        name: String,
        reason: String,
    },
    #[error("field {field:?}: unsupported kind {kind}")]
    UnsupportedFieldKind { field: String, kind: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot determine the working directory")]
    WorkingDir(#[source] std::io::Error),
    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
