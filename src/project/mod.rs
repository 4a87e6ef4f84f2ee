pub mod gomod;
pub mod host;
pub mod identifier;
pub mod loader;
pub mod locate;
pub mod resolver;

pub use identifier::canonical_identifier;
pub use loader::{LoadError, ParseError, SourceFile, SourceLoader};
pub use locate::{Locate, LocalModuleLocator, ResolutionError, SearchPath, WorkspaceLocator};
pub use resolver::{Resolver, ResolverOptions, Strategy};

use crate::language::typecheck::TypeCheckError;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while turning a package identifier into a
/// checked package.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    TypeCheck(#[from] TypeCheckError),
    #[error("import cycle not allowed: {}", .cycle.join(" -> "))]
    ImportCycle { cycle: Vec<String> },
}

impl From<LoadError> for ResolveError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Io { path, error } => ResolveError::Io { path, error },
            LoadError::Parse(err) => ResolveError::Parse(err),
        }
    }
}

impl ResolveError {
    /// Failures the host importer may paper over. Syntax errors never are.
    pub fn allows_fallback(&self) -> bool {
        !matches!(self, ResolveError::Parse(_))
    }
}
