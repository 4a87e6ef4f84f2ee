mod checker;
pub mod object;
pub mod universe;

pub use checker::check_package;
pub use object::*;

use crate::language::span::{line_col, Span};
use crate::project::{loader::SourceFile, ResolveError};
use std::{fmt, path::PathBuf, rc::Rc};
use thiserror::Error;

/// Supplies checked packages for the imports of the package being checked.
pub trait Importer {
    fn import(&mut self, path: &str) -> Result<Rc<Package>, ResolveError>;
}

#[derive(Debug, Error)]
#[error("{}:{}:{}: {}", .path.display(), .line, .column, .message)]
pub struct TypeError {
    pub path: PathBuf,
    pub span: Span,
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub label: String,
    pub help: Option<String>,
    #[source]
    pub cause: Option<Box<ResolveError>>,
}

impl TypeError {
    pub fn at(file: &SourceFile, span: Span, message: impl Into<String>) -> Self {
        let message = message.into();
        let (line, column) = line_col(&file.source, span.start);
        Self {
            path: file.path.clone(),
            span,
            line,
            column,
            label: message.clone(),
            message,
            help: None,
            cause: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_cause(mut self, cause: ResolveError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

/// Every error found while checking one package.
#[derive(Debug)]
pub struct TypeCheckError {
    pub package: String,
    pub errors: Vec<TypeError>,
}

impl fmt::Display for TypeCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type-checking package \"{}\" failed", self.package)?;
        if self.errors.len() > 1 {
            write!(f, " with {} errors", self.errors.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for TypeCheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}
