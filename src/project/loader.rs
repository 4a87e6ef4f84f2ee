use crate::language::{
    ast::File,
    errors::{SyntaxError, SyntaxErrors},
    parser::parse_file,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

/// One parsed source file together with the text it was parsed from.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source: String,
    pub ast: File,
}

#[derive(Debug, Error)]
#[error("{}: {}", .path.display(), .errors)]
pub struct ParseError {
    pub path: PathBuf,
    pub text: String,
    pub errors: SyntaxErrors,
}

impl ParseError {
    pub fn syntax_errors(&self) -> &[SyntaxError] {
        &self.errors.errors
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Reads and parses the `.go` files of one directory.
#[derive(Debug, Clone, Copy)]
pub struct SourceLoader {
    skip_tests: bool,
}

impl Default for SourceLoader {
    fn default() -> Self {
        Self { skip_tests: true }
    }
}

impl SourceLoader {
    pub fn new(skip_tests: bool) -> Self {
        Self { skip_tests }
    }

    pub fn skip_tests(&self) -> bool {
        self.skip_tests
    }

    /// Source file paths of `dir`, sorted by file name.
    pub fn source_files(&self, dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
        let io = |error| LoadError::Io {
            path: dir.to_path_buf(),
            error,
        };
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io)? {
            let entry = entry.map_err(io)?;
            if entry.file_type().map_err(io)?.is_dir() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("go") {
                continue;
            }
            let name = entry.file_name();
            if self.skip_tests && name.to_string_lossy().contains("_test.go") {
                continue;
            }
            paths.push(path);
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(paths)
    }

    /// Loads every source file in `dir`. The first file that fails to parse
    /// aborts the load.
    pub fn load(&self, dir: &Path) -> Result<Vec<SourceFile>, LoadError> {
        let mut files = Vec::new();
        for path in self.source_files(dir)? {
            let source = fs::read_to_string(&path).map_err(|error| LoadError::Io {
                path: path.clone(),
                error,
            })?;
            match parse_file(path.clone(), &source) {
                Ok(ast) => files.push(SourceFile { path, source, ast }),
                Err(errors) => {
                    return Err(ParseError {
                        path,
                        text: source,
                        errors,
                    }
                    .into())
                }
            }
        }
        debug!(dir = %dir.display(), files = files.len(), "loaded sources");
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, source: &str) {
        fs::write(dir.join(name), source).expect("write source");
    }

    #[test]
    fn filters_and_sorts_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "b.go", "package p\n");
        write(dir.path(), "a.go", "package p\n");
        write(dir.path(), "a_test.go", "package p\n");
        write(dir.path(), "notes.txt", "not go");
        fs::create_dir(dir.path().join("sub.go")).expect("mkdir");

        let skipping = SourceLoader::new(true).load(dir.path()).expect("load");
        let names: Vec<_> = skipping
            .iter()
            .map(|file| file.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.go", "b.go"]);

        let all = SourceLoader::new(false).load(dir.path()).expect("load");
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn parse_failure_names_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "a.go", "package p\n");
        write(dir.path(), "b.go", "package p\ntype T struct {\n");

        let err = SourceLoader::default().load(dir.path()).unwrap_err();
        let LoadError::Parse(err) = err else {
            panic!("expected parse error, got {err:?}");
        };
        assert!(err.path.ends_with("b.go"));
        assert!(!err.syntax_errors().is_empty());
    }

    #[test]
    fn unreadable_directory_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing");
        assert!(matches!(
            SourceLoader::default().load(&missing),
            Err(LoadError::Io { .. })
        ));
    }
}
