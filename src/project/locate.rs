//! Mapping package identifiers to directories.

use super::{
    gomod::{self, GoModError, GoModule},
    identifier::{clean, strip_root, to_slash},
};
use std::{
    fmt,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("cannot find package \"{identifier}\" in any of:{}", SearchList(.searched))]
    NotFound {
        identifier: String,
        searched: Vec<PathBuf>,
    },
    #[error("no Go source files in {}", .dir.display())]
    NoSourceFiles { identifier: String, dir: PathBuf },
    #[error("invalid go.mod in working directory")]
    GoMod(#[from] GoModError),
}

struct SearchList<'a>(&'a [PathBuf]);

impl fmt::Display for SearchList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, " (no search roots configured)");
        }
        for root in self.0 {
            write!(f, "\n\t{}", root.display())?;
        }
        Ok(())
    }
}

/// Ordered source roots. A `GOPATH` entry `p` contributes the root `p/src`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    roots: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn from_workspaces<I, P>(workspaces: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            roots: workspaces
                .into_iter()
                .map(|entry| entry.as_ref().join("src"))
                .collect(),
        }
    }

    /// Splits a `GOPATH`-style list; empty entries are ignored.
    pub fn parse_list(list: &str) -> Self {
        Self::from_workspaces(
            std::env::split_paths(list).filter(|entry| !entry.as_os_str().is_empty()),
        )
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Finds the directory holding a package's sources.
pub trait Locate {
    fn locate(&self, identifier: &str) -> Result<PathBuf, ResolutionError>;

    fn search_path(&self) -> &SearchPath;
}

/// Flat global workspace: every package lives at `root/identifier` for one of
/// the search roots.
#[derive(Debug, Clone)]
pub struct WorkspaceLocator {
    search_path: SearchPath,
}

impl WorkspaceLocator {
    pub fn new(search_path: SearchPath) -> Self {
        Self { search_path }
    }
}

impl Locate for WorkspaceLocator {
    fn locate(&self, identifier: &str) -> Result<PathBuf, ResolutionError> {
        let relative = clean(Path::new(identifier.trim_start_matches('/')));
        let escapes = relative.starts_with("..");
        for root in self.search_path.roots() {
            if escapes {
                break;
            }
            let candidate = root.join(&relative);
            if candidate.is_dir() {
                debug!(identifier, dir = %candidate.display(), "located in workspace");
                return Ok(candidate);
            }
        }
        Err(ResolutionError::NotFound {
            identifier: identifier.to_string(),
            searched: self
                .search_path
                .roots()
                .iter()
                .map(|root| root.join(&relative))
                .collect(),
        })
    }

    fn search_path(&self) -> &SearchPath {
        &self.search_path
    }
}

/// The working directory is a package of its own, addressed by its canonical
/// identity, its absolute path or the module path from its `go.mod`.
/// Everything else comes from the workspace.
#[derive(Debug, Clone)]
pub struct LocalModuleLocator {
    working_dir: PathBuf,
    identity: String,
    absolute: String,
    module: Option<GoModule>,
    workspace: WorkspaceLocator,
}

impl LocalModuleLocator {
    pub fn new(working_dir: PathBuf, search_path: SearchPath) -> Result<Self, ResolutionError> {
        let working_dir = clean(&working_dir);
        let module = gomod::read(&working_dir)?;
        if let Some(module) = &module {
            debug!(module = %module.path, file = %module.file.display(), "module path from go.mod");
        }
        Ok(Self {
            identity: strip_root(&working_dir, search_path.roots()),
            absolute: to_slash(&working_dir),
            working_dir,
            module,
            workspace: WorkspaceLocator::new(search_path),
        })
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn module_path(&self) -> Option<&str> {
        self.module.as_ref().map(|module| module.path.as_str())
    }

    fn locate_in_module(&self, identifier: &str) -> Option<PathBuf> {
        if identifier == self.identity || identifier == self.absolute {
            return Some(self.working_dir.clone());
        }
        let module = self.module_path()?;
        if identifier == module {
            return Some(self.working_dir.clone());
        }
        let rest = identifier.strip_prefix(module)?.strip_prefix('/')?;
        let candidate = clean(&self.working_dir.join(rest));
        (candidate.starts_with(&self.working_dir) && candidate.is_dir()).then_some(candidate)
    }
}

impl Locate for LocalModuleLocator {
    fn locate(&self, identifier: &str) -> Result<PathBuf, ResolutionError> {
        if let Some(dir) = self.locate_in_module(identifier) {
            debug!(identifier, dir = %dir.display(), "located in local module");
            return Ok(dir);
        }
        self.workspace.locate(identifier)
    }

    fn search_path(&self) -> &SearchPath {
        self.workspace.search_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn workspace() -> (tempfile::TempDir, SearchPath) {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("src/example.com/lib")).expect("mkdir");
        let search = SearchPath::from_workspaces([dir.path()]);
        (dir, search)
    }

    #[test]
    fn workspace_uses_first_matching_root() {
        let (first, _) = workspace();
        let (second, _) = workspace();
        let search = SearchPath::from_workspaces([first.path(), second.path()]);
        let locator = WorkspaceLocator::new(search);
        let dir = locator.locate("example.com/lib").expect("located");
        assert_eq!(dir, first.path().join("src/example.com/lib"));
    }

    #[test]
    fn workspace_reports_every_searched_root() {
        let (_dir, search) = workspace();
        let locator = WorkspaceLocator::new(search);
        let err = locator.locate("example.com/missing").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("cannot find package \"example.com/missing\""));
        assert!(message.contains("example.com/missing"));
    }

    #[test]
    fn leading_slash_and_parent_elements_stay_inside_roots() {
        let (dir, search) = workspace();
        let locator = WorkspaceLocator::new(search);
        assert_eq!(
            locator.locate("/example.com/lib").expect("located"),
            dir.path().join("src/example.com/lib")
        );
        assert!(locator.locate("../src/example.com/lib").is_err());
    }

    #[test]
    fn local_module_matches_identity_absolute_path_and_go_mod() {
        let (_ws, search) = workspace();
        let module = tempfile::tempdir().expect("tempdir");
        fs::write(module.path().join("go.mod"), "module example.com/app\n").expect("go.mod");
        fs::create_dir(module.path().join("models")).expect("mkdir");
        let wd = clean(module.path());
        let locator = LocalModuleLocator::new(wd.clone(), search).expect("locator");

        assert_eq!(locator.locate(&to_slash(&wd)).expect("absolute"), wd);
        assert_eq!(locator.locate("example.com/app").expect("module"), wd);
        assert_eq!(
            locator.locate("example.com/app/models").expect("subpackage"),
            wd.join("models")
        );
        assert!(locator.locate("example.com/app/missing").is_err());
        assert!(locator.locate("example.com/lib").is_ok());
    }
}
