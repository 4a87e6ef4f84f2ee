//! Scenario tests over package trees built in temporary GOPATH workspaces.

mod generate;
mod resolve;

use crate::project::{Resolver, SearchPath};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

pub(crate) struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub(crate) fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub(crate) fn gopath(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn package_dir(&self, package: &str) -> PathBuf {
        self.gopath().join("src").join(package)
    }

    /// Writes `source` as `file` of `package`.
    pub(crate) fn write(&self, package: &str, file: &str, source: &str) -> &Self {
        let dir = self.package_dir(package);
        fs::create_dir_all(&dir).expect("create package dir");
        fs::write(dir.join(file), source).expect("write source");
        self
    }

    pub(crate) fn search_path(&self) -> SearchPath {
        SearchPath::from_workspaces([self.gopath()])
    }

    pub(crate) fn resolver(&self) -> Resolver {
        Resolver::workspace(self.gopath().to_path_buf(), self.search_path())
    }

    /// A resolver whose working directory is `package`'s directory.
    pub(crate) fn resolver_in(&self, package: &str) -> Resolver {
        Resolver::workspace(self.package_dir(package), self.search_path())
    }
}

/// Whether any error in the `source` chain of `err` mentions `needle`.
pub(crate) fn chain_mentions(err: &(dyn std::error::Error + 'static), needle: &str) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.to_string().contains(needle) {
            return true;
        }
        current = err.source();
    }
    false
}
