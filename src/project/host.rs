//! Packages the resolver does not build from source: `unsafe`, the cgo
//! pseudo-package and the standard library. Standard library packages are
//! opaque, only their exported type names are known.

use super::{loader::SourceLoader, locate::ResolutionError};
use crate::language::{
    parser::parse_package_name,
    typecheck::{universe, Package},
};
use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    rc::Rc,
};
use tracing::debug;

#[derive(Debug, Default)]
pub struct HostImporter {
    goroot: Option<PathBuf>,
    packages: HashMap<String, Rc<Package>>,
}

impl HostImporter {
    pub fn new(goroot: Option<PathBuf>) -> Self {
        Self {
            goroot,
            packages: HashMap::new(),
        }
    }

    pub fn goroot(&self) -> Option<&PathBuf> {
        self.goroot.as_ref()
    }

    pub fn import(&mut self, path: &str) -> Result<Rc<Package>, ResolutionError> {
        if let Some(package) = self.packages.get(path) {
            return Ok(package.clone());
        }
        let package = Rc::new(self.provide(path)?);
        debug!(path, name = package.name(), "host package");
        self.packages.insert(path.to_string(), package.clone());
        Ok(package)
    }

    fn provide(&self, path: &str) -> Result<Package, ResolutionError> {
        match path {
            "unsafe" => return Ok(universe::unsafe_package()),
            "C" => return Ok(Package::opaque("C", "C")),
            _ => {}
        }
        match &self.goroot {
            Some(goroot) => {
                let dir = goroot.join("src").join(path);
                if !dir.is_dir() {
                    return Err(ResolutionError::NotFound {
                        identifier: path.to_string(),
                        searched: vec![dir],
                    });
                }
                let name = package_name_in(&dir).unwrap_or_else(|| last_element(path));
                Ok(Package::opaque(path, name))
            }
            None if is_standard_path(path) => Ok(Package::opaque(path, last_element(path))),
            None => Err(ResolutionError::NotFound {
                identifier: path.to_string(),
                searched: Vec::new(),
            }),
        }
    }
}

/// Standard library paths have no dot in their first element.
pub fn is_standard_path(path: &str) -> bool {
    match path.split('/').next() {
        Some(first) => !first.is_empty() && !first.contains('.'),
        None => false,
    }
}

fn last_element(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn package_name_in(dir: &std::path::Path) -> Option<String> {
    let files = SourceLoader::new(true).source_files(dir).ok()?;
    files.iter().find_map(|file| {
        let source = fs::read_to_string(file).ok()?;
        parse_package_name(&source)
    })
}
