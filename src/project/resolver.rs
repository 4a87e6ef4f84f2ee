use super::{
    host::HostImporter,
    identifier::canonical_identifier,
    loader::SourceLoader,
    locate::{Locate, LocalModuleLocator, ResolutionError, SearchPath, WorkspaceLocator},
    ResolveError,
};
use crate::language::typecheck::{check_package, Importer, Package};
use serde::Deserialize;
use std::{collections::HashMap, fmt, path::PathBuf, rc::Rc, str::FromStr};
use tracing::debug;

/// How package identifiers map to directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Every package lives under one of the search roots.
    #[default]
    Workspace,
    /// The working directory is a package in its own right.
    LocalModule,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "workspace" => Ok(Strategy::Workspace),
            "local-module" => Ok(Strategy::LocalModule),
            other => Err(format!(
                "unknown strategy `{other}` (expected `workspace` or `local-module`)"
            )),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Workspace => "workspace",
            Strategy::LocalModule => "local-module",
        })
    }
}

/// Settings a resolver is built from. Nothing here is read from the
/// environment.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub strategy: Strategy,
    pub include_tests: bool,
    pub working_dir: PathBuf,
    pub search_path: SearchPath,
    pub goroot: Option<PathBuf>,
}

impl ResolverOptions {
    pub fn new(working_dir: PathBuf, search_path: SearchPath) -> Self {
        Self {
            strategy: Strategy::Workspace,
            include_tests: false,
            working_dir,
            search_path,
            goroot: None,
        }
    }
}

/// Resolves package identifiers to checked packages. Every package is built
/// at most once; later requests share the cached `Rc`.
pub struct Resolver {
    locator: Box<dyn Locate>,
    loader: SourceLoader,
    working_dir: PathBuf,
    host: HostImporter,
    cache: HashMap<String, Rc<Package>>,
    in_progress: Vec<String>,
}

impl Resolver {
    pub fn new(options: ResolverOptions) -> Result<Self, ResolveError> {
        let locator: Box<dyn Locate> = match options.strategy {
            Strategy::Workspace => Box::new(WorkspaceLocator::new(options.search_path)),
            Strategy::LocalModule => Box::new(LocalModuleLocator::new(
                options.working_dir.clone(),
                options.search_path,
            )?),
        };
        Ok(Self {
            locator,
            loader: SourceLoader::new(!options.include_tests),
            working_dir: options.working_dir,
            host: HostImporter::new(options.goroot),
            cache: HashMap::new(),
            in_progress: Vec::new(),
        })
    }

    /// Workspace strategy, test files skipped.
    pub fn workspace(working_dir: PathBuf, search_path: SearchPath) -> Self {
        Self::with_locator(
            Box::new(WorkspaceLocator::new(search_path)),
            SourceLoader::new(true),
            working_dir,
        )
    }

    /// Workspace strategy, test files loaded.
    pub fn workspace_with_tests(working_dir: PathBuf, search_path: SearchPath) -> Self {
        Self::with_locator(
            Box::new(WorkspaceLocator::new(search_path)),
            SourceLoader::new(false),
            working_dir,
        )
    }

    /// Local-module strategy, test files skipped.
    pub fn local_module(working_dir: PathBuf, search_path: SearchPath) -> Result<Self, ResolveError> {
        let locator = LocalModuleLocator::new(working_dir.clone(), search_path)?;
        Ok(Self::with_locator(
            Box::new(locator),
            SourceLoader::new(true),
            working_dir,
        ))
    }

    /// Local-module strategy, test files loaded.
    pub fn local_module_with_tests(
        working_dir: PathBuf,
        search_path: SearchPath,
    ) -> Result<Self, ResolveError> {
        let locator = LocalModuleLocator::new(working_dir.clone(), search_path)?;
        Ok(Self::with_locator(
            Box::new(locator),
            SourceLoader::new(false),
            working_dir,
        ))
    }

    pub fn with_locator(locator: Box<dyn Locate>, loader: SourceLoader, working_dir: PathBuf) -> Self {
        Self {
            locator,
            loader,
            working_dir,
            host: HostImporter::default(),
            cache: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    pub fn with_host(mut self, host: HostImporter) -> Self {
        self.host = host;
        self
    }

    pub fn working_dir(&self) -> &PathBuf {
        &self.working_dir
    }

    /// The cache key `identifier` resolves under.
    pub fn canonical(&self, identifier: &str) -> String {
        canonical_identifier(
            identifier,
            &self.working_dir,
            self.locator.search_path().roots(),
        )
    }

    pub fn resolve(&mut self, identifier: &str) -> Result<Rc<Package>, ResolveError> {
        let key = self.canonical(identifier);
        if let Some(package) = self.cache.get(&key) {
            debug!(package = %key, "cache hit");
            return Ok(package.clone());
        }
        if let Some(start) = self.in_progress.iter().position(|entry| *entry == key) {
            let mut cycle = self.in_progress[start..].to_vec();
            cycle.push(key);
            return Err(ResolveError::ImportCycle { cycle });
        }

        let package = if matches!(key.as_str(), "unsafe" | "C") {
            self.host.import(&key)?
        } else {
            self.in_progress.push(key.clone());
            let built = self.build(&key);
            self.in_progress.pop();
            match built {
                Ok(package) => package,
                Err(err) if err.allows_fallback() => self.fall_back(&key, err)?,
                Err(err) => return Err(err),
            }
        };
        self.cache.insert(key, package.clone());
        Ok(package)
    }

    /// Like [`Resolver::resolve`], but the package must come from source: the
    /// host importer never stands in for it, and the error that stopped the
    /// build is returned as is.
    pub fn resolve_source(&mut self, identifier: &str) -> Result<Rc<Package>, ResolveError> {
        let key = self.canonical(identifier);
        if let Some(package) = self.cache.get(&key) {
            if !package.is_opaque() {
                debug!(package = %key, "cache hit");
                return Ok(package.clone());
            }
        }
        self.in_progress.push(key.clone());
        let built = self.build(&key);
        self.in_progress.pop();
        let package = built?;
        Ok(self.cache.entry(key).or_insert(package).clone())
    }

    fn build(&mut self, key: &str) -> Result<Rc<Package>, ResolveError> {
        let dir = self.locator.locate(key)?;
        let files = self.loader.load(&dir)?;
        if files.is_empty() {
            return Err(ResolutionError::NoSourceFiles {
                identifier: key.to_string(),
                dir,
            }
            .into());
        }
        debug!(package = key, dir = %dir.display(), files = files.len(), "type-checking");
        let package = check_package(key, &files, self)?;
        Ok(Rc::new(package))
    }

    /// Tries the host importer after `primary` failed. When the host cannot
    /// provide the package either, `primary` is what the caller sees.
    fn fall_back(&mut self, key: &str, primary: ResolveError) -> Result<Rc<Package>, ResolveError> {
        match self.host.import(key) {
            Ok(package) => {
                debug!(package = key, error = %primary, "resolved by host importer");
                Ok(package)
            }
            Err(host) => {
                debug!(package = key, error = %host, "host importer failed, keeping original error");
                Err(primary)
            }
        }
    }
}

impl Importer for Resolver {
    fn import(&mut self, path: &str) -> Result<Rc<Package>, ResolveError> {
        self.resolve(path)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("working_dir", &self.working_dir)
            .field("search_path", self.locator.search_path())
            .field("loader", &self.loader)
            .field("cached", &self.cache.len())
            .finish()
    }
}
