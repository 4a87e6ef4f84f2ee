//! `gogen.toml`: resolver and import settings shared by every run in a tree.

use crate::project::Strategy;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const CONFIG_FILE: &str = "gogen.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("invalid {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub resolver: ResolverSection,
    pub imports: ImportsSection,
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverSection {
    pub strategy: Option<Strategy>,
    pub include_tests: Option<bool>,
    pub search_path: Vec<PathBuf>,
    pub goroot: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportsSection {
    pub revendor: Vec<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolver.search_path = config
            .resolver
            .search_path
            .iter()
            .map(|entry| base.join(entry))
            .collect();
        config.resolver.goroot = config.resolver.goroot.map(|goroot| base.join(goroot));
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Loads the nearest `gogen.toml` at or above `start`, or the defaults
    /// when there is none.
    pub fn discover(start: &Path) -> Result<Self, ConfigError> {
        match find_config(start) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}

pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut current = if start.is_dir() {
        start.to_path_buf()
    } else {
        start
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    };
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_sections_relative_to_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
[resolver]
strategy = "local-module"
include_tests = true
search_path = ["go", "/abs/go"]

[imports]
revendor = ["vendor", "third_party"]
"#,
        )
        .expect("write config");

        let config = Config::load(&path).expect("config");
        assert_eq!(config.resolver.strategy, Some(Strategy::LocalModule));
        assert_eq!(config.resolver.include_tests, Some(true));
        assert_eq!(
            config.resolver.search_path,
            vec![dir.path().join("go"), PathBuf::from("/abs/go")]
        );
        assert_eq!(config.imports.revendor, ["vendor", "third_party"]);
    }

    #[test]
    fn discovery_walks_up_from_nested_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(dir.path().join(CONFIG_FILE), "[imports]\nrevendor = [\"v\"]\n").expect("write");

        assert_eq!(find_config(&nested), Some(dir.path().join(CONFIG_FILE)));
        let config = Config::discover(&nested).expect("config");
        assert_eq!(config.imports.revendor, ["v"]);
    }

    #[test]
    fn unknown_strategies_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[resolver]\nstrategy = \"flat\"\n").expect("write");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
