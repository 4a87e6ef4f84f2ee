//! Package identifiers: slash separated strings such as
//! `github.com/acme/widgets` or, when relative, `.` and `./sub`.

use std::path::{Component, Path, PathBuf};

/// Relative identifiers are empty or start with `.`.
pub fn is_relative(identifier: &str) -> bool {
    identifier.is_empty() || identifier.starts_with('.')
}

/// Converts `identifier` into the form used as cache key. Relative
/// identifiers are joined to `working_dir`, cleaned and stripped of the first
/// search root containing them; absolute identifiers are returned with
/// redundant separators removed.
pub fn canonical_identifier(identifier: &str, working_dir: &Path, roots: &[PathBuf]) -> String {
    if !is_relative(identifier) {
        return identifier.trim_end_matches('/').to_string();
    }
    let absolute = clean(&working_dir.join(identifier));
    strip_root(&absolute, roots)
}

/// The identity a directory has under `roots`: its path relative to the first
/// root containing it, or its absolute path when no root does.
pub fn strip_root(dir: &Path, roots: &[PathBuf]) -> String {
    let dir = clean(dir);
    for root in roots {
        let root = clean(root);
        if let Ok(rest) = dir.strip_prefix(&root) {
            if rest.as_os_str().is_empty() {
                continue;
            }
            return to_slash(rest);
        }
    }
    to_slash(&dir)
}

/// Lexical clean in the manner of `path.Clean`: drops `.` elements and folds
/// `..` into the preceding element. The file system is never consulted.
pub fn clean(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

pub fn to_slash(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push('/'),
            Component::Prefix(prefix) => out.push_str(&prefix.as_os_str().to_string_lossy()),
            other => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    out
}
