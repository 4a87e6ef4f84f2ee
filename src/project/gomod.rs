//! Just enough of `go.mod` to learn the module path.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_till1},
    character::complete::{char, space0, space1},
    combinator::{all_consuming, map},
    sequence::{delimited, pair, preceded, terminated},
    IResult, Parser,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const FILE_NAME: &str = "go.mod";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoModule {
    pub path: String,
    pub file: PathBuf,
}

#[derive(Debug, Error)]
pub enum GoModError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("{}: no module directive", .path.display())]
    MissingModule { path: PathBuf },
}

/// Reads `dir/go.mod` when present.
pub fn read(dir: &Path) -> Result<Option<GoModule>, GoModError> {
    let file = dir.join(FILE_NAME);
    if !file.is_file() {
        return Ok(None);
    }
    let source = fs::read_to_string(&file).map_err(|error| GoModError::Io {
        path: file.clone(),
        error,
    })?;
    match module_path(&source) {
        Some(path) => Ok(Some(GoModule { path, file })),
        None => Err(GoModError::MissingModule { path: file }),
    }
}

/// The path named by the first `module` directive.
pub fn module_path(source: &str) -> Option<String> {
    source
        .lines()
        .map(strip_comment)
        .find_map(|line| directive(line.trim()).ok().map(|(_, path)| path.to_string()))
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn directive(input: &str) -> IResult<&str, &str> {
    all_consuming(terminated(
        preceded(keyword, module_name),
        space0,
    ))
    .parse(input)
}

fn keyword(input: &str) -> IResult<&str, ()> {
    map(pair(tag("module"), space1), |_| ()).parse(input)
}

fn module_name(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), is_not("\""), char('"')),
        delimited(char('`'), is_not("`"), char('`')),
        take_till1(|c: char| c.is_whitespace()),
    ))
    .parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_plain_and_quoted_module_paths() {
        assert_eq!(
            module_path("module github.com/acme/app\n\ngo 1.21\n").as_deref(),
            Some("github.com/acme/app")
        );
        assert_eq!(
            module_path("// header\nmodule \"example.com/q\" // trailing\n").as_deref(),
            Some("example.com/q")
        );
    }

    #[test]
    fn ignores_other_directives() {
        assert_eq!(module_path("go 1.21\nrequire x v1.0.0\n"), None);
        assert_eq!(module_path("modules are fun"), None);
    }

    #[test]
    fn missing_directive_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(FILE_NAME), "go 1.21\n").expect("write go.mod");
        assert!(matches!(
            read(dir.path()),
            Err(GoModError::MissingModule { .. })
        ));
        let empty = tempfile::tempdir().expect("tempdir");
        assert_eq!(read(empty.path()).expect("no go.mod"), None);
    }
}
