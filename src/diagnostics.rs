use crate::{
    error::Error,
    language::{errors::SyntaxError, typecheck::TypeError},
    project::{ParseError, ResolveError},
};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use std::fs;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
}

impl SyntaxDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: &SyntaxError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.message.clone(),
        }
    }
}

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
pub struct TypeDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl TypeDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: &TypeError) -> Self {
        Self {
            src,
            span: err.span.to_source_span(),
            help: err.help.clone(),
            message: err.message.clone(),
            label: err.label.clone(),
        }
    }
}

/// Renders every syntax error of the failing file.
pub fn syntax_reports(err: &ParseError) -> Vec<Report> {
    let src = NamedSource::new(err.path.display().to_string(), err.text.clone());
    err.syntax_errors()
        .iter()
        .map(|syntax| Report::new(SyntaxDiagnostic::from_error(src.clone(), syntax)))
        .collect()
}

/// Renders type errors against their files, which are read again for the
/// snippet. Errors whose file cannot be read fall back to a plain report.
pub fn type_reports(errors: &[TypeError]) -> Vec<Report> {
    let mut reports = Vec::new();
    for err in errors {
        match fs::read_to_string(&err.path) {
            Ok(text) => {
                let src = NamedSource::new(err.path.display().to_string(), text);
                reports.push(Report::new(TypeDiagnostic::from_error(src, err)));
            }
            Err(_) => reports.push(Report::msg(err.to_string())),
        }
        if let Some(cause) = &err.cause {
            reports.extend(resolve_reports(cause));
        }
    }
    reports
}

fn resolve_reports(err: &ResolveError) -> Vec<Report> {
    match err {
        ResolveError::Parse(parse) => syntax_reports(parse),
        ResolveError::TypeCheck(check) => type_reports(&check.errors),
        _ => Vec::new(),
    }
}

/// Prints `err` on stderr: source snippets for syntax and type errors, the
/// chain of causes for everything else.
pub fn emit_error(err: &Error) {
    eprintln!("error: {err}");
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
    if let Error::Resolve(resolve) = err {
        for report in resolve_reports(resolve) {
            eprintln!("{report:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::SourceLoader;

    #[test]
    fn every_syntax_error_gets_a_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("a.go"),
            "package p\ntype A struct {\n\tx int int\n}\ntype B [\n",
        )
        .expect("write");
        let err = SourceLoader::default().load(dir.path()).unwrap_err();
        let crate::project::LoadError::Parse(err) = err else {
            panic!("expected parse error");
        };
        assert_eq!(syntax_reports(&err).len(), err.syntax_errors().len());
    }
}
