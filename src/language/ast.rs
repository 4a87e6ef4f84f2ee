use crate::language::{
    span::Span,
    types::{FuncTypeExpr, TypeAnnotation, TypeParamDecl},
};
use std::path::PathBuf;

/// Declaration-level syntax of one source file.
#[derive(Clone, Debug)]
pub struct File {
    pub path: PathBuf,
    pub package: Ident,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }

    pub fn is_exported(&self) -> bool {
        is_exported(&self.name)
    }
}

pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

#[derive(Clone, Debug)]
pub struct ImportSpec {
    /// Explicit local name, `.` or `_`.
    pub name: Option<Ident>,
    pub path: String,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Decl {
    Type(TypeSpec),
    Func(FuncDecl),
    Var(ValueSpec),
    Const(ValueSpec),
}

#[derive(Clone, Debug)]
pub struct TypeSpec {
    pub name: Ident,
    pub type_params: Vec<TypeParamDecl>,
    pub alias: bool,
    pub ty: TypeAnnotation,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FuncDecl {
    pub recv: Option<Receiver>,
    pub name: Ident,
    pub type_params: Vec<TypeParamDecl>,
    pub signature: FuncTypeExpr,
    pub has_body: bool,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Receiver {
    pub name: Option<Ident>,
    pub pointer: bool,
    pub base: Ident,
    pub type_args: Vec<Ident>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ValueSpec {
    pub names: Vec<Ident>,
    pub ty: Option<TypeAnnotation>,
    pub has_value: bool,
    pub span: Span,
}
