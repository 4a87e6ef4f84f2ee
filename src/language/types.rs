use crate::language::{ast::Ident, span::Span};

/// A type as spelled in source, before any name is resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeExpr {
    Named {
        qualifier: Option<Ident>,
        name: Ident,
        args: Vec<TypeAnnotation>,
    },
    Pointer(Box<TypeAnnotation>),
    Slice(Box<TypeAnnotation>),
    /// Array length kept as written; `...` for composite-literal arrays.
    Array {
        len: String,
        elem: Box<TypeAnnotation>,
    },
    Map {
        key: Box<TypeAnnotation>,
        value: Box<TypeAnnotation>,
    },
    Chan {
        dir: ChanDir,
        elem: Box<TypeAnnotation>,
    },
    Func(FuncTypeExpr),
    Struct(Vec<FieldDecl>),
    Interface(Vec<InterfaceElem>),
    Union(Vec<UnionTerm>),
}

impl TypeExpr {
    pub fn named(name: Ident) -> Self {
        TypeExpr::Named {
            qualifier: None,
            name,
            args: Vec::new(),
        }
    }

    pub fn canonical_name(&self) -> String {
        match self {
            TypeExpr::Named {
                qualifier,
                name,
                args,
            } => {
                let mut out = match qualifier {
                    Some(qualifier) => format!("{}.{}", qualifier.name, name.name),
                    None => name.name.clone(),
                };
                if !args.is_empty() {
                    let rendered: Vec<String> =
                        args.iter().map(|arg| arg.ty.canonical_name()).collect();
                    out.push_str(&format!("[{}]", rendered.join(", ")));
                }
                out
            }
            TypeExpr::Pointer(inner) => format!("*{}", inner.ty.canonical_name()),
            TypeExpr::Slice(inner) => format!("[]{}", inner.ty.canonical_name()),
            TypeExpr::Array { len, elem } => format!("[{}]{}", len, elem.ty.canonical_name()),
            TypeExpr::Map { key, value } => format!(
                "map[{}]{}",
                key.ty.canonical_name(),
                value.ty.canonical_name()
            ),
            TypeExpr::Chan { dir, elem } => {
                let prefix = match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                };
                format!("{prefix}{}", elem.ty.canonical_name())
            }
            TypeExpr::Func(signature) => format!("func{}", signature.canonical_name()),
            TypeExpr::Struct(fields) if fields.is_empty() => "struct{}".into(),
            TypeExpr::Struct(_) => "struct{...}".into(),
            TypeExpr::Interface(elems) if elems.is_empty() => "interface{}".into(),
            TypeExpr::Interface(_) => "interface{...}".into(),
            TypeExpr::Union(terms) => {
                let rendered: Vec<String> = terms
                    .iter()
                    .map(|term| {
                        let tilde = if term.tilde { "~" } else { "" };
                        format!("{tilde}{}", term.ty.ty.canonical_name())
                    })
                    .collect();
                rendered.join(" | ")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeAnnotation {
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    /// Empty for an embedded field.
    pub names: Vec<Ident>,
    pub ty: TypeAnnotation,
    pub tag: Option<String>,
    pub span: Span,
}

impl FieldDecl {
    pub fn is_embedded(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct FuncTypeExpr {
    pub params: Vec<ParamDecl>,
    pub results: Vec<ParamDecl>,
    pub variadic: bool,
}

impl FuncTypeExpr {
    pub fn canonical_name(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .enumerate()
            .map(|(idx, param)| {
                if self.variadic && idx + 1 == self.params.len() {
                    format!("...{}", param.ty.ty.canonical_name())
                } else {
                    param.ty.ty.canonical_name()
                }
            })
            .collect();
        let results: Vec<String> = self
            .results
            .iter()
            .map(|result| result.ty.ty.canonical_name())
            .collect();
        match results.len() {
            0 => format!("({})", params.join(", ")),
            1 => format!("({}) {}", params.join(", "), results[0]),
            _ => format!("({}) ({})", params.join(", "), results.join(", ")),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamDecl {
    pub name: Option<Ident>,
    pub ty: TypeAnnotation,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InterfaceElem {
    Method {
        name: Ident,
        signature: FuncTypeExpr,
    },
    /// An embedded interface or a type-set term list.
    Embedded(TypeAnnotation),
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnionTerm {
    pub tilde: bool,
    pub ty: TypeAnnotation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeParamDecl {
    pub names: Vec<Ident>,
    pub constraint: TypeAnnotation,
}
