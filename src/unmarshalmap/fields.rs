//! Decides how each field of the subject struct is decoded, and rejects the
//! kinds a `map[string]interface{}` can never hold.

use crate::{
    error::Error,
    language::{
        ast::is_exported,
        tag,
        typecheck::{universe, BasicKind, NamedType, PackageRef, StructType, Type},
    },
};
use std::rc::Rc;

pub const TAG_KEY: &str = "unmarshalmap";
pub const METHOD_NAME: &str = "UnmarshalMap";

/// One struct field and the map key it is read from.
#[derive(Debug, Clone)]
pub struct FieldPlan {
    /// Go field name, the type name for embedded fields.
    pub name: String,
    pub key: String,
    /// Dotted key path used in error messages.
    pub path: String,
    pub node: Node,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub ty: Type,
    pub decode: Decode,
}

#[derive(Debug, Clone)]
pub enum Decode {
    /// Empty interface: stored as is.
    Any,
    /// Booleans, strings and numbers.
    Scalar(BasicKind),
    /// Exact type assertion: non-empty interfaces and opaque host types.
    Assert,
    Pointer(Box<Node>),
    Slice(Box<Node>),
    Array(Box<Node>),
    /// String-keyed map; the key type is spelled from `Node::ty`.
    Map(Box<Node>),
    /// Calls the type's own `UnmarshalMap`.
    Delegate,
    Inline(Vec<FieldPlan>),
}

impl Node {
    pub fn key_type(&self) -> Option<Type> {
        match self.ty.underlying() {
            Type::Map(key, _) => Some(*key),
            _ => None,
        }
    }
}

pub struct Planner<'a> {
    subject: &'a Rc<NamedType>,
    inlining: Vec<Rc<NamedType>>,
}

impl<'a> Planner<'a> {
    pub fn new(subject: &'a Rc<NamedType>) -> Self {
        Self {
            subject,
            inlining: Vec::new(),
        }
    }

    /// Plans every field of the subject.
    pub fn plan_subject(&mut self) -> Result<Vec<FieldPlan>, Error> {
        let Type::Struct(st) = self.subject.underlying() else {
            return Err(Error::NotAStruct {
                package: self.subject.package().path.clone(),
                name: self.subject.name().to_string(),
                reason: "underlying type is not a struct".into(),
            });
        };
        self.inlining.push(self.subject.clone());
        let fields = self.plan_struct(&st, "");
        self.inlining.pop();
        fields
    }

    fn subject_package(&self) -> &PackageRef {
        self.subject.package()
    }

    fn is_local(&self, package: &PackageRef) -> bool {
        package.is_universe() || package.path == self.subject_package().path
    }

    fn plan_struct(&mut self, st: &StructType, prefix: &str) -> Result<Vec<FieldPlan>, Error> {
        let owner = self.inlining.last().cloned();
        let local = owner
            .as_ref()
            .map_or(true, |owner| self.is_local(owner.package()));
        let mut plans = Vec::new();
        for field in &st.fields {
            if field.name == "_" {
                continue;
            }
            let tagged = field
                .tag
                .as_deref()
                .and_then(|raw| tag::lookup(raw, TAG_KEY));
            if tagged.as_deref() == Some("-") {
                continue;
            }
            let key = tagged
                .filter(|key| !key.is_empty())
                .unwrap_or_else(|| field.name.clone());
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            if !local && !field.is_exported() {
                let owner = owner
                    .as_ref()
                    .map(|owner| owner.qualified_name())
                    .unwrap_or_default();
                return Err(unsupported(&path, format!("unexported field {} of {owner}", field.name)));
            }
            let node = self.plan(&field.ty, &path)?;
            plans.push(FieldPlan {
                name: field.name.clone(),
                key,
                path,
                node,
            });
        }
        Ok(plans)
    }

    fn plan(&mut self, ty: &Type, path: &str) -> Result<Node, Error> {
        self.check_spellable(ty, path)?;
        let node = |decode| Node {
            ty: ty.clone(),
            decode,
        };
        if let Type::Named(named, _) = ty {
            if Rc::ptr_eq(named, self.subject) || has_unmarshal_method(named) {
                return Ok(node(Decode::Delegate));
            }
            if named.is_opaque() {
                return Ok(node(Decode::Assert));
            }
        }
        let decode = match ty.underlying() {
            Type::Basic(kind) => match kind {
                BasicKind::Complex64 | BasicKind::Complex128 | BasicKind::UnsafePointer => {
                    return Err(unsupported(path, kind.name()))
                }
                kind => Decode::Scalar(kind),
            },
            Type::Interface(iface) => {
                let constraint = iface
                    .embedded
                    .iter()
                    .any(|embedded| matches!(embedded.underlying(), Type::Union(_) | Type::Basic(_)));
                if iface.comparable || constraint {
                    return Err(unsupported(path, "constraint interface"));
                }
                if iface.is_empty() {
                    Decode::Any
                } else {
                    Decode::Assert
                }
            }
            Type::Pointer(elem) => Decode::Pointer(Box::new(self.plan(&elem, path)?)),
            Type::Slice(elem) => Decode::Slice(Box::new(self.plan(&elem, &format!("{path}[]"))?)),
            Type::Array(_, elem) => Decode::Array(Box::new(self.plan(&elem, &format!("{path}[]"))?)),
            Type::Map(key, value) => {
                if !matches!(key.underlying(), Type::Basic(BasicKind::String)) {
                    return Err(unsupported(path, format!("map with {key} keys")));
                }
                Decode::Map(Box::new(self.plan(&value, &format!("{path}[]"))?))
            }
            Type::Struct(st) => match ty {
                Type::Named(named, _) => {
                    if self.inlining.iter().any(|open| Rc::ptr_eq(open, named)) {
                        return Err(unsupported(
                            path,
                            format!("recursive struct {}", named.qualified_name()),
                        ));
                    }
                    self.inlining.push(named.clone());
                    let fields = self.plan_struct(&st, path);
                    self.inlining.pop();
                    Decode::Inline(fields?)
                }
                _ => Decode::Inline(self.plan_struct(&st, path)?),
            },
            Type::Chan(..) => return Err(unsupported(path, "chan")),
            Type::Signature(_) => return Err(unsupported(path, "func")),
            Type::TypeParam(param) => {
                return Err(unsupported(path, format!("type parameter {}", param.name)))
            }
            Type::Union(_) => return Err(unsupported(path, "union")),
            Type::Opaque | Type::Invalid | Type::Named(..) => {
                return Err(unsupported(path, format!("unknown type {ty}")))
            }
        };
        Ok(node(decode))
    }

    /// Generated code must be able to name `ty` from the subject package.
    fn check_spellable(&self, ty: &Type, path: &str) -> Result<(), Error> {
        match ty {
            Type::Named(named, args) => {
                if !self.is_local(named.package()) && !is_exported(named.name()) {
                    return Err(unsupported(
                        path,
                        format!("unexported type {}", named.qualified_name()),
                    ));
                }
                args.iter().try_for_each(|arg| self.check_spellable(arg, path))
            }
            Type::Pointer(elem) | Type::Slice(elem) | Type::Array(_, elem) | Type::Chan(_, elem) => {
                self.check_spellable(elem, path)
            }
            Type::Map(key, value) => {
                self.check_spellable(key, path)?;
                self.check_spellable(value, path)
            }
            Type::TypeParam(param) => Err(unsupported(path, format!("type parameter {}", param.name))),
            _ => Ok(()),
        }
    }
}

/// Whether `named` declares `UnmarshalMap(map[string]interface{}) error`.
/// A method of that name with any other signature is not called.
fn has_unmarshal_method(named: &NamedType) -> bool {
    let Some(method) = named.method(METHOD_NAME) else {
        return false;
    };
    let signature = &method.signature;
    let [param] = signature.params.as_slice() else {
        return false;
    };
    let [result] = signature.results.as_slice() else {
        return false;
    };
    let takes_generic_map = match param.ty.underlying() {
        Type::Map(key, value) => {
            matches!(*key, Type::Basic(BasicKind::String))
                && matches!(&*value, Type::Interface(iface) if iface.is_empty())
        }
        _ => false,
    };
    !signature.variadic && takes_generic_map && universe::is_error_type(&result.ty)
}

fn unsupported(path: &str, kind: impl Into<String>) -> Error {
    Error::UnsupportedFieldKind {
        field: path.to_string(),
        kind: kind.into(),
    }
}
