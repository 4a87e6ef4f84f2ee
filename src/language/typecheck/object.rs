use crate::language::{ast::is_exported, types::ChanDir};
use std::{
    cell::{OnceCell, RefCell},
    collections::{HashMap, HashSet},
    fmt,
    path::PathBuf,
    rc::Rc,
};

/// Identity of a package as seen by the types declared in it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackageRef {
    pub path: String,
    pub name: String,
}

impl PackageRef {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }

    pub fn is_universe(&self) -> bool {
        self.path.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    String,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    UnsafePointer,
}

impl BasicKind {
    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::String => "string",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::Complex64 => "complex64",
            BasicKind::Complex128 => "complex128",
            BasicKind::UnsafePointer => "unsafe.Pointer",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            BasicKind::Int
                | BasicKind::Int8
                | BasicKind::Int16
                | BasicKind::Int32
                | BasicKind::Int64
                | BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, BasicKind::Float32 | BasicKind::Float64)
    }

    pub fn is_complex(self) -> bool {
        matches!(self, BasicKind::Complex64 | BasicKind::Complex128)
    }
}

#[derive(Clone, Debug)]
pub enum Type {
    Basic(BasicKind),
    /// A declared type, with type arguments when instantiated.
    Named(Rc<NamedType>, Vec<Type>),
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Array(String, Box<Type>),
    Map(Box<Type>, Box<Type>),
    Chan(ChanDir, Box<Type>),
    Signature(Rc<Signature>),
    Struct(Rc<StructType>),
    Interface(Rc<InterfaceType>),
    Union(Vec<Term>),
    TypeParam(Rc<TypeParam>),
    /// Structure unknown: the declaring package was only available opaquely.
    Opaque,
    /// Placeholder after a reported error.
    Invalid,
}

impl Type {
    /// The underlying type; type arguments of an instantiated named type are
    /// substituted into its declaration.
    pub fn underlying(&self) -> Type {
        match self {
            Type::Named(named, args) => {
                let underlying = named.underlying();
                if args.is_empty() || named.type_params().is_empty() {
                    underlying
                } else {
                    underlying.subst(named.type_params(), args)
                }
            }
            other => other.clone(),
        }
    }

    pub fn named(&self) -> Option<&Rc<NamedType>> {
        match self {
            Type::Named(named, _) => Some(named),
            _ => None,
        }
    }

    pub fn type_args(&self) -> &[Type] {
        match self {
            Type::Named(_, args) => args,
            _ => &[],
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    pub fn subst(&self, params: &[Rc<TypeParam>], args: &[Type]) -> Type {
        match self {
            Type::TypeParam(param) => params
                .iter()
                .position(|candidate| Rc::ptr_eq(candidate, param))
                .and_then(|idx| args.get(idx).cloned())
                .unwrap_or_else(|| self.clone()),
            Type::Named(named, named_args) => Type::Named(
                named.clone(),
                named_args
                    .iter()
                    .map(|arg| arg.subst(params, args))
                    .collect(),
            ),
            Type::Pointer(elem) => Type::Pointer(Box::new(elem.subst(params, args))),
            Type::Slice(elem) => Type::Slice(Box::new(elem.subst(params, args))),
            Type::Array(len, elem) => Type::Array(len.clone(), Box::new(elem.subst(params, args))),
            Type::Map(key, value) => Type::Map(
                Box::new(key.subst(params, args)),
                Box::new(value.subst(params, args)),
            ),
            Type::Chan(dir, elem) => Type::Chan(*dir, Box::new(elem.subst(params, args))),
            Type::Signature(sig) => Type::Signature(Rc::new(sig.subst(params, args))),
            Type::Struct(st) => Type::Struct(Rc::new(StructType {
                fields: st
                    .fields
                    .iter()
                    .map(|field| Field {
                        ty: field.ty.subst(params, args),
                        ..field.clone()
                    })
                    .collect(),
            })),
            Type::Interface(iface) => Type::Interface(Rc::new(InterfaceType {
                methods: iface
                    .methods
                    .iter()
                    .map(|method| Method {
                        name: method.name.clone(),
                        signature: Rc::new(method.signature.subst(params, args)),
                    })
                    .collect(),
                embedded: iface
                    .embedded
                    .iter()
                    .map(|ty| ty.subst(params, args))
                    .collect(),
                comparable: iface.comparable,
            })),
            Type::Union(terms) => Type::Union(
                terms
                    .iter()
                    .map(|term| Term {
                        tilde: term.tilde,
                        ty: term.ty.subst(params, args),
                    })
                    .collect(),
            ),
            Type::Basic(_) | Type::Opaque | Type::Invalid => self.clone(),
        }
    }

    /// Whether values of this type may be map keys.
    pub fn is_comparable(&self) -> bool {
        self.comparable_inner(&mut HashSet::new())
    }

    fn comparable_inner(&self, seen: &mut HashSet<*const NamedType>) -> bool {
        match self {
            Type::Named(named, _) => {
                if !seen.insert(Rc::as_ptr(named)) {
                    return true;
                }
                self.underlying().comparable_inner(seen)
            }
            Type::Slice(_) | Type::Map(..) | Type::Signature(_) => false,
            Type::Array(_, elem) => elem.comparable_inner(seen),
            Type::Struct(st) => st.fields.iter().all(|field| field.ty.comparable_inner(seen)),
            _ => true,
        }
    }

    /// Go spelling, qualifying foreign names through `qualify`.
    pub fn write(&self, out: &mut String, qualify: &dyn Fn(&PackageRef) -> Option<String>) {
        match self {
            Type::Basic(kind) => out.push_str(kind.name()),
            Type::Named(named, args) => {
                if let Some(prefix) = qualify(named.package()) {
                    out.push_str(&prefix);
                    out.push('.');
                }
                out.push_str(named.name());
                if !args.is_empty() {
                    out.push('[');
                    for (idx, arg) in args.iter().enumerate() {
                        if idx > 0 {
                            out.push_str(", ");
                        }
                        arg.write(out, qualify);
                    }
                    out.push(']');
                }
            }
            Type::Pointer(elem) => {
                out.push('*');
                elem.write(out, qualify);
            }
            Type::Slice(elem) => {
                out.push_str("[]");
                elem.write(out, qualify);
            }
            Type::Array(len, elem) => {
                out.push_str(&format!("[{len}]"));
                elem.write(out, qualify);
            }
            Type::Map(key, value) => {
                out.push_str("map[");
                key.write(out, qualify);
                out.push(']');
                value.write(out, qualify);
            }
            Type::Chan(dir, elem) => {
                out.push_str(match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                });
                elem.write(out, qualify);
            }
            Type::Signature(sig) => {
                out.push_str("func");
                sig.write(out, qualify);
            }
            Type::Struct(st) => {
                out.push_str("struct{");
                for (idx, field) in st.fields.iter().enumerate() {
                    if idx > 0 {
                        out.push_str("; ");
                    }
                    if !field.embedded {
                        out.push_str(&field.name);
                        out.push(' ');
                    }
                    field.ty.write(out, qualify);
                    if let Some(tag) = &field.tag {
                        out.push_str(&format!(" {tag:?}"));
                    }
                }
                out.push('}');
            }
            Type::Interface(iface) => {
                out.push_str("interface{");
                let mut first = true;
                for method in &iface.methods {
                    if !first {
                        out.push_str("; ");
                    }
                    first = false;
                    out.push_str(&method.name);
                    method.signature.write(out, qualify);
                }
                for embedded in &iface.embedded {
                    if !first {
                        out.push_str("; ");
                    }
                    first = false;
                    embedded.write(out, qualify);
                }
                out.push('}');
            }
            Type::Union(terms) => {
                for (idx, term) in terms.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(" | ");
                    }
                    if term.tilde {
                        out.push('~');
                    }
                    term.ty.write(out, qualify);
                }
            }
            Type::TypeParam(param) => out.push_str(&param.name),
            Type::Opaque => out.push_str("<opaque>"),
            Type::Invalid => out.push_str("invalid type"),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write(&mut out, &|pkg| {
            (!pkg.is_universe()).then(|| pkg.name.clone())
        });
        f.write_str(&out)
    }
}

/// A declared (defined) type.
pub struct NamedType {
    package: Rc<PackageRef>,
    name: String,
    type_params: Vec<Rc<TypeParam>>,
    underlying: OnceCell<Type>,
    methods: OnceCell<Vec<Rc<Func>>>,
}

impl NamedType {
    pub fn new(package: Rc<PackageRef>, name: impl Into<String>, type_params: Vec<Rc<TypeParam>>) -> Self {
        Self {
            package,
            name: name.into(),
            type_params,
            underlying: OnceCell::new(),
            methods: OnceCell::new(),
        }
    }

    /// A type whose structure is not known, only its name.
    pub fn opaque(package: Rc<PackageRef>, name: impl Into<String>) -> Self {
        let named = Self::new(package, name, Vec::new());
        let _ = named.underlying.set(Type::Opaque);
        let _ = named.methods.set(Vec::new());
        named
    }

    pub fn package(&self) -> &PackageRef {
        &self.package
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_params(&self) -> &[Rc<TypeParam>] {
        &self.type_params
    }

    pub fn underlying(&self) -> Type {
        self.underlying.get().cloned().unwrap_or(Type::Invalid)
    }

    pub fn is_underlying_set(&self) -> bool {
        self.underlying.get().is_some()
    }

    pub(crate) fn set_underlying(&self, ty: Type) {
        let _ = self.underlying.set(ty);
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self.underlying.get(), Some(Type::Opaque))
    }

    /// Methods declared with this type (or a pointer to it) as receiver.
    pub fn methods(&self) -> &[Rc<Func>] {
        self.methods.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn method(&self, name: &str) -> Option<&Rc<Func>> {
        self.methods().iter().find(|func| func.name == name)
    }

    pub(crate) fn set_methods(&self, methods: Vec<Rc<Func>>) {
        let _ = self.methods.set(methods);
    }

    pub fn is_exported(&self) -> bool {
        is_exported(&self.name)
    }

    pub fn qualified_name(&self) -> String {
        if self.package.is_universe() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package.path, self.name)
        }
    }
}

impl fmt::Debug for NamedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamedType({})", self.qualified_name())
    }
}

pub struct TypeParam {
    pub name: String,
    pub index: usize,
    constraint: OnceCell<Type>,
}

impl TypeParam {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            constraint: OnceCell::new(),
        }
    }

    pub fn constraint(&self) -> Type {
        self.constraint.get().cloned().unwrap_or(Type::Invalid)
    }

    pub(crate) fn set_constraint(&self, ty: Type) {
        let _ = self.constraint.set(ty);
    }
}

impl fmt::Debug for TypeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeParam({}#{})", self.name, self.index)
    }
}

#[derive(Clone, Debug)]
pub struct Term {
    pub tilde: bool,
    pub ty: Type,
}

#[derive(Clone, Debug)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub embedded: bool,
    pub tag: Option<String>,
}

impl Field {
    pub fn is_exported(&self) -> bool {
        is_exported(&self.name)
    }
}

#[derive(Clone, Debug, Default)]
pub struct StructType {
    pub fields: Vec<Field>,
}

#[derive(Clone, Debug)]
pub struct Method {
    pub name: String,
    pub signature: Rc<Signature>,
}

#[derive(Clone, Debug, Default)]
pub struct InterfaceType {
    pub methods: Vec<Method>,
    pub embedded: Vec<Type>,
    /// Set only for the predeclared `comparable` constraint.
    pub comparable: bool,
}

impl InterfaceType {
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.embedded.is_empty() && !self.comparable
    }

    /// Explicit and embedded methods, first declaration of a name wins.
    pub fn method_set(&self) -> Vec<Method> {
        let mut out = Vec::new();
        let mut seen_names = HashSet::new();
        let mut seen_types = HashSet::new();
        self.collect_methods(&mut out, &mut seen_names, &mut seen_types);
        out
    }

    fn collect_methods(
        &self,
        out: &mut Vec<Method>,
        seen_names: &mut HashSet<String>,
        seen_types: &mut HashSet<*const NamedType>,
    ) {
        for method in &self.methods {
            if seen_names.insert(method.name.clone()) {
                out.push(method.clone());
            }
        }
        for embedded in &self.embedded {
            if let Some(named) = embedded.named() {
                if !seen_types.insert(Rc::as_ptr(named)) {
                    continue;
                }
            }
            if let Type::Interface(inner) = embedded.underlying() {
                inner.collect_methods(out, seen_names, seen_types);
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: Option<String>,
    pub ty: Type,
}

#[derive(Clone, Debug, Default)]
pub struct Signature {
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub variadic: bool,
}

impl Signature {
    fn subst(&self, params: &[Rc<TypeParam>], args: &[Type]) -> Signature {
        let map = |list: &[Param]| {
            list.iter()
                .map(|param| Param {
                    name: param.name.clone(),
                    ty: param.ty.subst(params, args),
                })
                .collect()
        };
        Signature {
            params: map(&self.params),
            results: map(&self.results),
            variadic: self.variadic,
        }
    }

    pub fn write(&self, out: &mut String, qualify: &dyn Fn(&PackageRef) -> Option<String>) {
        out.push('(');
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                out.push_str(", ");
            }
            if self.variadic && idx + 1 == self.params.len() {
                out.push_str("...");
                match &param.ty {
                    Type::Slice(elem) => elem.write(out, qualify),
                    other => other.write(out, qualify),
                }
            } else {
                param.ty.write(out, qualify);
            }
        }
        out.push(')');
        match self.results.as_slice() {
            [] => {}
            [single] => {
                out.push(' ');
                single.ty.write(out, qualify);
            }
            many => {
                out.push_str(" (");
                for (idx, result) in many.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(", ");
                    }
                    result.ty.write(out, qualify);
                }
                out.push(')');
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Receiver {
    pub pointer: bool,
    pub base: String,
}

#[derive(Debug)]
pub struct Func {
    pub name: String,
    pub recv: Option<Receiver>,
    pub type_params: Vec<Rc<TypeParam>>,
    pub signature: Rc<Signature>,
}

pub struct TypeAlias {
    pub name: String,
    target: OnceCell<Type>,
}

impl TypeAlias {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: OnceCell::new(),
        }
    }

    pub fn target(&self) -> Type {
        self.target.get().cloned().unwrap_or(Type::Invalid)
    }

    pub fn is_resolved(&self) -> bool {
        self.target.get().is_some()
    }

    pub(crate) fn set_target(&self, ty: Type) {
        let _ = self.target.set(ty);
    }
}

impl fmt::Debug for TypeAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeAlias({})", self.name)
    }
}

#[derive(Debug)]
pub struct Value {
    pub name: String,
    pub ty: Option<Type>,
}

#[derive(Clone, Debug)]
pub enum Object {
    Type(Rc<NamedType>),
    Alias(Rc<TypeAlias>),
    Func(Rc<Func>),
    Var(Rc<Value>),
    Const(Rc<Value>),
}

impl Object {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Object::Type(_) | Object::Alias(_) => "type",
            Object::Func(_) => "func",
            Object::Var(_) => "variable",
            Object::Const(_) => "constant",
        }
    }
}

/// A fully type-checked package. Immutable once built, apart from the
/// insert-only name table of opaque packages.
pub struct Package {
    reference: Rc<PackageRef>,
    scope: HashMap<String, Object>,
    types: Vec<Rc<NamedType>>,
    aliases: Vec<Rc<TypeAlias>>,
    funcs: Vec<Rc<Func>>,
    values: Vec<Rc<Value>>,
    imports: Vec<Rc<Package>>,
    files: Vec<PathBuf>,
    opaque: Option<RefCell<HashMap<String, Rc<NamedType>>>>,
}

pub(crate) struct PackageParts {
    pub reference: Rc<PackageRef>,
    pub scope: HashMap<String, Object>,
    pub types: Vec<Rc<NamedType>>,
    pub aliases: Vec<Rc<TypeAlias>>,
    pub funcs: Vec<Rc<Func>>,
    pub values: Vec<Rc<Value>>,
    pub imports: Vec<Rc<Package>>,
    pub files: Vec<PathBuf>,
}

impl Package {
    pub(crate) fn from_parts(parts: PackageParts) -> Self {
        Self {
            reference: parts.reference,
            scope: parts.scope,
            types: parts.types,
            aliases: parts.aliases,
            funcs: parts.funcs,
            values: parts.values,
            imports: parts.imports,
            files: parts.files,
            opaque: None,
        }
    }

    /// A package known only by path and name; exported type names are
    /// created on first lookup.
    pub fn opaque(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            reference: Rc::new(PackageRef::new(path, name)),
            scope: HashMap::new(),
            types: Vec::new(),
            aliases: Vec::new(),
            funcs: Vec::new(),
            values: Vec::new(),
            imports: Vec::new(),
            files: Vec::new(),
            opaque: Some(RefCell::new(HashMap::new())),
        }
    }

    /// A package with a fixed set of named types and nothing else.
    pub(crate) fn with_types(reference: Rc<PackageRef>, types: Vec<Rc<NamedType>>) -> Self {
        let scope = types
            .iter()
            .map(|named| (named.name().to_string(), Object::Type(named.clone())))
            .collect();
        Self {
            reference,
            scope,
            types,
            aliases: Vec::new(),
            funcs: Vec::new(),
            values: Vec::new(),
            imports: Vec::new(),
            files: Vec::new(),
            opaque: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.reference.path
    }

    pub fn name(&self) -> &str {
        &self.reference.name
    }

    pub fn reference(&self) -> &Rc<PackageRef> {
        &self.reference
    }

    pub fn is_opaque(&self) -> bool {
        self.opaque.is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<Object> {
        if let Some(object) = self.scope.get(name) {
            return Some(object.clone());
        }
        let table = self.opaque.as_ref()?;
        if !is_exported(name) {
            return None;
        }
        let mut table = table.borrow_mut();
        let named = table
            .entry(name.to_string())
            .or_insert_with(|| Rc::new(NamedType::opaque(self.reference.clone(), name)))
            .clone();
        Some(Object::Type(named))
    }

    pub fn named_type(&self, name: &str) -> Option<Rc<NamedType>> {
        match self.lookup(name)? {
            Object::Type(named) => Some(named),
            _ => None,
        }
    }

    pub fn types(&self) -> &[Rc<NamedType>] {
        &self.types
    }

    pub fn aliases(&self) -> &[Rc<TypeAlias>] {
        &self.aliases
    }

    /// Functions and methods in declaration order.
    pub fn funcs(&self) -> &[Rc<Func>] {
        &self.funcs
    }

    pub fn values(&self) -> &[Rc<Value>] {
        &self.values
    }

    pub fn imports(&self) -> &[Rc<Package>] {
        &self.imports
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Package")
            .field("path", &self.reference.path)
            .field("name", &self.reference.name)
            .field("types", &self.types.len())
            .field("funcs", &self.funcs.len())
            .field("opaque", &self.is_opaque())
            .finish()
    }
}
