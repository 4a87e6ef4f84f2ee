//! Import identities of generated code: which packages a type refers to,
//! what their public path is once re-vendoring is undone, and which local
//! name each of them is imported under.

use crate::language::typecheck::{NamedType, PackageRef, Signature, Type};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    rc::Rc,
};

pub const DEFAULT_REVENDOR_SEGMENT: &str = "vendor";

/// A package as seen by a declaration: its path and its display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportRef {
    pub path: String,
    pub name: String,
}

impl ImportRef {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }
}

impl From<&PackageRef> for ImportRef {
    fn from(package: &PackageRef) -> Self {
        Self::new(package.path.clone(), package.name.clone())
    }
}

/// Collects the foreign packages a type depends on and maps vendored paths
/// back to their public identity.
#[derive(Debug, Clone)]
pub struct Normalizer {
    subject: String,
    segments: Vec<String>,
}

impl Normalizer {
    /// `subject` is the path of the package the generated code lives in; its
    /// own types never need an import.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            segments: vec![DEFAULT_REVENDOR_SEGMENT.to_string()],
        }
    }

    pub fn with_segments(mut self, segments: Vec<String>) -> Self {
        if !segments.is_empty() {
            self.segments = segments;
        }
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Packages of every named type reachable from `named`, in the order
    /// they are first met.
    pub fn collect(&self, named: &Rc<NamedType>) -> Vec<ImportRef> {
        let mut walker = Walker {
            subject: &self.subject,
            visited: HashSet::new(),
            recorded: HashSet::new(),
            found: Vec::new(),
        };
        walker.named(named, &[]);
        walker.found
    }

    /// Strips everything up to and including the last re-vendoring segment.
    pub fn canonicalize(&self, import: &ImportRef) -> ImportRef {
        let elements: Vec<&str> = import.path.split('/').collect();
        let cut = elements
            .iter()
            .enumerate()
            .rev()
            .find(|(idx, element)| {
                *idx + 1 < elements.len() && self.segments.iter().any(|segment| segment == *element)
            })
            .map(|(idx, _)| idx + 1);
        match cut {
            Some(start) => ImportRef::new(elements[start..].join("/"), import.name.clone()),
            None => import.clone(),
        }
    }
}

struct Walker<'a> {
    subject: &'a str,
    visited: HashSet<*const NamedType>,
    recorded: HashSet<String>,
    found: Vec<ImportRef>,
}

impl Walker<'_> {
    fn named(&mut self, named: &Rc<NamedType>, args: &[Type]) {
        for arg in args {
            self.ty(arg);
        }
        if !self.visited.insert(Rc::as_ptr(named)) {
            return;
        }
        let package = named.package();
        if !package.is_universe()
            && package.path != self.subject
            && self.recorded.insert(package.path.clone())
        {
            self.found.push(ImportRef::from(package));
        }
        self.ty(&named.underlying());
    }

    fn ty(&mut self, ty: &Type) {
        match ty {
            Type::Named(named, args) => self.named(named, args),
            Type::Pointer(elem) | Type::Slice(elem) | Type::Array(_, elem) | Type::Chan(_, elem) => {
                self.ty(elem)
            }
            Type::Map(key, value) => {
                self.ty(key);
                self.ty(value);
            }
            Type::Signature(sig) => self.signature(sig),
            Type::Struct(st) => {
                for field in &st.fields {
                    self.ty(&field.ty);
                }
            }
            Type::Interface(iface) => {
                for method in &iface.methods {
                    self.signature(&method.signature);
                }
                for embedded in &iface.embedded {
                    self.ty(embedded);
                }
            }
            Type::Union(terms) => {
                for term in terms {
                    self.ty(&term.ty);
                }
            }
            Type::TypeParam(_) | Type::Basic(_) | Type::Opaque | Type::Invalid => {}
        }
    }

    fn signature(&mut self, sig: &Signature) {
        for param in sig.params.iter().chain(&sig.results) {
            self.ty(&param.ty);
        }
    }
}

/// Canonical path to unique local alias.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    by_path: HashMap<String, String>,
    taken: HashSet<String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps `name` from ever being handed out.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.taken.insert(name.into());
    }

    /// Binds `path` to `alias` ahead of any collision handling. Returns false
    /// when either side is already in use.
    pub fn bind(&mut self, path: impl Into<String>, alias: impl Into<String>) -> bool {
        let path = path.into();
        let alias = alias.into();
        if self.by_path.contains_key(&path) || self.taken.contains(&alias) {
            return false;
        }
        self.taken.insert(alias.clone());
        self.by_path.insert(path, alias);
        true
    }

    /// Alias of an already canonical import; the same path always gets the
    /// same alias.
    pub fn alias(&mut self, import: &ImportRef) -> String {
        if let Some(alias) = self.by_path.get(&import.path) {
            return alias.clone();
        }
        let base = natural_name(import);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{base}{suffix}");
            suffix += 1;
        }
        self.taken.insert(candidate.clone());
        self.by_path.insert(import.path.clone(), candidate.clone());
        candidate
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.by_path.get(path).map(String::as_str)
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    /// Path to alias, sorted by path.
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.by_path
            .iter()
            .map(|(path, alias)| (path.clone(), alias.clone()))
            .collect()
    }
}

/// The display name when it is a usable identifier, otherwise the last path
/// element made into one.
fn natural_name(import: &ImportRef) -> String {
    if is_identifier(&import.name) && import.name != "_" {
        return import.name.clone();
    }
    let last = import.path.rsplit('/').next().unwrap_or_default();
    let mut name: String = last
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() {
        name.push_str("pkg");
    } else if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Collects, canonicalises and aliases the imports needed by a set of types.
#[derive(Debug, Clone)]
pub struct ImportSet {
    normalizer: Normalizer,
    aliases: AliasTable,
    imports: BTreeMap<String, String>,
}

impl ImportSet {
    pub fn new(subject: impl Into<String>) -> Self {
        Self::with_normalizer(Normalizer::new(subject))
    }

    pub fn with_normalizer(normalizer: Normalizer) -> Self {
        Self {
            normalizer,
            aliases: AliasTable::new(),
            imports: BTreeMap::new(),
        }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn reserve(&mut self, name: impl Into<String>) {
        self.aliases.reserve(name);
    }

    /// Imports `path` under `alias` exactly, e.g. `fmt` for generated code.
    pub fn require(&mut self, path: &str, alias: &str) {
        self.aliases.bind(path, alias);
        if let Some(bound) = self.aliases.get(path) {
            self.imports.insert(path.to_string(), bound.to_string());
        }
    }

    /// Records every package `named` depends on.
    pub fn add_imports_from(&mut self, named: &Rc<NamedType>) {
        for import in self.normalizer.collect(named) {
            self.add(&import);
        }
    }

    /// Records one import, returning its alias.
    pub fn add(&mut self, import: &ImportRef) -> String {
        let canonical = self.normalizer.canonicalize(import);
        let alias = self.aliases.alias(&canonical);
        self.imports.insert(canonical.path, alias.clone());
        alias
    }

    /// Alias for the package a type was declared in, `None` for the subject
    /// package and the universe.
    pub fn qualifier(&self, package: &PackageRef) -> Option<String> {
        if package.is_universe() || package.path == self.normalizer.subject {
            return None;
        }
        let canonical = self.normalizer.canonicalize(&ImportRef::from(package));
        self.aliases.get(&canonical.path).map(str::to_string)
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.aliases.is_taken(name)
    }

    /// Canonical path to alias, sorted by path.
    pub fn imports(&self) -> &BTreeMap<String, String> {
        &self.imports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::typecheck::{BasicKind, Field, StructType};

    fn named(path: &str, pkg: &str, name: &str, underlying: Type) -> Rc<NamedType> {
        let named = NamedType::new(Rc::new(PackageRef::new(path, pkg)), name, Vec::new());
        named.set_underlying(underlying);
        named.set_methods(Vec::new());
        Rc::new(named)
    }

    fn field(name: &str, ty: Type) -> Field {
        Field {
            name: name.to_string(),
            ty,
            embedded: false,
            tag: None,
        }
    }

    #[test]
    fn vendored_paths_are_devendorized() {
        let mut set = ImportSet::new("github.com/tboehle/gogen/imports");
        let mock = named(
            "github.com/tboehle/gogen/vendor/github.com/stretchr/testify/mock",
            "mock",
            "Mock",
            Type::Struct(Rc::new(StructType::default())),
        );
        let subject = named(
            "github.com/tboehle/gogen/imports",
            "imports",
            "Subject",
            Type::Struct(Rc::new(StructType {
                fields: vec![field("M", Type::Named(mock, Vec::new()))],
            })),
        );
        set.add_imports_from(&subject);
        let expected: BTreeMap<String, String> =
            [("github.com/stretchr/testify/mock".to_string(), "mock".to_string())].into();
        assert_eq!(set.imports(), &expected);
    }

    #[test]
    fn canonicalize_matches_whole_elements_and_the_last_segment() {
        let normalizer = Normalizer::new("x");
        let canon = |path: &str| normalizer.canonicalize(&ImportRef::new(path, "p")).path;
        assert_eq!(canon("a/vendor/b/vendor/c/d"), "c/d");
        assert_eq!(canon("a/myvendor/b"), "a/myvendor/b");
        assert_eq!(canon("a/vendor"), "a/vendor");
        let custom = Normalizer::new("x").with_segments(vec!["third_party".into()]);
        assert_eq!(
            custom
                .canonicalize(&ImportRef::new("corp/third_party/github.com/x/y", "y"))
                .path,
            "github.com/x/y"
        );
    }

    #[test]
    fn aliases_are_unique_and_stable() {
        let mut table = AliasTable::new();
        table.reserve("fmt");
        let a = ImportRef::new("github.com/a/errors", "errors");
        let b = ImportRef::new("github.com/b/errors", "errors");
        let stdlib = ImportRef::new("errors", "errors");
        let fmt = ImportRef::new("github.com/c/fmt", "fmt");
        assert_eq!(table.alias(&a), "errors");
        assert_eq!(table.alias(&b), "errors2");
        assert_eq!(table.alias(&stdlib), "errors3");
        assert_eq!(table.alias(&a), "errors");
        assert_eq!(table.alias(&fmt), "fmt2");
        let aliases: HashSet<_> = table.entries().into_values().collect();
        assert_eq!(aliases.len(), 4);
    }

    #[test]
    fn unusable_display_names_fall_back_to_the_path() {
        let mut table = AliasTable::new();
        assert_eq!(table.alias(&ImportRef::new("gopkg.in/yaml.v2", "")), "yaml_v2");
        assert_eq!(table.alias(&ImportRef::new("example.com/9lives", "_")), "_9lives");
    }

    #[test]
    fn collect_terminates_on_recursive_types() {
        let pkg = Rc::new(PackageRef::new("example.com/list", "list"));
        let node = Rc::new(NamedType::new(pkg, "Node", Vec::new()));
        let other = named(
            "example.com/other",
            "other",
            "Value",
            Type::Basic(BasicKind::Int),
        );
        node.set_underlying(Type::Struct(Rc::new(StructType {
            fields: vec![
                field("Next", Type::Pointer(Box::new(Type::Named(node.clone(), Vec::new())))),
                field("Value", Type::Named(other, Vec::new())),
                field("Err", crate::language::typecheck::universe::error_type()),
            ],
        })));
        node.set_methods(Vec::new());

        let found = Normalizer::new("example.com/app").collect(&node);
        assert_eq!(
            found,
            vec![
                ImportRef::new("example.com/list", "list"),
                ImportRef::new("example.com/other", "other"),
            ]
        );
        assert_eq!(
            Normalizer::new("example.com/list").collect(&node),
            vec![ImportRef::new("example.com/other", "other")]
        );
    }
}
