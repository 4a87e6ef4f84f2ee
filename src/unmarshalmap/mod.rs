//! Generates `UnmarshalMap(map[string]interface{}) error` for a struct type
//! and a `_test.go` file exercising it.

mod emit;
mod emit_test;
pub mod fields;
mod writer;

use crate::{
    error::Error,
    imports::{ImportSet, Normalizer},
    language::typecheck::{NamedType, Object, Package, Type},
    project::Resolver,
};
use emit::{MethodEmitter, PARAM, RECEIVER};
use emit_test::TestEmitter;
use fields::{FieldPlan, Planner};
use std::rc::Rc;
use tracing::debug;

pub const HEADER: &str = "// Code generated by gounmarshalmap. DO NOT EDIT.";

pub struct Generator {
    package: Rc<Package>,
    named: Rc<NamedType>,
    normalizer: Normalizer,
}

impl Generator {
    /// Resolves `package` from source and looks up `struct_name` in it.
    pub fn new(resolver: &mut Resolver, package: &str, struct_name: &str) -> Result<Self, Error> {
        let package = resolver.resolve_source(package)?;
        let not_a_struct = |reason: &str| Error::NotAStruct {
            package: package.path().to_string(),
            name: struct_name.to_string(),
            reason: reason.to_string(),
        };
        let named = match package.lookup(struct_name) {
            Some(Object::Type(named)) => named,
            Some(Object::Alias(alias)) => match alias.target().named() {
                Some(named) if named.package().path == package.path() => named.clone(),
                _ => return Err(not_a_struct("alias of a type declared elsewhere")),
            },
            Some(other) => return Err(not_a_struct(&format!("it is a {}", other.kind_name()))),
            None => {
                return Err(Error::NotFound {
                    package: package.path().to_string(),
                    name: struct_name.to_string(),
                })
            }
        };
        if !named.type_params().is_empty() {
            return Err(not_a_struct("generic types are not supported"));
        }
        if !matches!(named.underlying(), Type::Struct(_)) {
            return Err(not_a_struct("underlying type is not a struct"));
        }
        debug!(package = package.path(), name = struct_name, "subject found");
        Ok(Self {
            normalizer: Normalizer::new(package.path()),
            package,
            named,
        })
    }

    /// Re-vendoring segments stripped from import paths; `vendor` when empty.
    pub fn with_revendor_segments(mut self, segments: Vec<String>) -> Self {
        self.normalizer = Normalizer::new(self.package.path()).with_segments(segments);
        self
    }

    pub fn package(&self) -> &Rc<Package> {
        &self.package
    }

    pub fn subject(&self) -> &Rc<NamedType> {
        &self.named
    }

    /// A fresh import set seeded with every package the subject depends on.
    /// `fmt` keeps its own name; package-level names and the method's
    /// parameter names are never used as aliases.
    pub fn import_set(&self) -> ImportSet {
        let mut imports = ImportSet::with_normalizer(self.normalizer.clone());
        imports.require("fmt", "fmt");
        for name in self.package_scope_names() {
            imports.reserve(name);
        }
        imports.reserve(RECEIVER);
        imports.reserve(PARAM);
        imports.add_imports_from(&self.named);
        imports
    }

    fn package_scope_names(&self) -> Vec<String> {
        let package = &self.package;
        package
            .types()
            .iter()
            .map(|named| named.name().to_string())
            .chain(package.aliases().iter().map(|alias| alias.name.clone()))
            .chain(
                package
                    .funcs()
                    .iter()
                    .filter(|func| func.recv.is_none())
                    .map(|func| func.name.clone()),
            )
            .chain(package.values().iter().map(|value| value.name.clone()))
            .collect()
    }

    fn plan(&self) -> Result<Vec<FieldPlan>, Error> {
        Planner::new(&self.named).plan_subject()
    }

    /// Source of the file holding the `UnmarshalMap` method.
    pub fn generate(&self) -> Result<Vec<u8>, Error> {
        let fields = self.plan()?;
        let imports = self.import_set();
        debug!(
            name = self.named.name(),
            fields = fields.len(),
            imports = imports.imports().len(),
            "generating method"
        );
        Ok(MethodEmitter::new(&self.named, &imports)
            .emit(&fields)
            .into_bytes())
    }

    /// Source of the companion test file.
    pub fn generate_test(&self) -> Result<Vec<u8>, Error> {
        let fields = self.plan()?;
        debug!(name = self.named.name(), fields = fields.len(), "generating test");
        Ok(TestEmitter::new(&self.named).emit(&fields).into_bytes())
    }
}
