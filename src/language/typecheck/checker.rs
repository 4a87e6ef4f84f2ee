use super::*;
use crate::language::{
    ast::{Decl, FuncDecl, Ident, TypeSpec, ValueSpec},
    types::{FieldDecl, FuncTypeExpr, InterfaceElem, TypeAnnotation, TypeExpr, TypeParamDecl},
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Type-checks the declarations of one package. Imports are requested from
/// `importer` as they are encountered.
pub fn check_package(
    path: &str,
    files: &[SourceFile],
    importer: &mut dyn Importer,
) -> Result<Package, TypeCheckError> {
    let Some(first) = files.first() else {
        return Err(TypeCheckError {
            package: path.to_string(),
            errors: Vec::new(),
        });
    };
    let reference = Rc::new(PackageRef::new(path, first.ast.package.name.clone()));
    let mut checker = Checker {
        reference,
        files,
        importer,
        scope: HashMap::new(),
        decl_sites: HashMap::new(),
        file_scopes: Vec::new(),
        type_decls: Vec::new(),
        decl_of: HashMap::new(),
        states: Vec::new(),
        resolving: Vec::new(),
        cycle_reported: HashSet::new(),
        imported: HashMap::new(),
        imports: Vec::new(),
        types: Vec::new(),
        aliases: Vec::new(),
        funcs: Vec::new(),
        func_objects: HashMap::new(),
        values: Vec::new(),
        value_objects: HashMap::new(),
        map_keys: Vec::new(),
        errors: Vec::new(),
    };
    checker.check_package_clauses();
    checker.collect_imports();
    checker.collect_declarations();
    checker.check_import_conflicts();
    checker.resolve_type_declarations();
    checker.check_functions();
    checker.check_values();
    checker.check_map_keys();

    if checker.errors.is_empty() {
        Ok(checker.finish())
    } else {
        Err(TypeCheckError {
            package: path.to_string(),
            errors: checker.errors,
        })
    }
}

#[derive(Clone)]
enum Entity {
    Type(Rc<NamedType>),
    Alias(Rc<TypeAlias>, usize),
    Func,
    Var,
    Const,
}

#[derive(Clone)]
enum DeclKind {
    Named(Rc<NamedType>),
    Alias(Rc<TypeAlias>),
}

#[derive(Clone)]
struct TypeDecl<'a> {
    kind: DeclKind,
    spec: &'a TypeSpec,
    file: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DeclState {
    Unresolved,
    Resolving,
    Resolved,
}

#[derive(Default)]
struct FileScope {
    imports: HashMap<String, Rc<Package>>,
    dot_imports: Vec<Rc<Package>>,
    failed: HashSet<String>,
    import_sites: Vec<(String, Span)>,
}

#[derive(Clone)]
struct Ctx {
    file: usize,
    params: Vec<Rc<TypeParam>>,
    /// Set below a pointer, slice, map, channel, function or interface,
    /// where a reference to a type under construction is legal.
    indirect: bool,
}

impl Ctx {
    fn new(file: usize, params: Vec<Rc<TypeParam>>) -> Self {
        Self {
            file,
            params,
            indirect: false,
        }
    }

    fn indirect(&self) -> Ctx {
        Ctx {
            indirect: true,
            ..self.clone()
        }
    }
}

struct Checker<'a> {
    reference: Rc<PackageRef>,
    files: &'a [SourceFile],
    importer: &'a mut dyn Importer,
    scope: HashMap<String, Entity>,
    decl_sites: HashMap<String, (usize, Span)>,
    file_scopes: Vec<FileScope>,
    type_decls: Vec<TypeDecl<'a>>,
    decl_of: HashMap<*const NamedType, usize>,
    states: Vec<DeclState>,
    resolving: Vec<usize>,
    cycle_reported: HashSet<usize>,
    imported: HashMap<String, Rc<Package>>,
    imports: Vec<Rc<Package>>,
    types: Vec<Rc<NamedType>>,
    aliases: Vec<Rc<TypeAlias>>,
    funcs: Vec<Rc<Func>>,
    func_objects: HashMap<String, Rc<Func>>,
    values: Vec<Rc<Value>>,
    value_objects: HashMap<String, Object>,
    map_keys: Vec<(Type, usize, Span)>,
    errors: Vec<TypeError>,
}

impl<'a> Checker<'a> {
    fn report(&mut self, file: usize, span: Span, message: impl Into<String>) {
        let err = TypeError::at(&self.files[file], span, message);
        self.errors.push(err);
    }

    fn site(&self, file: usize, span: Span) -> String {
        let (line, column) = line_col(&self.files[file].source, span.start);
        format!("{}:{line}:{column}", self.files[file].path.display())
    }

    fn check_package_clauses(&mut self) {
        let expected = self.reference.name.clone();
        for idx in 1..self.files.len() {
            let clause = &self.files[idx].ast.package;
            if clause.name != expected {
                let err = TypeError::at(
                    &self.files[idx],
                    clause.span,
                    format!("package {}; expected package {expected}", clause.name),
                )
                .with_help(format!(
                    "{} declares package {expected}",
                    self.files[0].path.display()
                ));
                self.errors.push(err);
            }
        }
    }

    fn collect_imports(&mut self) {
        let files = self.files;
        for file in files {
            let mut scope = FileScope::default();
            for spec in &file.ast.imports {
                let local = spec.name.as_ref().map(|name| name.name.clone());
                let package = match self.import(&spec.path) {
                    Ok(package) => package,
                    Err(err) => {
                        let fallback_name = spec
                            .path
                            .rsplit('/')
                            .next()
                            .unwrap_or(spec.path.as_str())
                            .to_string();
                        scope.failed.insert(local.clone().unwrap_or(fallback_name));
                        let err = TypeError::at(
                            file,
                            spec.span,
                            format!("could not import {} ({err})", spec.path),
                        )
                        .with_label("imported here")
                        .with_cause(err);
                        self.errors.push(err);
                        continue;
                    }
                };
                let name = match local.as_deref() {
                    Some("_") => continue,
                    Some(".") => {
                        scope.dot_imports.push(package);
                        continue;
                    }
                    Some(name) => name.to_string(),
                    None => package.name().to_string(),
                };
                if scope.imports.contains_key(&name) {
                    let err = TypeError::at(
                        file,
                        spec.span,
                        format!("{name} redeclared in this block"),
                    );
                    self.errors.push(err);
                    continue;
                }
                scope.import_sites.push((name.clone(), spec.span));
                scope.imports.insert(name, package);
            }
            self.file_scopes.push(scope);
            debug!(
                file = %file.path.display(),
                imports = file.ast.imports.len(),
                "imports resolved"
            );
        }
    }

    fn import(&mut self, path: &str) -> Result<Rc<Package>, ResolveError> {
        if let Some(package) = self.imported.get(path) {
            return Ok(package.clone());
        }
        let package = self.importer.import(path)?;
        self.imported.insert(path.to_string(), package.clone());
        if !self
            .imports
            .iter()
            .any(|known| Rc::ptr_eq(known, &package))
        {
            self.imports.push(package.clone());
        }
        Ok(package)
    }

    fn declare(&mut self, file: usize, ident: &Ident, entity: Entity) {
        if ident.is_blank() {
            return;
        }
        if let Some((other_file, other_span)) = self.decl_sites.get(&ident.name).copied() {
            let help = format!(
                "other declaration of {} at {}",
                ident.name,
                self.site(other_file, other_span)
            );
            let err = TypeError::at(
                &self.files[file],
                ident.span,
                format!("{} redeclared in this block", ident.name),
            )
            .with_help(help);
            self.errors.push(err);
            return;
        }
        self.decl_sites
            .insert(ident.name.clone(), (file, ident.span));
        self.scope.insert(ident.name.clone(), entity);
    }

    fn collect_declarations(&mut self) {
        let files = self.files;
        for (file_idx, file) in files.iter().enumerate() {
            for decl in &file.ast.decls {
                match decl {
                    Decl::Type(spec) => self.collect_type(file_idx, spec),
                    Decl::Func(func) => {
                        if func.recv.is_none() && func.name.name != "init" {
                            self.declare(file_idx, &func.name, Entity::Func);
                        }
                    }
                    Decl::Var(spec) => {
                        for name in &spec.names {
                            self.declare(file_idx, name, Entity::Var);
                        }
                    }
                    Decl::Const(spec) => {
                        for name in &spec.names {
                            self.declare(file_idx, name, Entity::Const);
                        }
                    }
                }
            }
        }
    }

    fn collect_type(&mut self, file: usize, spec: &'a TypeSpec) {
        let idx = self.type_decls.len();
        if spec.alias {
            let alias = Rc::new(TypeAlias::new(spec.name.name.clone()));
            self.declare(file, &spec.name, Entity::Alias(alias.clone(), idx));
            self.aliases.push(alias.clone());
            self.type_decls.push(TypeDecl {
                kind: DeclKind::Alias(alias),
                spec,
                file,
            });
        } else {
            let params = new_type_params(&spec.type_params);
            let named = Rc::new(NamedType::new(
                self.reference.clone(),
                spec.name.name.clone(),
                params,
            ));
            self.declare(file, &spec.name, Entity::Type(named.clone()));
            self.decl_of.insert(Rc::as_ptr(&named), idx);
            self.types.push(named.clone());
            self.type_decls.push(TypeDecl {
                kind: DeclKind::Named(named),
                spec,
                file,
            });
        }
        self.states.push(DeclState::Unresolved);
    }

    fn check_import_conflicts(&mut self) {
        let mut conflicts = Vec::new();
        for (file_idx, scope) in self.file_scopes.iter().enumerate() {
            for (name, span) in &scope.import_sites {
                if let Some((decl_file, decl_span)) = self.decl_sites.get(name) {
                    conflicts.push((file_idx, *span, name.clone(), *decl_file, *decl_span));
                }
            }
        }
        for (file, span, name, decl_file, decl_span) in conflicts {
            let help = format!("{name} is declared at {}", self.site(decl_file, decl_span));
            let err = TypeError::at(
                &self.files[file],
                span,
                format!("{name} already declared through import of package"),
            )
            .with_help(help);
            self.errors.push(err);
        }
    }

    fn resolve_type_declarations(&mut self) {
        for idx in 0..self.type_decls.len() {
            self.resolve_decl(idx, false);
        }
    }

    fn resolve_decl(&mut self, idx: usize, indirect: bool) {
        if self.states[idx] != DeclState::Unresolved {
            return;
        }
        self.states[idx] = DeclState::Resolving;
        self.resolving.push(idx);
        let decl = self.type_decls[idx].clone();
        match &decl.kind {
            DeclKind::Named(named) => {
                let params = named.type_params().to_vec();
                self.resolve_constraints(decl.file, &decl.spec.type_params, &params);
                let ctx = Ctx::new(decl.file, params);
                let ty = self.resolve_type(&decl.spec.ty, &ctx);
                let underlying = match ty {
                    Type::TypeParam(_) => {
                        self.report(
                            decl.file,
                            decl.spec.ty.span,
                            "cannot use a type parameter as RHS in type declaration",
                        );
                        Type::Invalid
                    }
                    other => other.underlying(),
                };
                named.set_underlying(underlying);
            }
            DeclKind::Alias(alias) => {
                if !decl.spec.type_params.is_empty() {
                    self.report(
                        decl.file,
                        decl.spec.name.span,
                        "generic type alias declarations are not supported",
                    );
                }
                let ctx = Ctx {
                    indirect,
                    ..Ctx::new(decl.file, Vec::new())
                };
                let target = self.resolve_type(&decl.spec.ty, &ctx.indirect());
                alias.set_target(target.clone());
                if !indirect {
                    if let Some(named) = target.named() {
                        self.require_resolved(named, &ctx, &decl.spec.ty);
                    }
                }
            }
        }
        self.resolving.pop();
        self.states[idx] = DeclState::Resolved;
    }

    fn resolve_constraints(
        &mut self,
        file: usize,
        decls: &[TypeParamDecl],
        params: &[Rc<TypeParam>],
    ) {
        let ctx = Ctx::new(file, params.to_vec()).indirect();
        let mut next = params.iter();
        for decl in decls {
            let constraint = self.resolve_type(&decl.constraint, &ctx);
            for _ in &decl.names {
                if let Some(param) = next.next() {
                    param.set_constraint(constraint.clone());
                }
            }
        }
    }

    /// Reports a cycle when `named` is still being built and is referenced
    /// directly; builds it first when it has not been started.
    fn require_resolved(&mut self, named: &Rc<NamedType>, ctx: &Ctx, at: &TypeAnnotation) {
        if ctx.indirect {
            return;
        }
        let Some(idx) = self.decl_of.get(&Rc::as_ptr(named)).copied() else {
            return;
        };
        match self.states[idx] {
            DeclState::Resolved => {}
            DeclState::Unresolved => self.resolve_decl(idx, false),
            DeclState::Resolving => {
                if !self.cycle_reported.insert(idx) {
                    return;
                }
                let start = self
                    .resolving
                    .iter()
                    .position(|open| *open == idx)
                    .unwrap_or(0);
                let mut path: Vec<String> = self.resolving[start..]
                    .iter()
                    .map(|open| self.type_decls[*open].spec.name.name.clone())
                    .collect();
                path.push(named.name().to_string());
                let decl = &self.type_decls[idx];
                let err = TypeError::at(
                    &self.files[decl.file],
                    decl.spec.name.span,
                    format!("invalid recursive type {}", named.name()),
                )
                .with_label("type is part of a cycle")
                .with_help(format!(
                    "{} (referenced at {})",
                    path.join(" refers to "),
                    self.site(ctx.file, at.span)
                ));
                self.errors.push(err);
            }
        }
    }

    fn resolve_type(&mut self, ann: &TypeAnnotation, ctx: &Ctx) -> Type {
        match &ann.ty {
            TypeExpr::Named {
                qualifier: None,
                name,
                args,
            } => self.resolve_local_name(ann, name, args, ctx),
            TypeExpr::Named {
                qualifier: Some(qualifier),
                name,
                args,
            } => self.resolve_qualified(ann, qualifier, name, args, ctx),
            TypeExpr::Pointer(inner) => {
                Type::Pointer(Box::new(self.resolve_type(inner, &ctx.indirect())))
            }
            TypeExpr::Slice(inner) => Type::Slice(Box::new(self.resolve_type(inner, &ctx.indirect()))),
            TypeExpr::Array { len, elem } => {
                Type::Array(len.clone(), Box::new(self.resolve_type(elem, ctx)))
            }
            TypeExpr::Map { key, value } => {
                let inner = ctx.indirect();
                let key_ty = self.resolve_type(key, &inner);
                let value_ty = self.resolve_type(value, &inner);
                self.map_keys.push((key_ty.clone(), ctx.file, key.span));
                Type::Map(Box::new(key_ty), Box::new(value_ty))
            }
            TypeExpr::Chan { dir, elem } => {
                Type::Chan(*dir, Box::new(self.resolve_type(elem, &ctx.indirect())))
            }
            TypeExpr::Func(signature) => {
                Type::Signature(Rc::new(self.resolve_signature(signature, &ctx.indirect())))
            }
            TypeExpr::Struct(fields) => self.resolve_struct(fields, ctx),
            TypeExpr::Interface(elems) => self.resolve_interface(elems, &ctx.indirect()),
            TypeExpr::Union(terms) => {
                let inner = ctx.indirect();
                Type::Union(
                    terms
                        .iter()
                        .map(|term| Term {
                            tilde: term.tilde,
                            ty: self.resolve_type(&term.ty, &inner),
                        })
                        .collect(),
                )
            }
        }
    }

    fn resolve_local_name(
        &mut self,
        ann: &TypeAnnotation,
        name: &Ident,
        args: &[TypeAnnotation],
        ctx: &Ctx,
    ) -> Type {
        if let Some(param) = ctx.params.iter().find(|param| param.name == name.name) {
            if !args.is_empty() {
                self.report(ctx.file, name.span, format!("{} is not a generic type", name.name));
                return Type::Invalid;
            }
            return Type::TypeParam(param.clone());
        }

        if let Some(entity) = self.scope.get(&name.name).cloned() {
            return match entity {
                Entity::Type(named) => {
                    self.require_resolved(&named, ctx, ann);
                    self.instantiate(named, name, args, ctx)
                }
                Entity::Alias(alias, idx) => {
                    if self.states[idx] == DeclState::Resolving && !alias.is_resolved() {
                        self.report(
                            ctx.file,
                            name.span,
                            format!("invalid recursive type alias {}", name.name),
                        );
                        return Type::Invalid;
                    }
                    self.resolve_decl(idx, ctx.indirect);
                    if !args.is_empty() {
                        self.report(
                            ctx.file,
                            name.span,
                            format!("{} is not a generic type", name.name),
                        );
                        return Type::Invalid;
                    }
                    let target = alias.target();
                    if let Some(named) = target.named() {
                        self.require_resolved(named, ctx, ann);
                    }
                    target
                }
                Entity::Func | Entity::Var | Entity::Const => {
                    self.report(ctx.file, name.span, format!("{} is not a type", name.name));
                    Type::Invalid
                }
            };
        }

        let dot_imports = self.file_scopes[ctx.file].dot_imports.clone();
        for package in dot_imports {
            if !name.is_exported() {
                break;
            }
            if let Some(object) = package.lookup(&name.name) {
                return self.foreign_type(object, &name.name, name, args, ctx);
            }
        }

        if let Some(ty) = universe::lookup(&name.name) {
            if !args.is_empty() {
                self.report(ctx.file, name.span, format!("{} is not a generic type", name.name));
                return Type::Invalid;
            }
            return ty;
        }

        if universe::is_value(&name.name) {
            self.report(ctx.file, name.span, format!("{} is not a type", name.name));
        } else if self.file_scopes[ctx.file].imports.contains_key(&name.name) {
            self.report(
                ctx.file,
                name.span,
                format!("use of package {} without selector", name.name),
            );
        } else if !self.file_scopes[ctx.file].failed.contains(&name.name) {
            self.report(ctx.file, name.span, format!("undefined: {}", name.name));
        }
        Type::Invalid
    }

    fn resolve_qualified(
        &mut self,
        _ann: &TypeAnnotation,
        qualifier: &Ident,
        name: &Ident,
        args: &[TypeAnnotation],
        ctx: &Ctx,
    ) -> Type {
        let scope = &self.file_scopes[ctx.file];
        let Some(package) = scope.imports.get(&qualifier.name).cloned() else {
            if !scope.failed.contains(&qualifier.name) {
                self.report(ctx.file, qualifier.span, format!("undefined: {}", qualifier.name));
            }
            return Type::Invalid;
        };
        let display = format!("{}.{}", qualifier.name, name.name);
        if !name.is_exported() {
            let err = TypeError::at(
                &self.files[ctx.file],
                name.span,
                format!(
                    "name {} not exported by package {}",
                    name.name,
                    package.name()
                ),
            )
            .with_help("only identifiers starting with an upper-case letter are visible to importers");
            self.errors.push(err);
            return Type::Invalid;
        }
        match package.lookup(&name.name) {
            Some(object) => self.foreign_type(object, &display, name, args, ctx),
            None => {
                self.report(ctx.file, name.span, format!("undefined: {display}"));
                Type::Invalid
            }
        }
    }

    fn foreign_type(
        &mut self,
        object: Object,
        display: &str,
        name: &Ident,
        args: &[TypeAnnotation],
        ctx: &Ctx,
    ) -> Type {
        match object {
            Object::Type(named) => self.instantiate(named, name, args, ctx),
            Object::Alias(alias) => alias.target(),
            other => {
                self.report(
                    ctx.file,
                    name.span,
                    format!("{display} is not a type (it is a {})", other.kind_name()),
                );
                Type::Invalid
            }
        }
    }

    fn instantiate(
        &mut self,
        named: Rc<NamedType>,
        name: &Ident,
        args: &[TypeAnnotation],
        ctx: &Ctx,
    ) -> Type {
        let expected = named.type_params().len();
        if expected == 0 {
            if !args.is_empty() {
                self.report(ctx.file, name.span, format!("{} is not a generic type", name.name));
                return Type::Invalid;
            }
            return Type::Named(named, Vec::new());
        }
        if args.is_empty() {
            self.report(
                ctx.file,
                name.span,
                format!("cannot use generic type {} without instantiation", name.name),
            );
            return Type::Invalid;
        }
        if args.len() != expected {
            self.report(
                ctx.file,
                name.span,
                format!(
                    "got {} type arguments but {} has {expected} type parameters",
                    args.len(),
                    name.name
                ),
            );
            return Type::Invalid;
        }
        let inner = ctx.indirect();
        let args = args
            .iter()
            .map(|arg| self.resolve_type(arg, &inner))
            .collect();
        Type::Named(named, args)
    }

    fn resolve_struct(&mut self, decls: &[FieldDecl], ctx: &Ctx) -> Type {
        let mut fields = Vec::new();
        let mut seen: HashMap<String, Span> = HashMap::new();
        for decl in decls {
            let ty = self.resolve_type(&decl.ty, ctx);
            if decl.is_embedded() {
                let Some(base) = embedded_name(&decl.ty.ty) else {
                    continue;
                };
                self.check_embedded(&ty, &base, ctx);
                self.check_field_name(&mut seen, &base, ctx.file, decl.ty.span);
                fields.push(Field {
                    name: base.name.clone(),
                    ty,
                    embedded: true,
                    tag: decl.tag.clone(),
                });
                continue;
            }
            for ident in &decl.names {
                self.check_field_name(&mut seen, ident, ctx.file, ident.span);
                fields.push(Field {
                    name: ident.name.clone(),
                    ty: ty.clone(),
                    embedded: false,
                    tag: decl.tag.clone(),
                });
            }
        }
        Type::Struct(Rc::new(StructType { fields }))
    }

    fn check_field_name(
        &mut self,
        seen: &mut HashMap<String, Span>,
        ident: &Ident,
        file: usize,
        span: Span,
    ) {
        if ident.is_blank() {
            return;
        }
        if let Some(previous) = seen.get(&ident.name).copied() {
            let help = format!("other declaration of {} at {}", ident.name, self.site(file, previous));
            let err = TypeError::at(
                &self.files[file],
                span,
                format!("{} redeclared", ident.name),
            )
            .with_help(help);
            self.errors.push(err);
            return;
        }
        seen.insert(ident.name.clone(), span);
    }

    fn check_embedded(&mut self, ty: &Type, base: &Ident, ctx: &Ctx) {
        let (pointer, target) = match ty {
            Type::Pointer(inner) => (true, inner.as_ref()),
            other => (false, other),
        };
        match target {
            Type::TypeParam(_) => self.report(
                ctx.file,
                base.span,
                "embedded field type cannot be a (pointer to a) type parameter",
            ),
            Type::Named(named, _) if pointer && named.is_underlying_set() => {
                if matches!(target.underlying(), Type::Interface(_)) {
                    self.report(
                        ctx.file,
                        base.span,
                        "embedded field type cannot be a pointer to an interface",
                    );
                } else if matches!(target.underlying(), Type::Pointer(_)) {
                    self.report(
                        ctx.file,
                        base.span,
                        "embedded field type cannot be a pointer",
                    );
                }
            }
            _ => {}
        }
    }

    fn resolve_interface(&mut self, elems: &[InterfaceElem], ctx: &Ctx) -> Type {
        let mut methods: Vec<Method> = Vec::new();
        let mut embedded = Vec::new();
        for elem in elems {
            match elem {
                InterfaceElem::Method { name, signature } => {
                    let signature = self.resolve_signature(signature, ctx);
                    if methods.iter().any(|method| method.name == name.name) {
                        self.report(ctx.file, name.span, format!("duplicate method {}", name.name));
                        continue;
                    }
                    methods.push(Method {
                        name: name.name.clone(),
                        signature: Rc::new(signature),
                    });
                }
                InterfaceElem::Embedded(ann) => embedded.push(self.resolve_type(ann, ctx)),
            }
        }
        Type::Interface(Rc::new(InterfaceType {
            methods,
            embedded,
            comparable: false,
        }))
    }

    fn resolve_signature(&mut self, signature: &FuncTypeExpr, ctx: &Ctx) -> Signature {
        let count = signature.params.len();
        let mut params = Vec::with_capacity(count);
        for (idx, param) in signature.params.iter().enumerate() {
            let mut ty = self.resolve_type(&param.ty, ctx);
            if signature.variadic && idx + 1 == count {
                ty = Type::Slice(Box::new(ty));
            }
            params.push(Param {
                name: param.name.as_ref().map(|name| name.name.clone()),
                ty,
            });
        }
        let results = signature
            .results
            .iter()
            .map(|result| Param {
                name: result.name.as_ref().map(|name| name.name.clone()),
                ty: self.resolve_type(&result.ty, ctx),
            })
            .collect();
        Signature {
            params,
            results,
            variadic: signature.variadic,
        }
    }

    fn check_functions(&mut self) {
        let files = self.files;
        let mut methods: HashMap<*const NamedType, Vec<Rc<Func>>> = HashMap::new();
        for (file_idx, file) in files.iter().enumerate() {
            for decl in &file.ast.decls {
                let Decl::Func(func) = decl else {
                    continue;
                };
                match &func.recv {
                    Some(_) => self.check_method(file_idx, func, &mut methods),
                    None => self.check_function(file_idx, func),
                }
            }
        }
        for named in &self.types {
            named.set_methods(methods.remove(&Rc::as_ptr(named)).unwrap_or_default());
        }
    }

    fn check_function(&mut self, file: usize, decl: &FuncDecl) {
        let params = new_type_params(&decl.type_params);
        self.resolve_constraints(file, &decl.type_params, &params);
        let ctx = Ctx::new(file, params.clone()).indirect();
        let signature = self.resolve_signature(&decl.signature, &ctx);
        if decl.name.name == "init" || decl.name.name == "main" {
            if !signature.params.is_empty() || !signature.results.is_empty() {
                self.report(
                    file,
                    decl.name.span,
                    format!("func {} must have no arguments and no return values", decl.name.name),
                );
            }
        }
        if decl.name.name == "init" && !params.is_empty() {
            self.report(file, decl.name.span, "func init must have no type parameters");
        }
        if !decl.has_body {
            debug!(func = %decl.name.name, "function declared without body");
        }
        let func = Rc::new(Func {
            name: decl.name.name.clone(),
            recv: None,
            type_params: params,
            signature: Rc::new(signature),
        });
        if !decl.name.is_blank() && decl.name.name != "init" {
            self.func_objects
                .insert(func.name.clone(), func.clone());
        }
        self.funcs.push(func);
    }

    fn check_method(
        &mut self,
        file: usize,
        decl: &FuncDecl,
        methods: &mut HashMap<*const NamedType, Vec<Rc<Func>>>,
    ) {
        let Some(recv) = &decl.recv else {
            return;
        };
        let Some(base) = self.receiver_base(file, &recv.base) else {
            return;
        };

        let declared = base.type_params();
        let params: Vec<Rc<TypeParam>> = recv
            .type_args
            .iter()
            .enumerate()
            .map(|(idx, ident)| Rc::new(TypeParam::new(ident.name.clone(), idx)))
            .collect();
        if declared.is_empty() && !params.is_empty() {
            self.report(file, recv.base.span, format!("{} is not a generic type", base.name()));
            return;
        }
        if !declared.is_empty() && params.len() != declared.len() {
            self.report(
                file,
                recv.base.span,
                format!(
                    "receiver declares {} type parameters, but receiver base type declares {}",
                    params.len(),
                    declared.len()
                ),
            );
            return;
        }
        let args: Vec<Type> = params.iter().cloned().map(Type::TypeParam).collect();
        for (param, original) in params.iter().zip(declared) {
            param.set_constraint(original.constraint().subst(declared, &args));
        }

        if matches!(base.underlying(), Type::Pointer(_) | Type::Interface(_)) {
            self.report(
                file,
                recv.base.span,
                format!(
                    "invalid receiver type {} (pointer or interface type)",
                    base.name()
                ),
            );
            return;
        }

        let ctx = Ctx::new(file, params).indirect();
        let signature = self.resolve_signature(&decl.signature, &ctx);
        if decl.name.is_blank() {
            return;
        }
        let existing = methods.entry(Rc::as_ptr(&base)).or_default();
        if existing.iter().any(|method| method.name == decl.name.name) {
            self.report(
                file,
                decl.name.span,
                format!("method {}.{} already declared", base.name(), decl.name.name),
            );
            return;
        }
        if let Type::Struct(st) = base.underlying() {
            if st.fields.iter().any(|field| field.name == decl.name.name) {
                self.report(
                    file,
                    decl.name.span,
                    format!("field and method with the same name {}", decl.name.name),
                );
                return;
            }
        }
        let func = Rc::new(Func {
            name: decl.name.name.clone(),
            recv: Some(Receiver {
                pointer: recv.pointer,
                base: base.name().to_string(),
            }),
            type_params: Vec::new(),
            signature: Rc::new(signature),
        });
        existing.push(func.clone());
        self.funcs.push(func);
    }

    fn receiver_base(&mut self, file: usize, base: &Ident) -> Option<Rc<NamedType>> {
        match self.scope.get(&base.name).cloned() {
            Some(Entity::Type(named)) => Some(named),
            Some(Entity::Alias(alias, _)) => match alias.target() {
                Type::Named(named, args)
                    if args.is_empty() && *named.package() == *self.reference =>
                {
                    Some(named)
                }
                Type::Invalid => None,
                other => {
                    self.report(
                        file,
                        base.span,
                        format!("cannot define new methods on non-local type {other}"),
                    );
                    None
                }
            },
            Some(_) => {
                self.report(file, base.span, format!("{} is not a type", base.name));
                None
            }
            None if universe::lookup(&base.name).is_some() => {
                self.report(
                    file,
                    base.span,
                    format!("cannot define new methods on non-local type {}", base.name),
                );
                None
            }
            None => {
                self.report(file, base.span, format!("undefined: {}", base.name));
                None
            }
        }
    }

    fn check_values(&mut self) {
        let files = self.files;
        for (file_idx, file) in files.iter().enumerate() {
            for decl in &file.ast.decls {
                match decl {
                    Decl::Var(spec) => {
                        if spec.ty.is_none() && !spec.has_value {
                            self.report(file_idx, spec.span, "missing type or init expr");
                            continue;
                        }
                        self.check_value_spec(file_idx, spec, false);
                    }
                    Decl::Const(spec) => self.check_value_spec(file_idx, spec, true),
                    _ => {}
                }
            }
        }
    }

    fn check_value_spec(&mut self, file: usize, spec: &ValueSpec, constant: bool) {
        let ctx = Ctx::new(file, Vec::new()).indirect();
        let ty = spec.ty.as_ref().map(|ann| self.resolve_type(ann, &ctx));
        for name in &spec.names {
            let value = Rc::new(Value {
                name: name.name.clone(),
                ty: ty.clone(),
            });
            if !name.is_blank() {
                let object = if constant {
                    Object::Const(value.clone())
                } else {
                    Object::Var(value.clone())
                };
                self.value_objects.insert(name.name.clone(), object);
            }
            self.values.push(value);
        }
    }

    fn check_map_keys(&mut self) {
        let keys = std::mem::take(&mut self.map_keys);
        for (key, file, span) in keys {
            if key.is_invalid() || key.is_comparable() {
                continue;
            }
            let err = TypeError::at(&self.files[file], span, format!("invalid map key type {key}"))
                .with_help("map keys must be comparable; slices, maps and functions are not");
            self.errors.push(err);
        }
    }

    fn finish(self) -> Package {
        let mut scope = HashMap::new();
        for (name, entity) in self.scope {
            let object = match entity {
                Entity::Type(named) => Some(Object::Type(named)),
                Entity::Alias(alias, _) => Some(Object::Alias(alias)),
                Entity::Func => self.func_objects.get(&name).cloned().map(Object::Func),
                Entity::Var | Entity::Const => self.value_objects.get(&name).cloned(),
            };
            if let Some(object) = object {
                scope.insert(name, object);
            }
        }
        Package::from_parts(PackageParts {
            reference: self.reference,
            scope,
            types: self.types,
            aliases: self.aliases,
            funcs: self.funcs,
            values: self.values,
            imports: self.imports,
            files: self.files.iter().map(|file| file.path.clone()).collect(),
        })
    }
}

fn new_type_params(decls: &[TypeParamDecl]) -> Vec<Rc<TypeParam>> {
    decls
        .iter()
        .flat_map(|decl| decl.names.iter())
        .enumerate()
        .map(|(idx, ident)| Rc::new(TypeParam::new(ident.name.clone(), idx)))
        .collect()
}

/// The implicit field name of an embedded field: its base type name.
fn embedded_name(ty: &TypeExpr) -> Option<Ident> {
    match ty {
        TypeExpr::Pointer(inner) => embedded_name(&inner.ty),
        TypeExpr::Named { name, .. } => Some(name.clone()),
        _ => None,
    }
}
