use super::{chain_mentions, Workspace};
use crate::{
    language::typecheck::{Object, Type},
    project::{identifier::to_slash, ResolutionError, ResolveError, Resolver},
};
use std::{fs, rc::Rc};

#[test]
fn resolving_twice_returns_the_same_package() {
    let ws = Workspace::new();
    ws.write("example.com/base", "base.go", "package base\n\ntype ID string\n")
        .write(
            "example.com/a",
            "a.go",
            "package a\n\nimport \"example.com/base\"\n\ntype A struct{ ID base.ID }\n",
        )
        .write(
            "example.com/b",
            "b.go",
            "package b\n\nimport \"example.com/base\"\n\ntype B struct{ ID base.ID }\n",
        );
    let mut resolver = ws.resolver();

    let a = resolver.resolve("example.com/a").expect("a");
    let again = resolver.resolve("example.com/a").expect("a again");
    assert!(Rc::ptr_eq(&a, &again));

    let b = resolver.resolve("example.com/b").expect("b");
    assert!(Rc::ptr_eq(&a.imports()[0], &b.imports()[0]));
    let base = resolver.resolve("example.com/base").expect("base");
    assert!(Rc::ptr_eq(&a.imports()[0], &base));
}

#[test]
fn dot_and_canonical_identifier_share_a_cache_entry() {
    let ws = Workspace::new();
    ws.write("example.com/app", "app.go", "package app\n\ntype Config struct{}\n");
    let mut resolver = ws.resolver_in("example.com/app");

    let dot = resolver.resolve(".").expect("dot");
    let canonical = resolver.resolve("example.com/app").expect("canonical");
    assert!(Rc::ptr_eq(&dot, &canonical));
    assert_eq!(dot.path(), "example.com/app");
    assert_eq!(dot.name(), "app");
    assert_eq!(resolver.canonical("./"), "example.com/app");
}

#[test]
fn local_module_resolves_itself_by_every_name() {
    let ws = Workspace::new();
    let module = tempfile::tempdir().expect("tempdir");
    fs::write(module.path().join("go.mod"), "module example.com/svc\n\ngo 1.21\n").expect("go.mod");
    fs::write(module.path().join("svc.go"), "package svc\n\ntype Request struct{}\n").expect("svc.go");
    fs::create_dir(module.path().join("models")).expect("mkdir");
    fs::write(
        module.path().join("models/models.go"),
        "package models\n\ntype Item struct{}\n",
    )
    .expect("models.go");

    let mut resolver =
        Resolver::local_module(module.path().to_path_buf(), ws.search_path()).expect("resolver");
    let dot = resolver.resolve(".").expect("dot");
    let absolute = resolver
        .resolve(&to_slash(module.path()))
        .expect("absolute path");
    assert!(Rc::ptr_eq(&dot, &absolute));
    assert!(dot.named_type("Request").is_some());

    let models = resolver
        .resolve("example.com/svc/models")
        .expect("module subpackage");
    assert!(models.named_type("Item").is_some());
}

#[test]
fn test_files_load_only_when_requested() {
    let ws = Workspace::new();
    ws.write("example.com/p", "p.go", "package p\n\ntype Real struct{}\n")
        .write("example.com/p", "p_test.go", "package p\n\ntype Fixture struct{}\n");

    let skipping = ws.resolver().resolve("example.com/p").expect("p");
    assert!(skipping.named_type("Fixture").is_none());

    let mut with_tests = Resolver::workspace_with_tests(ws.gopath().to_path_buf(), ws.search_path());
    let all = with_tests.resolve("example.com/p").expect("p");
    assert!(all.named_type("Fixture").is_some());
}

#[test]
fn missing_package_reports_the_workspace_error() {
    let ws = Workspace::new();
    let err = ws.resolver().resolve("example.com/nowhere").unwrap_err();
    let ResolveError::Resolution(ResolutionError::NotFound { identifier, searched }) = &err else {
        panic!("expected a not-found error, got {err:?}");
    };
    assert_eq!(identifier, "example.com/nowhere");
    assert_eq!(searched, &[ws.package_dir("example.com/nowhere")]);
}

#[test]
fn host_fallback_error_never_replaces_the_primary_error() {
    let ws = Workspace::new();
    ws.write(
        "example.com/broken",
        "broken.go",
        "package broken\n\ntype T struct{ U Undefined }\n",
    );
    let err = ws.resolver().resolve("example.com/broken").unwrap_err();
    let ResolveError::TypeCheck(check) = &err else {
        panic!("expected the type-check error, got {err:?}");
    };
    assert_eq!(check.package, "example.com/broken");
    assert!(check.errors[0].message.contains("undefined: Undefined"));
}

#[test]
fn host_fallback_covers_standard_packages() {
    let ws = Workspace::new();
    ws.write(
        "example.com/app",
        "app.go",
        "package app\n\nimport (\n\t\"time\"\n\t\"unsafe\"\n)\n\ntype T struct {\n\tAt time.Time\n\tP  unsafe.Pointer\n}\n",
    );
    let app = ws.resolver().resolve("example.com/app").expect("app");
    let t = app.named_type("T").expect("T");
    let Type::Struct(st) = t.underlying() else {
        panic!("T is a struct");
    };
    let at = st.fields[0].ty.named().expect("time.Time is named");
    assert!(at.is_opaque());
    assert_eq!(at.qualified_name(), "time.Time");
}

#[test]
fn failing_standard_looking_package_falls_back_to_the_host() {
    let ws = Workspace::new();
    ws.write("strconv", "bad.go", "package strconv\n\ntype X struct{ Y Missing }\n");
    let pkg = ws.resolver().resolve("strconv").expect("host fallback");
    assert!(pkg.is_opaque());
}

#[test]
fn parse_errors_are_never_masked_by_the_fallback() {
    let ws = Workspace::new();
    ws.write("strings", "bad.go", "package strings\n\ntype X struct {\n");
    let err = ws.resolver().resolve("strings").unwrap_err();
    let ResolveError::Parse(parse) = &err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert!(parse.path.ends_with("bad.go"));
}

#[test]
fn directories_without_sources_are_resolution_errors() {
    let ws = Workspace::new();
    ws.write("example.com/docs", "README.md", "nothing to see");
    let err = ws.resolver().resolve("example.com/docs").unwrap_err();
    assert!(matches!(
        err,
        ResolveError::Resolution(ResolutionError::NoSourceFiles { .. })
    ));
}

#[test]
fn import_cycles_are_reported() {
    let ws = Workspace::new();
    ws.write(
        "example.com/a",
        "a.go",
        "package a\n\nimport \"example.com/b\"\n\ntype A struct{ B *b.B }\n",
    )
    .write(
        "example.com/b",
        "b.go",
        "package b\n\nimport \"example.com/a\"\n\ntype B struct{ A *a.A }\n",
    );
    let err = ws.resolver().resolve("example.com/a").unwrap_err();
    assert!(matches!(err, ResolveError::TypeCheck(_)));
    assert!(chain_mentions(
        &err,
        "import cycle not allowed: example.com/a -> example.com/b -> example.com/a"
    ));
}

#[test]
fn invalid_recursive_types_are_rejected() {
    let ws = Workspace::new();
    ws.write(
        "example.com/rec",
        "rec.go",
        "package rec\n\ntype T struct {\n\tInner T\n}\n\ntype Ok struct {\n\tNext *Ok\n\tKids []Ok\n}\n",
    );
    let err = ws.resolver().resolve("example.com/rec").unwrap_err();
    let ResolveError::TypeCheck(check) = &err else {
        panic!("expected a type-check error, got {err:?}");
    };
    assert_eq!(check.errors.len(), 1);
    assert!(check.errors[0].message.starts_with("invalid recursive type T"));
}

#[test]
fn methods_and_functions_are_recorded() {
    let ws = Workspace::new();
    ws.write(
        "example.com/svc",
        "svc.go",
        "package svc\n\ntype Server struct{ addr string }\n\nfunc (s *Server) Addr() string {\n\treturn s.addr\n}\n\nfunc New(addr string) *Server {\n\treturn &Server{addr: addr}\n}\n\nvar Default = New(\":80\")\n",
    );
    let svc = ws.resolver().resolve("example.com/svc").expect("svc");
    let server = svc.named_type("Server").expect("Server");
    assert!(server.method("Addr").is_some());
    assert!(matches!(svc.lookup("New"), Some(Object::Func(_))));
    assert!(matches!(svc.lookup("Default"), Some(Object::Var(_))));
}

#[test]
fn source_resolution_never_uses_the_host() {
    let ws = Workspace::new();
    ws.write("mycorp/broken", "broken.go", "package broken\n\ntype X struct{ Y Missing }\n")
        .write("mycorp/models", "models.go", "package models\n\ntype User struct{}\n");
    let mut resolver = ws.resolver();

    assert!(resolver.resolve("mycorp/broken").expect("host fallback").is_opaque());
    let err = resolver.resolve_source("mycorp/broken").unwrap_err();
    assert!(matches!(err, ResolveError::TypeCheck(_)));

    let err = resolver.resolve_source("mycorp/nowhere").unwrap_err();
    assert!(matches!(
        err,
        ResolveError::Resolution(ResolutionError::NotFound { .. })
    ));

    let models = resolver.resolve_source("mycorp/models").expect("models");
    let again = resolver.resolve("mycorp/models").expect("models again");
    assert!(Rc::ptr_eq(&models, &again));
}
