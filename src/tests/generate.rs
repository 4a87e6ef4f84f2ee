use super::Workspace;
use crate::{
    error::Error,
    project::{ResolutionError, ResolveError},
    unmarshalmap::Generator,
};

fn generate(ws: &Workspace, package: &str, name: &str) -> Result<(String, String), Error> {
    let mut resolver = ws.resolver();
    let generator = Generator::new(&mut resolver, package, name)?;
    let method = String::from_utf8(generator.generate()?).expect("utf-8");
    let test = String::from_utf8(generator.generate_test()?).expect("utf-8");
    Ok((method, test))
}

#[test]
fn small_struct_output_is_stable() {
    let ws = Workspace::new();
    ws.write(
        "example.com/models",
        "point.go",
        "package models\n\ntype Point struct {\n\tX     int\n\tLabel string `unmarshalmap:\"label\"`\n}\n",
    );
    let (method, _) = generate(&ws, "example.com/models", "Point").expect("generate");
    let expected = r#"// Code generated by gounmarshalmap. DO NOT EDIT.

package models

import (
	"fmt"
)

// UnmarshalMap sets the fields of s from m. Missing keys and nil
// values leave the corresponding field untouched.
func (s *Point) UnmarshalMap(m map[string]interface{}) error {
	if v1, ok := m["X"]; ok && v1 != nil {
		switch value2 := v1.(type) {
		case int:
			s.X = value2
		case float64:
			s.X = int(value2)
		default:
			return fmt.Errorf("unmarshalmap: field %q: expected %s, got %T", "X", "int", v1)
		}
	}
	if v3, ok := m["label"]; ok && v3 != nil {
		switch value4 := v3.(type) {
		case string:
			s.Label = value4
		default:
			return fmt.Errorf("unmarshalmap: field %q: expected %s, got %T", "label", "string", v3)
		}
	}
	return nil
}
"#;
    assert_eq!(method, expected);
}

#[test]
fn every_field_kind_is_covered() {
    let ws = Workspace::new();
    ws.write(
        "example.com/models",
        "user.go",
        r#"package models

import "time"

type Status string

type Address struct {
	Street string
	Zip    int
}

type User struct {
	Name     string
	Age      int `unmarshalmap:"age"`
	Score    float64
	Active   bool
	Status   Status
	Tags     []string
	Limits   map[string]int
	Nickname *string
	Extra    interface{}
	Home     Address
	Created  time.Time
	Err      error
	Secret   string `unmarshalmap:"-"`
	Grid     [2]int
	internal uint8
}
"#,
    );
    let (method, test) = generate(&ws, "example.com/models", "User").expect("generate");

    assert!(method.starts_with("// Code generated by gounmarshalmap. DO NOT EDIT.\n\npackage models\n"));
    assert!(method.contains("import (\n\t\"fmt\"\n\t\"time\"\n)\n"));
    assert!(method.contains("func (s *User) UnmarshalMap(m map[string]interface{}) error {"));
    for key in [
        "Name", "age", "Score", "Active", "Status", "Tags", "Limits", "Nickname", "Extra",
        "Home", "Created", "Err", "Grid", "internal",
    ] {
        assert!(method.contains(&format!("m[\"{key}\"]")), "missing key {key}");
    }
    assert!(!method.contains("Secret"));
    assert!(method.contains("[\"Street\"]; ok"));
    assert!(method.contains("\t\tcase Status:\n"));
    assert!(method.contains("\t\tcase string:\n\t\t\ts.Status = Status(value"));
    assert!(method.contains("case time.Time:"));
    assert!(method.contains("case error:"));
    assert!(method.contains("s.Extra = v"));
    assert!(method.contains("\"Home.Street\""));
    assert!(method.contains("\"Tags[]\""));

    assert!(test.starts_with("// Code generated by gounmarshalmap. DO NOT EDIT.\n\npackage models\n"));
    assert!(test.contains("import (\n\t\"strings\"\n\t\"testing\"\n)\n"));
    assert!(test.contains("func TestUserUnmarshalMap(t *testing.T) {"));
    assert!(test.contains("func TestUserUnmarshalMapEmpty(t *testing.T) {"));
    assert!(test.contains("func TestUserUnmarshalMapWrongKind(t *testing.T) {"));
    assert!(test.contains("\"age\": "));
    assert!(!test.contains("\"Created\""));
}

#[test]
fn only_spelled_imports_are_emitted() {
    let ws = Workspace::new();
    ws.write("example.com/units", "units.go", "package units\n\ntype Meters float64\n")
        .write(
            "example.com/models",
            "route.go",
            "package models\n\nimport \"example.com/units\"\n\ntype Route struct {\n\tName   string\n\tLength units.Meters\n}\n\ntype Empty struct{}\n",
        );
    let (method, _) = generate(&ws, "example.com/models", "Route").expect("generate");
    assert!(method.contains("\t\"example.com/units\"\n"));
    assert!(method.contains("case units.Meters:"));
    assert!(method.contains("s.Length = units.Meters(value"));

    let (empty, test) = generate(&ws, "example.com/models", "Empty").expect("generate");
    assert!(!empty.contains("import"));
    assert!(empty.contains("func (s *Empty) UnmarshalMap(m map[string]interface{}) error {\n\treturn nil\n}\n"));
    assert!(test.contains("import (\n\t\"testing\"\n)\n"));
    assert!(!test.contains("WrongKind"));
}

#[test]
fn vendored_imports_collapse_to_their_canonical_path() {
    let ws = Workspace::new();
    ws.write(
        "example.com/app/vendor/github.com/stretchr/testify/mock",
        "mock.go",
        "package mock\n\ntype Mock struct {\n\tCalls int\n}\n",
    )
    .write(
        "example.com/app",
        "suite.go",
        "package app\n\nimport \"example.com/app/vendor/github.com/stretchr/testify/mock\"\n\ntype Suite struct {\n\tM *mock.Mock\n}\n",
    );
    let (method, _) = generate(&ws, "example.com/app", "Suite").expect("generate");
    assert!(method.contains("\t\"github.com/stretchr/testify/mock\"\n"));
    assert!(method.contains("var elem2 mock.Mock"));
    assert!(!method.contains("vendor"));
}

#[test]
fn colliding_package_names_get_distinct_aliases() {
    let ws = Workspace::new();
    ws.write("example.com/a/errors", "errors.go", "package errors\n\ntype Code string\n")
        .write("example.com/b/errors", "errors.go", "package errors\n\ntype Code string\n")
        .write(
            "example.com/models",
            "failure.go",
            "package models\n\nimport (\n\t\"example.com/a/errors\"\n\terrs \"example.com/b/errors\"\n)\n\ntype Failure struct {\n\tA errors.Code\n\tB errs.Code\n}\n",
        );
    let (method, _) = generate(&ws, "example.com/models", "Failure").expect("generate");
    assert!(method.contains("\t\"example.com/a/errors\"\n"));
    assert!(method.contains("\terrors2 \"example.com/b/errors\"\n"));
    assert!(method.contains("case errors.Code:"));
    assert!(method.contains("case errors2.Code:"));
}

#[test]
fn self_references_delegate_to_the_generated_method() {
    let ws = Workspace::new();
    ws.write(
        "example.com/list",
        "node.go",
        "package list\n\ntype Node struct {\n\tValue int\n\tNext  *Node\n\tKids  []Node\n}\n",
    );
    let (method, _) = generate(&ws, "example.com/list", "Node").expect("generate");
    assert!(method.contains("if err := elem4.UnmarshalMap(value5); err != nil {"));
    assert!(method
        .contains("return fmt.Errorf(\"unmarshalmap: field %q: %w\", \"Next\", err)"));
    assert!(method.contains("\"Kids[]\""));
}

#[test]
fn types_with_their_own_method_are_delegated() {
    let ws = Workspace::new();
    ws.write(
        "example.com/geo",
        "geo.go",
        "package geo\n\ntype Point struct{ lat float64 }\n\nfunc (p *Point) UnmarshalMap(m map[string]interface{}) error {\n\treturn nil\n}\n",
    )
    .write(
        "example.com/models",
        "place.go",
        "package models\n\nimport \"example.com/geo\"\n\ntype Place struct {\n\tAt geo.Point\n}\n",
    );
    let (method, _) = generate(&ws, "example.com/models", "Place").expect("generate");
    assert!(method.contains("if err := s.At.UnmarshalMap(value2); err != nil {"));
    assert!(method.contains("expected %s, got %T\", \"At\", \"geo.Point\", v1)"));
    // Named in a message only, never in code.
    assert!(!method.contains("\"example.com/geo\""));
}

#[test]
fn unsupported_fields_abort_generation() {
    let ws = Workspace::new();
    ws.write(
        "example.com/bus",
        "bus.go",
        "package bus\n\ntype Bus struct {\n\tName   string\n\tEvents chan string `unmarshalmap:\"events\"`\n}\n\ntype Handler struct {\n\tOn func(string) error\n}\n\ntype Signal struct {\n\tLevel complex128\n}\n\ntype Index struct {\n\tByID map[int]string\n}\n",
    );
    let cases = [
        ("Bus", "events", "chan"),
        ("Handler", "On", "func"),
        ("Signal", "Level", "complex128"),
    ];
    for (name, field, kind) in cases {
        match generate(&ws, "example.com/bus", name) {
            Err(Error::UnsupportedFieldKind { field: f, kind: k }) => {
                assert_eq!((f.as_str(), k.as_str()), (field, kind), "{name}");
            }
            other => panic!("{name}: expected an unsupported field, got {other:?}"),
        }
    }
    assert!(matches!(
        generate(&ws, "example.com/bus", "Index"),
        Err(Error::UnsupportedFieldKind { field, .. }) if field == "ByID"
    ));
}

#[test]
fn unexported_fields_of_foreign_structs_are_unsupported() {
    let ws = Workspace::new();
    ws.write(
        "example.com/vault",
        "vault.go",
        "package vault\n\ntype Box struct {\n\tLabel  string\n\tsecret string\n}\n",
    )
    .write(
        "example.com/models",
        "store.go",
        "package models\n\nimport \"example.com/vault\"\n\ntype Store struct {\n\tBox vault.Box\n}\n",
    );
    let err = generate(&ws, "example.com/models", "Store").unwrap_err();
    let Error::UnsupportedFieldKind { field, kind } = &err else {
        panic!("expected an unsupported field, got {err:?}");
    };
    assert_eq!(field, "Box.secret");
    assert_eq!(kind, "unexported field secret of example.com/vault.Box");
}

#[test]
fn subject_must_be_a_declared_struct() {
    let ws = Workspace::new();
    ws.write(
        "example.com/models",
        "models.go",
        "package models\n\ntype ID int\n\ntype Pair[T any] struct {\n\tA, B T\n}\n\nfunc Build() {}\n\ntype Real struct{}\n\ntype Same = Real\n",
    );
    let mut resolver = ws.resolver();
    assert!(matches!(
        Generator::new(&mut resolver, "example.com/models", "Missing"),
        Err(Error::NotFound { name, .. }) if name == "Missing"
    ));
    for name in ["ID", "Pair", "Build"] {
        assert!(
            matches!(
                Generator::new(&mut resolver, "example.com/models", name),
                Err(Error::NotAStruct { .. })
            ),
            "{name}"
        );
    }
    let aliased = Generator::new(&mut resolver, "example.com/models", "Same").expect("alias");
    assert_eq!(aliased.subject().name(), "Real");
}

#[test]
fn resolution_failures_surface_unchanged() {
    let ws = Workspace::new();
    let err = generate(&ws, "example.com/missing", "T").unwrap_err();
    assert!(matches!(err, Error::Resolve(_)));
    assert!(err
        .to_string()
        .starts_with("cannot find package \"example.com/missing\" in any of:"));
}

#[test]
fn methods_with_another_signature_are_not_called() {
    let ws = Workspace::new();
    ws.write(
        "example.com/models",
        "outer.go",
        "package models\n\ntype Inner struct {\n\tX int\n}\n\nfunc (i *Inner) UnmarshalMap() bool {\n\treturn true\n}\n\ntype Wrapped struct {\n\tY int\n}\n\nfunc (w *Wrapped) UnmarshalMap(m map[string]string) error {\n\treturn nil\n}\n\ntype Viaany struct {\n\tZ int\n}\n\nfunc (v *Viaany) UnmarshalMap(m map[string]any) error {\n\treturn nil\n}\n\ntype Outer struct {\n\tIn Inner\n\tW  Wrapped\n\tA  Viaany\n}\n",
    );
    let (method, _) = generate(&ws, "example.com/models", "Outer").expect("generate");
    assert!(!method.contains("s.In.UnmarshalMap("));
    assert!(!method.contains("s.W.UnmarshalMap("));
    assert!(method.contains("[\"X\"]; ok"));
    assert!(method.contains("[\"Y\"]; ok"));
    assert!(method.contains("if err := s.A.UnmarshalMap(value"));
    assert!(!method.contains("[\"Z\"]; ok"));
}

#[test]
fn standard_looking_subject_packages_must_exist() {
    let ws = Workspace::new();
    ws.write("mycorp/models", "user.go", "package models\n\ntype User struct{ Name string }\n");

    let err = generate(&ws, "mycorp/modles", "User").unwrap_err();
    let Error::Resolve(ResolveError::Resolution(ResolutionError::NotFound { identifier, .. })) = &err
    else {
        panic!("expected a not-found error, got {err:?}");
    };
    assert_eq!(identifier, "mycorp/modles");

    let (method, _) = generate(&ws, "mycorp/models", "User").expect("generate");
    assert!(method.contains("func (s *User) UnmarshalMap("));
}

#[test]
fn subject_package_type_errors_are_not_masked() {
    let ws = Workspace::new();
    ws.write(
        "mycorp/models",
        "user.go",
        "package models\n\ntype User struct{ A Undefined }\n",
    );
    let err = generate(&ws, "mycorp/models", "User").unwrap_err();
    let Error::Resolve(ResolveError::TypeCheck(check)) = &err else {
        panic!("expected the type-check error, got {err:?}");
    };
    assert_eq!(check.package, "mycorp/models");
    assert!(check.errors[0].message.contains("undefined: Undefined"));
}
