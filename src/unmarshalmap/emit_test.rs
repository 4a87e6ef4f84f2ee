//! Emission of the companion `_test.go` file. Inputs are untyped Go literals
//! so the test never has to spell a foreign type.

use super::{
    emit::{PARAM, RECEIVER},
    fields::{Decode, FieldPlan, Node, METHOD_NAME},
    writer::{go_quote, GoWriter},
    HEADER,
};
use crate::language::typecheck::{BasicKind, NamedType, Type};
use std::rc::Rc;

const SAMPLE_KEY: &str = "k";

pub struct TestEmitter<'a> {
    subject: &'a Rc<NamedType>,
    w: GoWriter,
}

impl<'a> TestEmitter<'a> {
    pub fn new(subject: &'a Rc<NamedType>) -> Self {
        Self {
            subject,
            w: GoWriter::new(),
        }
    }

    pub fn emit(mut self, fields: &[FieldPlan]) -> String {
        let name = self.subject.name().to_string();
        let wrong = fields
            .iter()
            .find_map(|field| wrong_value(&field.node).map(|value| (field, value)));

        self.w.line(HEADER);
        self.w.blank();
        self.w.line(format!("package {}", self.subject.package().name));
        self.w.blank();
        self.w.open("import (");
        if wrong.is_some() {
            self.w.line("\"strings\"");
        }
        self.w.line("\"testing\"");
        self.w.close(")");
        self.w.blank();

        self.decodes_every_field(&name, fields);
        self.w.blank();
        self.accepts_empty_map(&name);
        if let Some((field, value)) = wrong {
            self.w.blank();
            self.rejects_wrong_kind(&name, field, value);
        }
        self.w.finish()
    }

    fn decodes_every_field(&mut self, name: &str, fields: &[FieldPlan]) {
        let samples: Vec<(&FieldPlan, String)> = fields
            .iter()
            .filter_map(|field| input(&field.node, &field.path).map(|input| (field, input)))
            .collect();

        self.w
            .open(format!("func Test{name}{METHOD_NAME}(t *testing.T) {{"));
        if samples.is_empty() {
            self.w.line(format!("{PARAM} := map[string]interface{{}}{{}}"));
        } else {
            self.w.open(format!("{PARAM} := map[string]interface{{}}{{"));
            for (field, input) in &samples {
                self.w.line(format!("{}: {input},", go_quote(&field.key)));
            }
            self.w.close("}");
        }
        self.w.line(format!("var {RECEIVER} {name}"));
        self.w.open(format!(
            "if err := {RECEIVER}.{METHOD_NAME}({PARAM}); err != nil {{"
        ));
        self.w.line(format!("t.Fatalf(\"{METHOD_NAME}: %v\", err)"));
        self.w.close("}");
        for (field, _) in &samples {
            let expr = format!("{RECEIVER}.{}", field.name);
            if let Some(failed) = check(&field.node, &expr, &field.path) {
                self.w.open(format!("if {failed} {{"));
                self.w.line(format!(
                    "t.Errorf(\"field %q was not decoded, got %+v\", {}, {expr})",
                    go_quote(&field.key)
                ));
                self.w.close("}");
            }
        }
        self.w.close("}");
    }

    fn accepts_empty_map(&mut self, name: &str) {
        self.w
            .open(format!("func Test{name}{METHOD_NAME}Empty(t *testing.T) {{"));
        self.w.line(format!("var {RECEIVER} {name}"));
        self.w.open(format!(
            "if err := {RECEIVER}.{METHOD_NAME}(map[string]interface{{}}{{}}); err != nil {{"
        ));
        self.w.line(format!("t.Fatalf(\"{METHOD_NAME}: %v\", err)"));
        self.w.close("}");
        self.w.close("}");
    }

    fn rejects_wrong_kind(&mut self, name: &str, field: &FieldPlan, value: &str) {
        let expected = format!("field {}", go_quote(&field.path));
        self.w
            .open(format!("func Test{name}{METHOD_NAME}WrongKind(t *testing.T) {{"));
        self.w.line(format!("var {RECEIVER} {name}"));
        self.w.line(format!(
            "err := {RECEIVER}.{METHOD_NAME}(map[string]interface{{}}{{{}: {value}}})",
            go_quote(&field.key)
        ));
        self.w.open("if err == nil {");
        self.w.line(format!(
            "t.Fatal({})",
            go_quote(&format!("expected an error for {expected}"))
        ));
        self.w.close("}");
        self.w.open(format!(
            "if !strings.Contains(err.Error(), {}) {{",
            go_quote(&expected)
        ));
        self.w
            .line("t.Errorf(\"error does not name the field: %v\", err)");
        self.w.close("}");
        self.w.close("}");
    }
}

/// Small positive number derived from the key path, so every field gets its
/// own value and input and check agree.
fn seed(path: &str) -> u32 {
    path.bytes().map(u32::from).sum::<u32>() % 100 + 1
}

fn scalar_literal(kind: BasicKind, path: &str) -> String {
    match kind {
        BasicKind::Bool => "true".into(),
        BasicKind::String => go_quote(path),
        kind if kind.is_float() => format!("{}.5", seed(path)),
        _ => seed(path).to_string(),
    }
}

/// Untyped literal the decoder turns into a value of `node`'s type.
fn input(node: &Node, path: &str) -> Option<String> {
    match &node.decode {
        Decode::Any => Some(go_quote(path)),
        Decode::Scalar(kind) => Some(scalar_literal(*kind, path)),
        Decode::Assert => None,
        Decode::Pointer(elem) => input(elem, path),
        Decode::Slice(elem) => {
            input(elem, &format!("{path}[]")).map(|item| format!("[]interface{{}}{{{item}}}"))
        }
        Decode::Array(elem) => {
            if matches!(node.ty.underlying(), Type::Array(len, _) if len.trim() == "0") {
                return None;
            }
            input(elem, &format!("{path}[]")).map(|item| format!("[]interface{{}}{{{item}}}"))
        }
        Decode::Map(elem) => input(elem, &format!("{path}[]"))
            .map(|item| format!("map[string]interface{{}}{{\"{SAMPLE_KEY}\": {item}}}")),
        Decode::Delegate => Some("map[string]interface{}{}".into()),
        Decode::Inline(fields) => {
            let entries: Vec<String> = fields
                .iter()
                .filter_map(|field| {
                    input(&field.node, &field.path)
                        .map(|value| format!("{}: {value}", go_quote(&field.key)))
                })
                .collect();
            Some(format!("map[string]interface{{}}{{{}}}", entries.join(", ")))
        }
    }
}

/// Condition that holds when `expr` does not carry the value `input`
/// produced for the same node.
fn check(node: &Node, expr: &str, path: &str) -> Option<String> {
    match &node.decode {
        Decode::Any => Some(format!("{expr} != {}", go_quote(path))),
        Decode::Scalar(BasicKind::Bool) => Some(format!("!{expr}")),
        Decode::Scalar(kind) => Some(format!("{expr} != {}", scalar_literal(*kind, path))),
        Decode::Assert | Decode::Delegate => None,
        Decode::Pointer(elem) => {
            let nil = format!("{expr} == nil");
            Some(match check(elem, &format!("(*{expr})"), path) {
                Some(inner) => format!("{nil} || {inner}"),
                None => nil,
            })
        }
        Decode::Slice(elem) => {
            let len = format!("len({expr}) != 1");
            Some(match check(elem, &format!("{expr}[0]"), &format!("{path}[]")) {
                Some(inner) => format!("{len} || {inner}"),
                None => len,
            })
        }
        Decode::Array(elem) => check(elem, &format!("{expr}[0]"), &format!("{path}[]")),
        Decode::Map(elem) => {
            let len = format!("len({expr}) != 1");
            let entry = format!("{expr}[\"{SAMPLE_KEY}\"]");
            Some(match check(elem, &entry, &format!("{path}[]")) {
                Some(inner) => format!("{len} || {inner}"),
                None => len,
            })
        }
        Decode::Inline(fields) => {
            let parts: Vec<String> = fields
                .iter()
                .filter(|field| input(&field.node, &field.path).is_some())
                .filter_map(|field| {
                    check(&field.node, &format!("{expr}.{}", field.name), &field.path)
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join(" || "))
        }
    }
}

/// A value of the wrong kind for `node`, when there is one that the
/// generated decoder is guaranteed to reject.
fn wrong_value(node: &Node) -> Option<&'static str> {
    match &node.decode {
        Decode::Any | Decode::Assert => None,
        Decode::Scalar(BasicKind::String) => Some("42"),
        Decode::Pointer(elem) => wrong_value(elem),
        Decode::Scalar(_)
        | Decode::Slice(_)
        | Decode::Array(_)
        | Decode::Map(_)
        | Decode::Delegate
        | Decode::Inline(_) => Some("\"wrong\""),
    }
}
