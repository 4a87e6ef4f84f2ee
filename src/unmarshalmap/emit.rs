//! Emission of `func (s *T) UnmarshalMap(m map[string]interface{}) error`.

use super::{
    fields::{Decode, FieldPlan, Node, METHOD_NAME},
    writer::{go_quote, GoWriter},
    HEADER,
};
use crate::{
    imports::ImportSet,
    language::typecheck::{BasicKind, NamedType, Type},
};
use std::{cell::RefCell, collections::BTreeSet, rc::Rc};

pub const RECEIVER: &str = "s";
pub const PARAM: &str = "m";
const MISMATCH: &str = "\"unmarshalmap: field %q: expected %s, got %T\"";
const WRAPPED: &str = "\"unmarshalmap: field %q: %w\"";
const GENERIC_MAP: &str = "map[string]interface{}";
const GENERIC_SLICE: &str = "[]interface{}";

pub struct MethodEmitter<'a> {
    subject: &'a Rc<NamedType>,
    imports: &'a ImportSet,
    used: RefCell<BTreeSet<String>>,
    needs_fmt: bool,
    counter: usize,
    w: GoWriter,
}

impl<'a> MethodEmitter<'a> {
    pub fn new(subject: &'a Rc<NamedType>, imports: &'a ImportSet) -> Self {
        Self {
            subject,
            imports,
            used: RefCell::new(BTreeSet::new()),
            needs_fmt: false,
            counter: 0,
            w: GoWriter::new(),
        }
    }

    pub fn emit(mut self, fields: &[FieldPlan]) -> String {
        let name = self.subject.name().to_string();
        self.w.line(format!(
            "// {METHOD_NAME} sets the fields of {RECEIVER} from {PARAM}. Missing keys and nil"
        ));
        self.w.line("// values leave the corresponding field untouched.");
        self.w.open(format!(
            "func ({RECEIVER} *{name}) {METHOD_NAME}({PARAM} {GENERIC_MAP}) error {{"
        ));
        for field in fields {
            self.field(field, PARAM, &format!("{RECEIVER}.{}", field.name));
        }
        self.w.line("return nil");
        self.w.close("}");

        let body = std::mem::take(&mut self.w).finish();
        let mut file = GoWriter::new();
        file.line(HEADER);
        file.blank();
        file.line(format!("package {}", self.subject.package().name));
        file.blank();
        let used = self.used.borrow();
        let imports: Vec<(&String, &String)> = self
            .imports
            .imports()
            .iter()
            .filter(|(path, alias)| {
                (path.as_str() == "fmt" && self.needs_fmt) || used.contains(alias.as_str())
            })
            .collect();
        if !imports.is_empty() {
            file.open("import (");
            for (path, alias) in imports {
                file.line(import_spec(path, alias));
            }
            file.close(")");
            file.blank();
        }
        let mut out = file.finish();
        out.push_str(&body);
        out
    }

    fn fresh(&mut self, base: &str) -> String {
        loop {
            self.counter += 1;
            let name = format!("{base}{}", self.counter);
            if !self.imports.is_taken(&name) {
                return name;
            }
        }
    }

    /// Type name for error messages; imports nothing.
    fn describe(&self, ty: &Type) -> String {
        let mut out = String::new();
        ty.write(&mut out, &|package| self.imports.qualifier(package));
        out
    }

    /// Go spelling of `ty`, noting the imports it relies on.
    fn spell(&self, ty: &Type) -> String {
        let mut out = String::new();
        ty.write(&mut out, &|package| {
            let alias = self.imports.qualifier(package)?;
            self.used.borrow_mut().insert(alias.clone());
            Some(alias)
        });
        out
    }

    fn field(&mut self, field: &FieldPlan, map: &str, target: &str) {
        let value = self.fresh("v");
        self.w.open(format!(
            "if {value}, ok := {map}[{}]; ok && {value} != nil {{",
            go_quote(&field.key)
        ));
        self.decode(&field.node, &value, target, &field.path);
        self.w.close("}");
    }

    fn mismatch(&mut self, src: &str, path: &str, expected: &str) {
        self.needs_fmt = true;
        self.w.label("default:");
        self.w.line(format!(
            "return fmt.Errorf({MISMATCH}, {}, {}, {src})",
            go_quote(path),
            go_quote(expected)
        ));
    }

    fn decode(&mut self, node: &Node, src: &str, target: &str, path: &str) {
        let expected = self.describe(&node.ty);
        match &node.decode {
            Decode::Any => self.w.line(format!("{target} = {src}")),
            Decode::Scalar(kind) => {
                let spelled = self.spell(&node.ty);
                self.scalar(*kind, &spelled, src, target, path)
            }
            Decode::Assert => {
                let spelled = self.spell(&node.ty);
                let value = self.fresh("value");
                self.w.open(format!("switch {value} := {src}.(type) {{"));
                self.w.label(format!("case {spelled}:"));
                self.w.line(format!("{target} = {value}"));
                self.mismatch(src, path, &spelled);
                self.w.close("}");
            }
            Decode::Pointer(elem) => {
                let local = self.fresh("elem");
                let elem_type = self.spell(&elem.ty);
                self.w.line(format!("var {local} {elem_type}"));
                self.decode(elem, src, &local, path);
                self.w.line(format!("{target} = &{local}"));
            }
            Decode::Slice(elem) => {
                let spelled = self.spell(&node.ty);
                let value = self.fresh("value");
                self.w.open(format!("switch {value} := {src}.(type) {{"));
                self.exact_case(&spelled, GENERIC_SLICE, &value, target);
                self.w.label(format!("case {GENERIC_SLICE}:"));
                let items = self.fresh("items");
                self.w
                    .line(format!("{items} := make({spelled}, len({value}))"));
                self.elements(elem, &value, &items, path);
                self.w.line(format!("{target} = {items}"));
                self.mismatch(src, path, &spelled);
                self.w.close("}");
            }
            Decode::Array(elem) => {
                let spelled = self.spell(&node.ty);
                let value = self.fresh("value");
                self.w.open(format!("switch {value} := {src}.(type) {{"));
                self.exact_case(&spelled, GENERIC_SLICE, &value, target);
                self.w.label(format!("case {GENERIC_SLICE}:"));
                let items = self.fresh("items");
                self.needs_fmt = true;
                self.w.line(format!("var {items} {spelled}"));
                self.w
                    .open(format!("if len({value}) > len({items}) {{"));
                self.w.line(format!(
                    "return fmt.Errorf({MISMATCH}, {}, {}, {src})",
                    go_quote(path),
                    go_quote(&spelled)
                ));
                self.w.close("}");
                self.elements(elem, &value, &items, path);
                self.w.line(format!("{target} = {items}"));
                self.mismatch(src, path, &spelled);
                self.w.close("}");
            }
            Decode::Map(elem) => {
                let spelled = self.spell(&node.ty);
                let key_type = node
                    .key_type()
                    .map(|key| self.spell(&key))
                    .unwrap_or_else(|| "string".to_string());
                let value = self.fresh("value");
                self.w.open(format!("switch {value} := {src}.(type) {{"));
                self.exact_case(&spelled, GENERIC_MAP, &value, target);
                self.w.label(format!("case {GENERIC_MAP}:"));
                let entries = self.fresh("entries");
                let key = self.fresh("key");
                let entry = self.fresh("entry");
                let local = self.fresh("elem");
                let elem_type = self.spell(&elem.ty);
                self.w
                    .line(format!("{entries} := make({spelled}, len({value}))"));
                self.w
                    .open(format!("for {key}, {entry} := range {value} {{"));
                self.w.line(format!("var {local} {elem_type}"));
                self.w.open(format!("if {entry} != nil {{"));
                self.decode(elem, &entry, &local, &format!("{path}[]"));
                self.w.close("}");
                let index = if key_type == "string" {
                    key
                } else {
                    format!("{key_type}({key})")
                };
                self.w.line(format!("{entries}[{index}] = {local}"));
                self.w.close("}");
                self.w.line(format!("{target} = {entries}"));
                self.mismatch(src, path, &spelled);
                self.w.close("}");
            }
            Decode::Delegate => {
                let value = self.fresh("value");
                self.needs_fmt = true;
                self.w.open(format!("switch {value} := {src}.(type) {{"));
                self.w.label(format!("case {GENERIC_MAP}:"));
                self.w.open(format!(
                    "if err := {target}.{METHOD_NAME}({value}); err != nil {{"
                ));
                self.w.line(format!(
                    "return fmt.Errorf({WRAPPED}, {}, err)",
                    go_quote(path)
                ));
                self.w.close("}");
                self.mismatch(src, path, &expected);
                self.w.close("}");
            }
            Decode::Inline(fields) if fields.is_empty() => {
                self.w.open(format!("switch {src}.(type) {{"));
                self.w.label(format!("case {GENERIC_MAP}:"));
                self.mismatch(src, path, &expected);
                self.w.close("}");
            }
            Decode::Inline(fields) => {
                let value = self.fresh("value");
                self.w.open(format!("switch {value} := {src}.(type) {{"));
                self.w.label(format!("case {GENERIC_MAP}:"));
                for field in fields {
                    self.field(field, &value, &format!("{target}.{}", field.name));
                }
                self.mismatch(src, path, &expected);
                self.w.close("}");
            }
        }
    }

    fn scalar(&mut self, kind: BasicKind, spelled: &str, src: &str, target: &str, path: &str) {
        let value = self.fresh("value");
        self.w.open(format!("switch {value} := {src}.(type) {{"));
        self.w.label(format!("case {spelled}:"));
        self.w.line(format!("{target} = {value}"));
        let mut accepted = vec![kind.name()];
        if kind.is_integer() || kind.is_float() {
            accepted.extend(["int", "float64"]);
        }
        let mut seen = vec![spelled];
        for basic in accepted {
            if seen.contains(&basic) {
                continue;
            }
            seen.push(basic);
            self.w.label(format!("case {basic}:"));
            self.w.line(format!("{target} = {spelled}({value})"));
        }
        self.mismatch(src, path, spelled);
        self.w.close("}");
    }

    /// A value that already has the field's type is taken as is.
    fn exact_case(&mut self, spelled: &str, generic: &str, value: &str, target: &str) {
        if spelled != generic {
            self.w.label(format!("case {spelled}:"));
            self.w.line(format!("{target} = {value}"));
        }
    }

    fn elements(&mut self, elem: &Node, value: &str, items: &str, path: &str) {
        let index = self.fresh("i");
        let item = self.fresh("item");
        self.w
            .open(format!("for {index}, {item} := range {value} {{"));
        self.w.open(format!("if {item} == nil {{"));
        self.w.line("continue");
        self.w.close("}");
        self.decode(elem, &item, &format!("{items}[{index}]"), &format!("{path}[]"));
        self.w.close("}");
    }
}

fn import_spec(path: &str, alias: &str) -> String {
    let last = path.rsplit('/').next().unwrap_or(path);
    if last == alias {
        go_quote(path)
    } else {
        format!("{alias} {}", go_quote(path))
    }
}
