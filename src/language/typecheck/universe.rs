use super::object::{
    BasicKind, InterfaceType, Method, NamedType, Package, PackageRef, Param, Signature, Type,
};
use std::{collections::HashMap, rc::Rc};

struct Universe {
    types: HashMap<&'static str, Type>,
}

thread_local! {
    static UNIVERSE: Universe = Universe::new();
}

impl Universe {
    fn new() -> Self {
        let mut types = HashMap::new();
        for kind in [
            BasicKind::Bool,
            BasicKind::String,
            BasicKind::Int,
            BasicKind::Int8,
            BasicKind::Int16,
            BasicKind::Int32,
            BasicKind::Int64,
            BasicKind::Uint,
            BasicKind::Uint8,
            BasicKind::Uint16,
            BasicKind::Uint32,
            BasicKind::Uint64,
            BasicKind::Uintptr,
            BasicKind::Float32,
            BasicKind::Float64,
            BasicKind::Complex64,
            BasicKind::Complex128,
        ] {
            types.insert(kind.name(), Type::Basic(kind));
        }
        types.insert("byte", Type::Basic(BasicKind::Uint8));
        types.insert("rune", Type::Basic(BasicKind::Int32));
        types.insert("any", Type::Interface(Rc::new(InterfaceType::default())));

        let universe = Rc::new(PackageRef::new("", ""));
        let error = NamedType::new(universe.clone(), "error", Vec::new());
        error.set_underlying(Type::Interface(Rc::new(InterfaceType {
            methods: vec![Method {
                name: "Error".into(),
                signature: Rc::new(Signature {
                    params: Vec::new(),
                    results: vec![Param {
                        name: None,
                        ty: Type::Basic(BasicKind::String),
                    }],
                    variadic: false,
                }),
            }],
            ..InterfaceType::default()
        })));
        error.set_methods(Vec::new());
        types.insert("error", Type::Named(Rc::new(error), Vec::new()));

        let comparable = NamedType::new(universe, "comparable", Vec::new());
        comparable.set_underlying(Type::Interface(Rc::new(InterfaceType {
            comparable: true,
            ..InterfaceType::default()
        })));
        comparable.set_methods(Vec::new());
        types.insert("comparable", Type::Named(Rc::new(comparable), Vec::new()));

        Self { types }
    }
}

/// Predeclared type named `name`.
pub fn lookup(name: &str) -> Option<Type> {
    UNIVERSE.with(|universe| universe.types.get(name).cloned())
}

/// Predeclared constants, the zero value and builtin functions.
pub fn is_value(name: &str) -> bool {
    matches!(
        name,
        "true"
            | "false"
            | "iota"
            | "nil"
            | "append"
            | "cap"
            | "clear"
            | "close"
            | "complex"
            | "copy"
            | "delete"
            | "imag"
            | "len"
            | "make"
            | "max"
            | "min"
            | "new"
            | "panic"
            | "print"
            | "println"
            | "real"
            | "recover"
    )
}

pub fn error_type() -> Type {
    lookup("error").unwrap_or(Type::Invalid)
}

pub fn is_error_type(ty: &Type) -> bool {
    matches!(ty, Type::Named(named, _) if named.package().is_universe() && named.name() == "error")
}

/// The `unsafe` package: only its `Pointer` type is modelled.
pub fn unsafe_package() -> Package {
    let reference = Rc::new(PackageRef::new("unsafe", "unsafe"));
    let pointer = NamedType::new(reference.clone(), "Pointer", Vec::new());
    pointer.set_underlying(Type::Basic(BasicKind::UnsafePointer));
    pointer.set_methods(Vec::new());
    Package::with_types(reference, vec![Rc::new(pointer)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_and_rune_alias_basic_kinds() {
        assert!(matches!(lookup("byte"), Some(Type::Basic(BasicKind::Uint8))));
        assert!(matches!(lookup("rune"), Some(Type::Basic(BasicKind::Int32))));
    }

    #[test]
    fn error_is_a_universe_interface() {
        let ty = error_type();
        assert!(is_error_type(&ty));
        let Type::Interface(iface) = ty.underlying() else {
            panic!("error should be an interface");
        };
        assert_eq!(iface.method_set()[0].name, "Error");
    }

    #[test]
    fn unsafe_pointer_is_exposed() {
        let pkg = unsafe_package();
        let pointer = pkg.named_type("Pointer").expect("unsafe.Pointer");
        assert!(matches!(
            pointer.underlying(),
            Type::Basic(BasicKind::UnsafePointer)
        ));
        assert!(pkg.named_type("Sizeof").is_none());
    }
}
