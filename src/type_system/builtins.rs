//! The builtin types. Created once per process and shared by every registry.
use super::type_def::{TypeDef, TypeRef};
use once_cell::sync::Lazy;
use std::sync::Arc;

struct Builtins {
    object: TypeRef,
    none: TypeRef,
    bool_: TypeRef,
    int: TypeRef,
    float: TypeRef,
    str_: TypeRef,
    list: TypeRef,
    tuple: TypeRef,
    set: TypeRef,
    dict: TypeRef,
    function: TypeRef,
}

static BUILTINS: Lazy<Builtins> = Lazy::new(|| {
    let object = Arc::new(TypeDef::builtin("object", Vec::new()));
    let root = || vec![Arc::clone(&object)];
    let int = Arc::new(TypeDef::builtin("int", root()));
    // bool is-a int, the one builtin subtype relation matchers care about.
    let bool_ = Arc::new(TypeDef::builtin("bool", vec![Arc::clone(&int), Arc::clone(&object)]));
    Builtins {
        none: Arc::new(TypeDef::builtin("NoneType", root())),
        float: Arc::new(TypeDef::builtin("float", root())),
        str_: Arc::new(TypeDef::builtin("str", root())),
        list: Arc::new(TypeDef::builtin("list", root())),
        tuple: Arc::new(TypeDef::builtin("tuple", root())),
        set: Arc::new(TypeDef::builtin("set", root())),
        dict: Arc::new(TypeDef::builtin("dict", root())),
        function: Arc::new(TypeDef::builtin("function", root())),
        bool_,
        int,
        object,
    }
});

pub fn object_type() -> &'static TypeRef { &BUILTINS.object }
pub fn none_type() -> &'static TypeRef { &BUILTINS.none }
pub fn bool_type() -> &'static TypeRef { &BUILTINS.bool_ }
pub fn int_type() -> &'static TypeRef { &BUILTINS.int }
pub fn float_type() -> &'static TypeRef { &BUILTINS.float }
pub fn str_type() -> &'static TypeRef { &BUILTINS.str_ }
pub fn list_type() -> &'static TypeRef { &BUILTINS.list }
pub fn tuple_type() -> &'static TypeRef { &BUILTINS.tuple }
pub fn set_type() -> &'static TypeRef { &BUILTINS.set }
pub fn dict_type() -> &'static TypeRef { &BUILTINS.dict }
pub fn function_type() -> &'static TypeRef { &BUILTINS.function }

/// All builtins, parents before children.
pub fn all() -> [&'static TypeRef; 11] {
    let b = &*BUILTINS;
    [
        &b.object, &b.none, &b.int, &b.bool_, &b.float, &b.str_,
        &b.list, &b.tuple, &b.set, &b.dict, &b.function,
    ]
}

/// Scalar types whose bare annotation means an exact-type check.
pub fn is_primitive(t: &TypeRef) -> bool {
    let b = &*BUILTINS;
    [&b.int, &b.str_, &b.float, &b.bool_, &b.none].iter().any(|p| p.id() == t.id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_is_subtype_of_int_only() {
        assert!(bool_type().is_subtype_of(int_type()));
        assert!(bool_type().is_subtype_of(object_type()));
        assert!(!int_type().is_subtype_of(bool_type()));
        assert!(!float_type().is_subtype_of(int_type()));
    }

    #[test]
    fn test_primitives() {
        assert!(is_primitive(none_type()));
        assert!(is_primitive(bool_type()));
        assert!(!is_primitive(list_type()));
        assert!(!is_primitive(object_type()));
    }
}
