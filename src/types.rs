//! Declared value types and the recursive type check behind `is_type_of`.

use crate::typed::Schema;
use crate::value::ConfigValue;
use std::fmt;
use std::sync::Arc;

/// A declared type, as written in a schema annotation or passed to the
/// `is_type_of` operation.
///
/// Enclosed collections carry their type arguments as written: an empty
/// argument list means the bare collection (`list`, `dict`), while schema
/// extraction rejects argument counts it does not understand.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    /// Accepts any value
    Any,
    Str,
    Int,
    /// Accepts floats and integers
    Float,
    Bool,
    /// Only `null`
    None,
    List(Vec<TypeSpec>),
    Tuple(Vec<TypeSpec>),
    /// `dict` or `dict[K, V]`
    Dict(Vec<TypeSpec>),
    /// A nested-object type described by its own schema
    Object(Arc<Schema>),
    Union(Vec<TypeSpec>),
    Optional(Box<TypeSpec>),
    /// A named type outside the supported set
    Opaque(String),
}

impl TypeSpec {
    /// `list[T]`
    pub fn list_of(item: TypeSpec) -> Self {
        TypeSpec::List(vec![item])
    }

    /// `tuple[T]`
    pub fn tuple_of(item: TypeSpec) -> Self {
        TypeSpec::Tuple(vec![item])
    }

    /// `dict[K, V]`
    pub fn dict_of(key: TypeSpec, value: TypeSpec) -> Self {
        TypeSpec::Dict(vec![key, value])
    }

    pub fn object(schema: &Arc<Schema>) -> Self {
        TypeSpec::Object(Arc::clone(schema))
    }

    pub fn optional(inner: TypeSpec) -> Self {
        TypeSpec::Optional(Box::new(inner))
    }

    pub fn union<I: IntoIterator<Item = TypeSpec>>(members: I) -> Self {
        TypeSpec::Union(members.into_iter().collect())
    }

    /// True for `Optional[T]` or a union containing `None`, the forms that
    /// need an explicit default.
    pub fn is_optional(&self) -> bool {
        match self {
            TypeSpec::Optional(_) => true,
            TypeSpec::Union(members) => members.iter().any(|m| matches!(m, TypeSpec::None)),
            _ => false,
        }
    }

    /// Nested-object schemas reachable through unions and optionals.
    pub fn object_members(&self) -> Vec<&Arc<Schema>> {
        match self {
            TypeSpec::Object(schema) => vec![schema],
            TypeSpec::Optional(inner) => inner.object_members(),
            TypeSpec::Union(members) => members.iter().flat_map(|m| m.object_members()).collect(),
            _ => Vec::new(),
        }
    }

    /// Checks whether `value` is an instance of this type.
    ///
    /// Unions match when any branch matches, list and tuple types require
    /// every element to match, `dict[K, V]` requires every key and value to
    /// match, and nested-object types only check for an object shape.
    ///
    /// # Example
    /// ```
    /// use tierconf::{ConfigValue, TypeSpec};
    ///
    /// let ints = TypeSpec::list_of(TypeSpec::Int);
    /// let value: ConfigValue = serde_json::from_str("[1, 2, 3]").unwrap();
    /// assert!(ints.matches(&value));
    /// assert!(ints.matches(&ConfigValue::Array(vec![])));
    /// assert!(!ints.matches(&serde_json::from_str("[1, \"x\"]").unwrap()));
    /// ```
    pub fn matches(&self, value: &ConfigValue) -> bool {
        match self {
            TypeSpec::Any => true,
            TypeSpec::Str => matches!(value, ConfigValue::String(_)),
            TypeSpec::Int => matches!(value, ConfigValue::Integer(_)),
            TypeSpec::Float => matches!(value, ConfigValue::Float(_) | ConfigValue::Integer(_)),
            TypeSpec::Bool => matches!(value, ConfigValue::Boolean(_)),
            TypeSpec::None => value.is_null(),
            TypeSpec::List(args) | TypeSpec::Tuple(args) => match value {
                ConfigValue::Array(items) => match args.first() {
                    Some(item_type) => items.iter().all(|item| item_type.matches(item)),
                    None => true,
                },
                _ => false,
            },
            TypeSpec::Dict(args) => match value {
                ConfigValue::Object(obj) => match args.as_slice() {
                    [key_type, value_type] => obj.iter().all(|(key, item)| {
                        key_type.matches(&ConfigValue::String(key.clone()))
                            && value_type.matches(item)
                    }),
                    _ => true,
                },
                _ => false,
            },
            TypeSpec::Object(_) => value.is_object(),
            TypeSpec::Union(members) => members.iter().any(|member| member.matches(value)),
            TypeSpec::Optional(inner) => value.is_null() || inner.matches(value),
            TypeSpec::Opaque(_) => false,
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, name: &str, args: &[TypeSpec]) -> fmt::Result {
    write!(f, "{name}")?;
    if args.is_empty() {
        return Ok(());
    }
    write!(f, "[")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, "]")
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Any => write!(f, "Any"),
            TypeSpec::Str => write!(f, "str"),
            TypeSpec::Int => write!(f, "int"),
            TypeSpec::Float => write!(f, "float"),
            TypeSpec::Bool => write!(f, "bool"),
            TypeSpec::None => write!(f, "None"),
            TypeSpec::List(args) => write_args(f, "list", args),
            TypeSpec::Tuple(args) => write_args(f, "tuple", args),
            TypeSpec::Dict(args) => write_args(f, "dict", args),
            TypeSpec::Object(schema) => write!(f, "{}", schema.name()),
            TypeSpec::Union(members) => write_args(f, "Union", members),
            TypeSpec::Optional(inner) => write!(f, "Optional[{inner}]"),
            TypeSpec::Opaque(name) => write!(f, "{name}"),
        }
    }
}
