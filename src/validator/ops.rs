//! Comparison operations a [`Validator`](super::Validator) can apply.
//!
//! Every function is pure and compares the resolved value as-is; loaders are
//! expected to have produced native values already, so no string-to-number
//! coercion happens here. Integers and floats compare numerically, every
//! other cross-type comparison is false.

use crate::types::TypeSpec;
use crate::value::ConfigValue;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

/// A named comparison together with its operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Eq(ConfigValue),
    Ne(ConfigValue),
    Gt(ConfigValue),
    Lt(ConfigValue),
    Gte(ConfigValue),
    Lte(ConfigValue),
    IsTypeOf(TypeSpec),
    IsIn(Vec<ConfigValue>),
    IsNotIn(Vec<ConfigValue>),
    /// Same type and same value, without numeric widening
    Identity(ConfigValue),
    /// Substring, element or key membership
    Cont(ConfigValue),
    LenEq(usize),
    LenNe(usize),
    LenMin(usize),
    LenMax(usize),
    StartsWith(String),
    EndsWith(String),
    Regex(Pattern),
}

impl Operation {
    /// Name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Eq(_) => "eq",
            Operation::Ne(_) => "ne",
            Operation::Gt(_) => "gt",
            Operation::Lt(_) => "lt",
            Operation::Gte(_) => "gte",
            Operation::Lte(_) => "lte",
            Operation::IsTypeOf(_) => "is_type_of",
            Operation::IsIn(_) => "is_in",
            Operation::IsNotIn(_) => "is_not_in",
            Operation::Identity(_) => "identity",
            Operation::Cont(_) => "cont",
            Operation::LenEq(_) => "len_eq",
            Operation::LenNe(_) => "len_ne",
            Operation::LenMin(_) => "len_min",
            Operation::LenMax(_) => "len_max",
            Operation::StartsWith(_) => "startswith",
            Operation::EndsWith(_) => "endswith",
            Operation::Regex(_) => "regex",
        }
    }

    /// Operand rendered for error messages.
    pub fn operand(&self) -> String {
        match self {
            Operation::Eq(v)
            | Operation::Ne(v)
            | Operation::Gt(v)
            | Operation::Lt(v)
            | Operation::Gte(v)
            | Operation::Lte(v)
            | Operation::Identity(v)
            | Operation::Cont(v) => v.to_string(),
            Operation::IsTypeOf(spec) => spec.to_string(),
            Operation::IsIn(values) | Operation::IsNotIn(values) => {
                ConfigValue::Array(values.clone()).to_string()
            }
            Operation::LenEq(n) | Operation::LenNe(n) | Operation::LenMin(n) | Operation::LenMax(n) => {
                n.to_string()
            }
            Operation::StartsWith(s) | Operation::EndsWith(s) => s.clone(),
            Operation::Regex(pattern) => pattern.source().to_string(),
        }
    }

    /// Applies the operation to `value`.
    pub fn evaluate(&self, value: &ConfigValue) -> bool {
        match self {
            Operation::Eq(operand) => eq(value, operand),
            Operation::Ne(operand) => ne(value, operand),
            Operation::Gt(operand) => gt(value, operand),
            Operation::Lt(operand) => lt(value, operand),
            Operation::Gte(operand) => gte(value, operand),
            Operation::Lte(operand) => lte(value, operand),
            Operation::IsTypeOf(spec) => is_type_of(value, spec),
            Operation::IsIn(options) => is_in(value, options),
            Operation::IsNotIn(options) => is_not_in(value, options),
            Operation::Identity(operand) => identity(value, operand),
            Operation::Cont(operand) => cont(value, operand),
            Operation::LenEq(n) => len_eq(value, *n),
            Operation::LenNe(n) => len_ne(value, *n),
            Operation::LenMin(n) => len_min(value, *n),
            Operation::LenMax(n) => len_max(value, *n),
            Operation::StartsWith(prefix) => startswith(value, prefix),
            Operation::EndsWith(suffix) => endswith(value, suffix),
            Operation::Regex(pattern) => pattern.is_match(value),
        }
    }
}

/// A regular expression operand, compared by its source text.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    compiled: Option<Regex>,
}

impl Pattern {
    /// Compiles `source`; an invalid expression never matches.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let compiled = match Regex::new(&source) {
            Ok(regex) => Some(regex),
            Err(err) => {
                tracing::warn!(pattern = %source, error = %err, "invalid regex operand");
                None
            }
        };
        Self { source, compiled }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_valid(&self) -> bool {
        self.compiled.is_some()
    }

    fn is_match(&self, value: &ConfigValue) -> bool {
        match (&self.compiled, value) {
            (Some(regex), ConfigValue::String(s)) => regex.is_match(s),
            _ => false,
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

fn compare(value: &ConfigValue, operand: &ConfigValue) -> Option<Ordering> {
    match (value, operand) {
        (ConfigValue::Integer(a), ConfigValue::Integer(b)) => Some(a.cmp(b)),
        (ConfigValue::Integer(_) | ConfigValue::Float(_), ConfigValue::Integer(_) | ConfigValue::Float(_)) => {
            value.as_f64()?.partial_cmp(&operand.as_f64()?)
        }
        (ConfigValue::String(a), ConfigValue::String(b)) => Some(a.cmp(b)),
        (ConfigValue::Boolean(a), ConfigValue::Boolean(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn length(value: &ConfigValue) -> Option<usize> {
    match value {
        ConfigValue::String(s) => Some(s.chars().count()),
        ConfigValue::Array(items) => Some(items.len()),
        ConfigValue::Object(obj) => Some(obj.len()),
        _ => None,
    }
}

pub fn eq(value: &ConfigValue, operand: &ConfigValue) -> bool {
    match compare(value, operand) {
        Some(ordering) => ordering == Ordering::Equal,
        None => value == operand,
    }
}

pub fn ne(value: &ConfigValue, operand: &ConfigValue) -> bool {
    !eq(value, operand)
}

pub fn gt(value: &ConfigValue, operand: &ConfigValue) -> bool {
    compare(value, operand) == Some(Ordering::Greater)
}

pub fn lt(value: &ConfigValue, operand: &ConfigValue) -> bool {
    compare(value, operand) == Some(Ordering::Less)
}

pub fn gte(value: &ConfigValue, operand: &ConfigValue) -> bool {
    matches!(
        compare(value, operand),
        Some(Ordering::Greater | Ordering::Equal)
    )
}

pub fn lte(value: &ConfigValue, operand: &ConfigValue) -> bool {
    matches!(compare(value, operand), Some(Ordering::Less | Ordering::Equal))
}

pub fn is_type_of(value: &ConfigValue, spec: &TypeSpec) -> bool {
    spec.matches(value)
}

pub fn is_in(value: &ConfigValue, options: &[ConfigValue]) -> bool {
    options.iter().any(|option| eq(value, option))
}

pub fn is_not_in(value: &ConfigValue, options: &[ConfigValue]) -> bool {
    !is_in(value, options)
}

pub fn identity(value: &ConfigValue, operand: &ConfigValue) -> bool {
    value == operand
}

pub fn cont(value: &ConfigValue, operand: &ConfigValue) -> bool {
    match (value, operand) {
        (ConfigValue::String(haystack), ConfigValue::String(needle)) => haystack.contains(needle.as_str()),
        (ConfigValue::Array(items), _) => items.iter().any(|item| eq(item, operand)),
        (ConfigValue::Object(_), ConfigValue::String(key)) => value.get_key(key).is_some(),
        _ => false,
    }
}

pub fn len_eq(value: &ConfigValue, n: usize) -> bool {
    length(value) == Some(n)
}

pub fn len_ne(value: &ConfigValue, n: usize) -> bool {
    length(value).is_some_and(|len| len != n)
}

pub fn len_min(value: &ConfigValue, n: usize) -> bool {
    length(value).is_some_and(|len| len >= n)
}

pub fn len_max(value: &ConfigValue, n: usize) -> bool {
    length(value).is_some_and(|len| len <= n)
}

pub fn startswith(value: &ConfigValue, prefix: &str) -> bool {
    value.as_str().is_some_and(|s| s.starts_with(prefix))
}

pub fn endswith(value: &ConfigValue, suffix: &str) -> bool {
    value.as_str().is_some_and(|s| s.ends_with(suffix))
}
