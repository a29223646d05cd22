//! Configuration value types and conversion utilities.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered key-value container used for objects.
pub type Map = BTreeMap<String, ConfigValue>;

/// Represents a configuration value that can be of various types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// String value
    String(String),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// Array of values
    Array(Vec<ConfigValue>),
    /// Object/map of key-value pairs
    Object(Map),
    /// Null value
    Null,
}

/// One component of a dotted key path.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum KeyPart<'a> {
    Key(&'a str),
    Index(usize),
}

/// Splits a dotted key into parts; numeric parts index into arrays.
pub(crate) fn parse_key(key: &str) -> Vec<KeyPart<'_>> {
    key.split('.')
        .map(|part| match part.parse::<usize>() {
            Ok(index) => KeyPart::Index(index),
            Err(_) => KeyPart::Key(part),
        })
        .collect()
}

/// Finds the stored spelling of `key` in `map`, exact match first.
pub(crate) fn find_key<'m>(map: &'m Map, key: &str) -> Option<&'m String> {
    if let Some((stored, _)) = map.get_key_value(key) {
        return Some(stored);
    }
    map.keys().find(|stored| stored.eq_ignore_ascii_case(key))
}

impl ConfigValue {
    /// Creates an empty object value.
    pub fn object() -> Self {
        ConfigValue::Object(Map::new())
    }

    /// Returns the value as a string reference if it's a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an i64 if it's an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as an f64 if it's a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the value as a bool if it's a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an array reference if it's an array.
    pub fn as_array(&self) -> Option<&Vec<ConfigValue>> {
        match self {
            ConfigValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Returns the value as an object reference if it's an object.
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            ConfigValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Returns the value as a mutable object reference if it's an object.
    pub fn as_object_mut(&mut self) -> Option<&mut Map> {
        match self {
            ConfigValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Checks if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    /// Checks if the value is an object.
    pub fn is_object(&self) -> bool {
        matches!(self, ConfigValue::Object(_))
    }

    /// Looks up a direct child of an object, ignoring ASCII case when no
    /// exact match exists.
    ///
    /// # Example
    /// ```
    /// use tierconf::ConfigValue;
    /// use tierconf::value::Map;
    ///
    /// let mut map = Map::new();
    /// map.insert("PORT".to_string(), ConfigValue::from(8080i64));
    /// let value = ConfigValue::Object(map);
    /// assert_eq!(value.get_key("port"), Some(&ConfigValue::Integer(8080)));
    /// ```
    pub fn get_key(&self, key: &str) -> Option<&ConfigValue> {
        let obj = self.as_object()?;
        find_key(obj, key).and_then(|stored| obj.get(stored))
    }

    /// Resolves a dotted path such as `servers.0.port`.
    pub fn lookup_path(&self, path: &str) -> Option<&ConfigValue> {
        if path.is_empty() {
            return Some(self);
        }
        let mut current = self;
        for part in parse_key(path) {
            current = match (part, current) {
                (KeyPart::Key(key), ConfigValue::Object(_)) => current.get_key(key)?,
                (KeyPart::Index(index), ConfigValue::Array(arr)) => arr.get(index)?,
                // numeric keys are legal object keys too
                (KeyPart::Index(index), ConfigValue::Object(_)) => {
                    current.get_key(&index.to_string())?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Inserts `value` at a dotted path, creating intermediate objects and
    /// overwriting non-object intermediates.
    pub fn insert_path(&mut self, path: &str, value: ConfigValue) {
        if !self.is_object() {
            *self = ConfigValue::object();
        }
        let parts: Vec<&str> = path.split('.').collect();
        insert_path_recursive(self, &parts, value);
    }

    /// Removes the value at a dotted path, returning it if it existed.
    pub fn remove_path(&mut self, path: &str) -> Option<ConfigValue> {
        let (parent, leaf) = match path.rsplit_once('.') {
            Some((parent, leaf)) => (parent, leaf),
            None => ("", path),
        };
        let target = if parent.is_empty() {
            self
        } else {
            self.lookup_path_mut(parent)?
        };
        let obj = target.as_object_mut()?;
        let stored = find_key(obj, leaf)?.clone();
        obj.remove(&stored)
    }

    fn lookup_path_mut(&mut self, path: &str) -> Option<&mut ConfigValue> {
        let mut current = self;
        for part in path.split('.') {
            current = match current {
                ConfigValue::Object(obj) => {
                    let stored = find_key(obj, part)?.clone();
                    obj.get_mut(&stored)?
                }
                ConfigValue::Array(arr) => arr.get_mut(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Coerces the value to a string representation.
    pub fn coerce_to_string(&self) -> String {
        match self {
            ConfigValue::String(s) => s.clone(),
            ConfigValue::Integer(i) => i.to_string(),
            ConfigValue::Float(f) => f.to_string(),
            ConfigValue::Boolean(b) => b.to_string(),
            ConfigValue::Array(_) => "[array]".to_string(),
            ConfigValue::Object(_) => "[object]".to_string(),
            ConfigValue::Null => "".to_string(),
        }
    }

    /// Coerces the value to a boolean representation.
    /// Returns None if the value cannot be meaningfully converted to a boolean.
    pub fn coerce_to_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            ConfigValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" | "t" | "y" => Some(true),
                "false" | "0" | "no" | "off" | "f" | "n" | "" => Some(false),
                _ => None,
            },
            ConfigValue::Integer(i) => Some(*i != 0),
            ConfigValue::Float(f) => Some(*f != 0.0),
            ConfigValue::Null => Some(false),
            ConfigValue::Array(arr) => Some(!arr.is_empty()),
            ConfigValue::Object(obj) => Some(!obj.is_empty()),
        }
    }

    /// Returns the type name of the ConfigValue variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::String(_) => "String",
            ConfigValue::Integer(_) => "Integer",
            ConfigValue::Float(_) => "Float",
            ConfigValue::Boolean(_) => "Boolean",
            ConfigValue::Array(_) => "Array",
            ConfigValue::Object(_) => "Object",
            ConfigValue::Null => "Null",
        }
    }
}

fn insert_path_recursive(current: &mut ConfigValue, parts: &[&str], value: ConfigValue) {
    let Some((head, rest)) = parts.split_first() else {
        return;
    };
    if !current.is_object() {
        *current = ConfigValue::object();
    }
    let ConfigValue::Object(obj) = current else {
        return;
    };
    let stored = find_key(obj, head)
        .cloned()
        .unwrap_or_else(|| head.to_string());

    if rest.is_empty() {
        obj.insert(stored, value);
        return;
    }

    let entry = obj.entry(stored).or_insert_with(ConfigValue::object);
    insert_path_recursive(entry, rest, value);
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => write!(f, "{s}"),
            ConfigValue::Integer(i) => write!(f, "{i}"),
            ConfigValue::Float(x) => write!(f, "{x}"),
            ConfigValue::Boolean(b) => write!(f, "{b}"),
            ConfigValue::Null => write!(f, "null"),
            ConfigValue::Array(arr) => {
                write!(f, "[")?;
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            ConfigValue::Object(obj) => {
                write!(f, "{{")?;
                for (i, (key, item)) in obj.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {item}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Integer(i)
    }
}

impl From<i32> for ConfigValue {
    fn from(i: i32) -> Self {
        ConfigValue::Integer(i as i64)
    }
}

impl From<u32> for ConfigValue {
    fn from(i: u32) -> Self {
        ConfigValue::Integer(i as i64)
    }
}

impl From<f64> for ConfigValue {
    fn from(f: f64) -> Self {
        ConfigValue::Float(f)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Boolean(b)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(arr: Vec<ConfigValue>) -> Self {
        ConfigValue::Array(arr)
    }
}

impl From<Map> for ConfigValue {
    fn from(obj: Map) -> Self {
        ConfigValue::Object(obj)
    }
}

impl From<Option<ConfigValue>> for ConfigValue {
    fn from(opt: Option<ConfigValue>) -> Self {
        opt.unwrap_or(ConfigValue::Null)
    }
}

/// Error type for ConfigValue conversion failures
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionError {
    pub from_type: String,
    pub to_type: String,
    pub value: String,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot convert {} value '{}' to {}",
            self.from_type, self.value, self.to_type
        )
    }
}

impl std::error::Error for ConversionError {}

impl ConversionError {
    fn new(value: &ConfigValue, to_type: &str) -> Self {
        Self {
            from_type: value.type_name().to_string(),
            to_type: to_type.to_string(),
            value: value.coerce_to_string(),
        }
    }
}

impl TryFrom<ConfigValue> for i64 {
    type Error = ConversionError;

    fn try_from(value: ConfigValue) -> Result<Self, Self::Error> {
        match value {
            ConfigValue::Integer(i) => Ok(i),
            _ => Err(ConversionError::new(&value, "i64")),
        }
    }
}

impl TryFrom<ConfigValue> for f64 {
    type Error = ConversionError;

    fn try_from(value: ConfigValue) -> Result<Self, Self::Error> {
        match value {
            ConfigValue::Float(f) => Ok(f),
            ConfigValue::Integer(i) => Ok(i as f64),
            _ => Err(ConversionError::new(&value, "f64")),
        }
    }
}
