//! Default configuration layer implementation.

use crate::error::ConfigResult;
use crate::layer::{ConfigLayer, LayerPriority};
use crate::merge::deep_merge;
use crate::value::{ConfigValue, Map};

/// Configuration layer for storing default values.
/// This layer has the lowest precedence in the configuration hierarchy.
///
/// Typed schemas place their extracted defaults here, so anything loaded
/// or set later overrides them.
#[derive(Debug, Clone)]
pub struct DefaultConfigLayer {
    /// Nested storage for default configuration values
    data: ConfigValue,
}

impl DefaultConfigLayer {
    /// Creates a new empty default configuration layer.
    ///
    /// # Example
    /// ```
    /// use tierconf::{DefaultConfigLayer, ConfigLayer};
    ///
    /// let defaults = DefaultConfigLayer::new();
    /// assert_eq!(defaults.keys().len(), 0);
    /// ```
    pub fn new() -> Self {
        Self {
            data: ConfigValue::object(),
        }
    }

    /// Creates a new default configuration layer with initial nested values.
    ///
    /// # Example
    /// ```
    /// use tierconf::{DefaultConfigLayer, ConfigValue, ConfigLayer};
    /// use tierconf::value::Map;
    ///
    /// let mut defaults = Map::new();
    /// defaults.insert("host".to_string(), ConfigValue::from("localhost"));
    /// defaults.insert("port".to_string(), ConfigValue::from(8080i64));
    ///
    /// let layer = DefaultConfigLayer::with_defaults(defaults);
    /// assert_eq!(layer.keys().len(), 2);
    /// ```
    pub fn with_defaults(defaults: Map) -> Self {
        Self {
            data: ConfigValue::Object(defaults),
        }
    }

    /// Deep-merges several default values at once; incoming values win.
    pub fn set_defaults(&mut self, defaults: Map) -> ConfigResult<()> {
        if let Some(obj) = self.data.as_object_mut() {
            deep_merge(obj, defaults);
        }
        Ok(())
    }

    /// Clears all default values from the layer.
    pub fn clear(&mut self) {
        self.data = ConfigValue::object();
    }

    /// Returns the number of top-level default values stored in this layer.
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Returns true if the layer contains no default values.
    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// Checks if a specific dotted key exists in the default values.
    ///
    /// # Example
    /// ```
    /// use tierconf::{DefaultConfigLayer, ConfigValue, ConfigLayer};
    ///
    /// let mut layer = DefaultConfigLayer::new();
    /// layer.set("database.host", ConfigValue::from("localhost")).unwrap();
    ///
    /// assert!(layer.contains_key("database.host"));
    /// assert!(!layer.contains_key("database.port"));
    /// ```
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.lookup_path(key).is_some()
    }

    /// Removes a default value by dotted key.
    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.data.remove_path(key)
    }
}

static EMPTY: Map = Map::new();

impl ConfigLayer for DefaultConfigLayer {
    fn data(&self) -> &Map {
        self.data.as_object().unwrap_or(&EMPTY)
    }

    fn set(&mut self, key: &str, value: ConfigValue) -> ConfigResult<()> {
        self.data.insert_path(key, value);
        Ok(())
    }

    fn source_name(&self) -> &str {
        "defaults"
    }

    fn priority(&self) -> LayerPriority {
        LayerPriority::Defaults
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl Default for DefaultConfigLayer {
    fn default() -> Self {
        Self::new()
    }
}
