//! Shape tree derived from a schema, used to post-process raw data.

use super::schema::Schema;
use crate::merge::deep_merge;
use crate::types::TypeSpec;
use crate::value::{find_key, ConfigValue, Map};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-field description produced by schema extraction.
///
/// `properties` is filled for nested-object fields, `items` for collections
/// whose elements are nested objects. Nested-object specs and item specs
/// carry a [`Transformer`] that completes raw mappings with the nested
/// schema's defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Spec {
    pub type_class: TypeSpec,
    pub properties: BTreeMap<String, Spec>,
    pub items: Option<Box<Spec>>,
    pub transformer: Option<Transformer>,
}

impl Spec {
    pub fn new(type_class: TypeSpec) -> Self {
        Self {
            type_class,
            properties: BTreeMap::new(),
            items: None,
            transformer: None,
        }
    }

    pub fn with_properties(mut self, properties: BTreeMap<String, Spec>) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_items(mut self, items: Spec) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    pub fn with_transformer(mut self, transformer: Transformer) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// True when applying this spec can change data.
    pub fn transforms(&self) -> bool {
        self.transformer.is_some()
            || self.items.as_ref().is_some_and(|items| items.transforms())
            || self.properties.values().any(Spec::transforms)
    }

    /// Rewrites `value` in place: runs the transformer, then descends into
    /// properties and collection items.
    pub fn apply(&self, value: &mut ConfigValue) {
        if let Some(transformer) = &self.transformer {
            transformer.apply(value);
        }
        if let ConfigValue::Object(obj) = value {
            apply_properties(&self.properties, obj);
        }
        let Some(items) = &self.items else {
            return;
        };
        match value {
            ConfigValue::Array(elements) => elements.iter_mut().for_each(|element| items.apply(element)),
            ConfigValue::Object(obj) if matches!(self.type_class, TypeSpec::Dict(_)) => {
                obj.values_mut().for_each(|element| items.apply(element))
            }
            _ => {}
        }
    }
}

/// Applies each property spec to the matching key of `data`.
pub(crate) fn apply_properties(properties: &BTreeMap<String, Spec>, data: &mut Map) {
    for (name, spec) in properties {
        if !spec.transforms() {
            continue;
        }
        let Some(stored) = find_key(data, name).cloned() else {
            continue;
        };
        if let Some(value) = data.get_mut(&stored) {
            spec.apply(value);
        }
    }
}

/// Completes raw mappings with the defaults of a nested-object schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformer {
    schema: Arc<Schema>,
}

impl Transformer {
    pub fn new(schema: &Arc<Schema>) -> Self {
        Self {
            schema: Arc::clone(schema),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Deep-merges the raw mapping over the schema defaults. Non-mapping
    /// values are left for the type check to report.
    pub fn apply(&self, value: &mut ConfigValue) {
        let ConfigValue::Object(raw) = value else {
            return;
        };
        let Ok(extraction) = self.schema.extraction() else {
            return;
        };
        if extraction.defaults.is_empty() {
            return;
        }
        let mut filled = extraction.defaults.clone();
        deep_merge(&mut filled, std::mem::take(raw));
        *raw = filled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::schema::Field;

    fn plugin_schema() -> Arc<Schema> {
        Schema::builder("Plugin")
            .field(Field::new("name", TypeSpec::Str))
            .field(Field::new("enabled", TypeSpec::Bool).default(true))
            .build()
            .unwrap()
    }

    #[test]
    fn test_transformer_fills_defaults() {
        let transformer = Transformer::new(&plugin_schema());
        let mut value: ConfigValue = serde_json::from_str(r#"{"name": "auth"}"#).unwrap();
        transformer.apply(&mut value);
        assert_eq!(value.get_key("enabled"), Some(&ConfigValue::Boolean(true)));

        let mut explicit: ConfigValue =
            serde_json::from_str(r#"{"name": "auth", "enabled": false}"#).unwrap();
        transformer.apply(&mut explicit);
        assert_eq!(explicit.get_key("enabled"), Some(&ConfigValue::Boolean(false)));

        let mut scalar = ConfigValue::from("auth");
        transformer.apply(&mut scalar);
        assert_eq!(scalar, ConfigValue::from("auth"));
    }

    #[test]
    fn test_spec_applies_to_list_and_dict_items() {
        let schema = plugin_schema();
        let item = Spec::new(TypeSpec::object(&schema)).with_transformer(Transformer::new(&schema));
        let list = Spec::new(TypeSpec::list_of(TypeSpec::object(&schema))).with_items(item.clone());
        let dict = Spec::new(TypeSpec::dict_of(TypeSpec::Str, TypeSpec::object(&schema)))
            .with_items(item);

        let mut data: Map = serde_json::from_str(
            r#"{"plugins": [{"name": "a"}], "by_name": {"b": {"name": "b"}}}"#,
        )
        .unwrap();
        let mut properties = BTreeMap::new();
        properties.insert("plugins".to_string(), list);
        properties.insert("by_name".to_string(), dict);
        apply_properties(&properties, &mut data);

        let root = ConfigValue::Object(data);
        assert_eq!(
            root.lookup_path("plugins.0.enabled"),
            Some(&ConfigValue::Boolean(true))
        );
        assert_eq!(
            root.lookup_path("by_name.b.enabled"),
            Some(&ConfigValue::Boolean(true))
        );
    }
}
