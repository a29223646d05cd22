//! Layer holding raw data handed over by an external loader.

use crate::error::ConfigResult;
use crate::layer::{ConfigLayer, LayerPriority};
use crate::value::{ConfigValue, Map};

/// Already-parsed configuration data from a file, the environment or a
/// remote store.
///
/// The layer does not know where the data came from; a loader builds the
/// nested map and picks the priority. Binding the layer to a profile makes it
/// contribute only to that profile's view.
///
/// # Example
/// ```
/// use tierconf::{ConfigLayer, LayerPriority, SourceConfigLayer};
/// use tierconf::value::Map;
///
/// let data: Map = serde_json::from_str(r#"{"port": 8443}"#).unwrap();
/// let layer = SourceConfigLayer::new("settings.json", LayerPriority::ConfigFile, data)
///     .for_profile("production");
/// assert_eq!(layer.profile(), Some("production"));
/// ```
#[derive(Debug, Clone)]
pub struct SourceConfigLayer {
    name: String,
    priority: LayerPriority,
    profile: Option<String>,
    data: ConfigValue,
}

impl SourceConfigLayer {
    pub fn new(name: impl Into<String>, priority: LayerPriority, data: Map) -> Self {
        Self {
            name: name.into(),
            priority,
            profile: None,
            data: ConfigValue::Object(data),
        }
    }

    /// Binds the layer to a single profile.
    pub fn for_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Splits data whose top-level keys are profile names (for example
    /// `{"default": {...}, "production": {...}}`) into one layer per profile.
    pub fn split_profiles(
        name: impl Into<String>,
        priority: LayerPriority,
        data: Map,
    ) -> Vec<SourceConfigLayer> {
        let name = name.into();
        data.into_iter()
            .filter_map(|(profile, section)| match section {
                ConfigValue::Object(section) => Some(
                    SourceConfigLayer::new(name.clone(), priority, section).for_profile(profile),
                ),
                other => {
                    tracing::warn!(
                        source = %name,
                        profile = %profile,
                        kind = other.type_name(),
                        "ignoring non-object profile section"
                    );
                    None
                }
            })
            .collect()
    }
}

static EMPTY: Map = Map::new();

impl ConfigLayer for SourceConfigLayer {
    fn data(&self) -> &Map {
        self.data.as_object().unwrap_or(&EMPTY)
    }

    fn set(&mut self, key: &str, value: ConfigValue) -> ConfigResult<()> {
        self.data.insert_path(key, value);
        Ok(())
    }

    fn source_name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> LayerPriority {
        self.priority
    }

    fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
