//! Configuration layer abstractions and priority management.

use crate::error::ConfigResult;
use crate::value::{find_key, ConfigValue, Map};

/// Trait for configuration layers that provide key-value access.
pub trait ConfigLayer: Send + Sync {
    /// Returns the nested data held by this layer.
    fn data(&self) -> &Map;

    /// Gets a configuration value by dotted key.
    fn get(&self, key: &str) -> ConfigResult<Option<ConfigValue>> {
        let (head, rest) = match key.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (key, None),
        };
        let value = find_key(self.data(), head).and_then(|stored| self.data().get(stored));
        let found = match rest {
            Some(rest) => value.and_then(|value| value.lookup_path(rest)),
            None => value,
        };
        Ok(found.cloned())
    }

    /// Sets a configuration value by dotted key.
    fn set(&mut self, key: &str, value: ConfigValue) -> ConfigResult<()>;

    /// Returns the top-level keys available in this layer.
    fn keys(&self) -> Vec<String> {
        self.data().keys().cloned().collect()
    }

    /// Returns a human-readable name for this configuration source.
    fn source_name(&self) -> &str;

    /// Returns the priority of this layer for precedence resolution.
    fn priority(&self) -> LayerPriority;

    /// Returns the profile this layer is bound to, `None` for every profile.
    fn profile(&self) -> Option<&str> {
        None
    }

    /// Returns a reference to the layer as Any for downcasting.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Returns a mutable reference to the layer as Any for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// Priority levels for configuration layers.
/// Lower numeric values have higher precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerPriority {
    /// Explicit set() calls - highest precedence
    Explicit = 0,
    /// Values passed when the settings object is constructed
    Init = 1,
    /// Values read from environment variables by a loader
    Environment = 2,
    /// Values read from configuration files by a loader
    ConfigFile = 3,
    /// Values read from remote key-value stores by a loader
    KeyValue = 4,
    /// Default values - lowest precedence
    Defaults = 5,
}

impl LayerPriority {
    /// Returns a human-readable description of the priority level.
    pub fn description(&self) -> &'static str {
        match self {
            LayerPriority::Explicit => "Explicit calls",
            LayerPriority::Init => "Construction-time values",
            LayerPriority::Environment => "Environment variables",
            LayerPriority::ConfigFile => "Configuration files",
            LayerPriority::KeyValue => "Key-value stores",
            LayerPriority::Defaults => "Default values",
        }
    }
}

/// Layer management utilities for sorting and merging configuration layers.
pub mod utils {
    use super::*;
    use crate::merge::deep_merge;

    /// Sorts configuration layers by priority (highest precedence first).
    /// Within one priority, profile-bound layers come before shared ones.
    pub fn sort_layers_by_priority(layers: &mut [Box<dyn ConfigLayer>]) {
        layers.sort_by_key(|layer| (layer.priority(), layer.profile().is_none()));
    }

    /// Returns true if `layer` contributes to the view of `env`.
    pub fn applies_to(layer: &dyn ConfigLayer, env: &str, default_env: &str) -> bool {
        match layer.profile() {
            None => true,
            Some(profile) => {
                profile.eq_ignore_ascii_case(env) || profile.eq_ignore_ascii_case(default_env)
            }
        }
    }

    /// Deep-merges every layer that applies to `env` into one map.
    ///
    /// Within one priority, layers bound to `env` override layers bound to
    /// `default_env`, which override shared layers. Higher priorities
    /// override lower ones.
    pub fn merge_layers_for_env(
        layers: &[Box<dyn ConfigLayer>],
        env: &str,
        default_env: &str,
    ) -> Map {
        let rank = |layer: &dyn ConfigLayer| match layer.profile() {
            Some(profile) if profile.eq_ignore_ascii_case(env) => 0u8,
            Some(_) => 1,
            None => 2,
        };
        let mut applicable: Vec<&dyn ConfigLayer> = layers
            .iter()
            .map(|layer| layer.as_ref())
            .filter(|layer| applies_to(*layer, env, default_env))
            .collect();
        applicable.sort_by_key(|layer| (layer.priority(), rank(*layer)));

        let mut merged = Map::new();
        for layer in applicable.into_iter().rev() {
            deep_merge(&mut merged, layer.data().clone());
        }
        tracing::trace!(env, keys = merged.len(), "merged configuration layers");
        merged
    }
}
