//! The settings object: layered storage, profile resolution, validation and
//! hooks.

use crate::default_layer::DefaultConfigLayer;
use crate::error::{ConfigError, ConfigResult, ConfigResultExt, ValidationError};
use crate::hooks::{HookArgs, HookReceiver, HookValue, HookedMethod, Hooks};
use crate::layer::{utils, ConfigLayer, LayerPriority};
use crate::source_layer::SourceConfigLayer;
use crate::typed::spec::{apply_properties, Spec};
use crate::validator::{ValidateOptions, ValidatorList};
use crate::value::{ConfigValue, Map};
use std::collections::BTreeMap;
use std::fmt;

/// Profile that is active unless another one is chosen.
pub const DEFAULT_ENV: &str = "development";

/// Profile whose layers contribute to every other profile.
pub const SHARED_ENV: &str = "default";

/// Layered configuration with an active profile.
///
/// Layers are kept ordered by precedence (highest first). Every mutation
/// re-merges the layers that apply to the active profile into one store, so
/// reads and validation work on a single resolved tree.
///
/// # Example
/// ```
/// use tierconf::{Settings, ConfigValue};
///
/// let mut settings = Settings::new();
/// settings.set_default("database.host", ConfigValue::from("localhost")).unwrap();
/// settings.set("database.port", ConfigValue::from(5432i64)).unwrap();
///
/// assert_eq!(settings.get_string("DATABASE.HOST").unwrap(), Some("localhost".to_string()));
/// assert_eq!(settings.get_int("database.port").unwrap(), Some(5432));
/// ```
pub struct Settings {
    /// Configuration layers ordered by precedence (highest first)
    layers: Vec<Box<dyn ConfigLayer>>,

    /// Active profile
    env: String,

    /// Profile shared by all profiles
    default_env: String,

    /// Merged data for the active profile
    store: ConfigValue,

    /// Field specs of a typed schema, applied after every merge
    spec: BTreeMap<String, Spec>,

    validators: ValidatorList,

    hooks: Hooks,
}

impl Settings {
    /// Creates an empty settings object for the `development` profile.
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            env: DEFAULT_ENV.to_string(),
            default_env: SHARED_ENV.to_string(),
            store: ConfigValue::object(),
            spec: BTreeMap::new(),
            validators: ValidatorList::new(),
            hooks: Hooks::new(),
        }
    }

    /// Creates an empty settings object for `env`.
    pub fn for_env(env: impl Into<String>) -> Self {
        let mut settings = Self::new();
        settings.env = env.into();
        settings
    }

    /// Adds a configuration layer; layers are re-sorted by priority.
    ///
    /// # Example
    /// ```
    /// use tierconf::{Settings, SourceConfigLayer, LayerPriority};
    /// use tierconf::value::Map;
    ///
    /// let data: Map = serde_json::from_str(r#"{"port": 8000}"#).unwrap();
    /// let mut settings = Settings::new();
    /// settings.add_layer(Box::new(SourceConfigLayer::new("app.json", LayerPriority::ConfigFile, data)));
    /// assert_eq!(settings.get_int("port").unwrap(), Some(8000));
    /// ```
    pub fn add_layer(&mut self, layer: Box<dyn ConfigLayer>) {
        tracing::debug!(
            source = layer.source_name(),
            priority = ?layer.priority(),
            profile = layer.profile(),
            "adding configuration layer"
        );
        self.layers.push(layer);
        utils::sort_layers_by_priority(&mut self.layers);
        self.rebuild();
    }

    /// Adds one layer per profile section of `data`.
    pub fn add_profiled_source(&mut self, name: &str, priority: LayerPriority, data: Map) {
        for layer in SourceConfigLayer::split_profiles(name, priority, data) {
            self.layers.push(Box::new(layer));
        }
        utils::sort_layers_by_priority(&mut self.layers);
        self.rebuild();
    }

    /// Removes all layers with the specified priority, returning how many
    /// were removed.
    pub fn remove_layers_by_priority(&mut self, priority: LayerPriority) -> usize {
        let initial_len = self.layers.len();
        self.layers.retain(|layer| layer.priority() != priority);
        self.rebuild();
        initial_len - self.layers.len()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Returns a list of all layer source names and their priorities.
    pub fn layer_info(&self) -> Vec<(String, LayerPriority)> {
        self.layers
            .iter()
            .map(|layer| (layer.source_name().to_string(), layer.priority()))
            .collect()
    }

    pub fn clear_layers(&mut self) {
        self.layers.clear();
        self.rebuild();
    }

    pub fn current_env(&self) -> &str {
        &self.env
    }

    pub fn default_env(&self) -> &str {
        &self.default_env
    }

    /// Switches the active profile and re-resolves the store.
    pub fn set_env(&mut self, env: impl Into<String>) {
        self.env = env.into();
        tracing::debug!(env = %self.env, "switching active profile");
        self.rebuild();
    }

    pub fn set_default_env(&mut self, env: impl Into<String>) {
        self.default_env = env.into();
        self.rebuild();
    }

    /// Resolved data of any profile, without switching to it.
    pub fn env_view(&self, env: &str) -> Map {
        if env.eq_ignore_ascii_case(&self.env) {
            return self.all_settings();
        }
        self.resolve(env)
    }

    /// The resolved store of the active profile.
    pub fn as_value(&self) -> &ConfigValue {
        &self.store
    }

    pub(crate) fn set_spec(&mut self, spec: BTreeMap<String, Spec>) {
        self.spec = spec;
        self.rebuild();
    }

    fn resolve(&self, env: &str) -> Map {
        let mut merged = utils::merge_layers_for_env(&self.layers, env, &self.default_env);
        apply_properties(&self.spec, &mut merged);
        merged
    }

    fn rebuild(&mut self) {
        self.store = ConfigValue::Object(self.resolve(&self.env));
    }

    /// Gets a value by case-insensitive dotted key (`servers.0.port`
    /// indexes arrays). Runs `get` hooks when any are registered.
    pub fn get(&self, key: &str) -> ConfigResult<Option<ConfigValue>> {
        if !self.hooks.is_hooked(HookedMethod::Get) {
            return self.get_unhooked(key);
        }
        let receiver = HookReceiver::new(self);
        let args = HookArgs {
            method: HookedMethod::Get,
            key: Some(key),
            value: None,
        };
        let result = match self.hooks.run_before(&receiver, &args) {
            eager @ HookValue::Eager(_) => eager,
            _ => HookValue::from(self.get_unhooked(key)?),
        };
        Ok(self.hooks.run_after(&receiver, &args, result).into_value())
    }

    pub(crate) fn get_unhooked(&self, key: &str) -> ConfigResult<Option<ConfigValue>> {
        Ok(self.store.lookup_path(key).cloned())
    }

    /// Gets a value, falling back to `default` when the key is absent.
    pub fn get_or(&self, key: &str, default: impl Into<ConfigValue>) -> ConfigResult<ConfigValue> {
        Ok(self.get(key)?.unwrap_or_else(|| default.into()))
    }

    /// Gets a value that must exist.
    ///
    /// # Example
    /// ```
    /// use tierconf::Settings;
    ///
    /// let settings = Settings::new();
    /// assert!(settings.attr("missing").unwrap_err().is_key_not_found());
    /// ```
    pub fn attr(&self, key: &str) -> ConfigResult<ConfigValue> {
        self.get(key)?.ok_or_else(|| ConfigError::key_not_found(key))
    }

    /// Gets a configuration value as a string.
    pub fn get_string(&self, key: &str) -> ConfigResult<Option<String>> {
        Ok(self.get(key)?.map(|value| value.coerce_to_string()))
    }

    /// Gets an integer; numeric strings are parsed.
    pub fn get_int(&self, key: &str) -> ConfigResult<Option<i64>> {
        match self.get(key)? {
            Some(ConfigValue::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| ConfigError::type_conversion("String", "i64")),
            Some(value) => i64::try_from(value)
                .map(Some)
                .map_err(|e| ConfigError::type_conversion(e.from_type, e.to_type)),
            None => Ok(None),
        }
    }

    /// Gets a float; integers widen and numeric strings are parsed.
    pub fn get_float(&self, key: &str) -> ConfigResult<Option<f64>> {
        match self.get(key)? {
            Some(ConfigValue::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| ConfigError::type_conversion("String", "f64")),
            Some(value) => f64::try_from(value)
                .map(Some)
                .map_err(|e| ConfigError::type_conversion(e.from_type, e.to_type)),
            None => Ok(None),
        }
    }

    /// Gets a boolean, accepting the usual truthy and falsy spellings.
    pub fn get_bool(&self, key: &str) -> ConfigResult<Option<bool>> {
        match self.get(key)? {
            Some(value) => value
                .coerce_to_bool()
                .map(Some)
                .ok_or_else(|| ConfigError::type_conversion(value.type_name(), "bool")),
            None => Ok(None),
        }
    }

    pub fn get_array(&self, key: &str) -> ConfigResult<Option<Vec<ConfigValue>>> {
        match self.get(key)? {
            Some(ConfigValue::Array(items)) => Ok(Some(items)),
            Some(value) => Err(ConfigError::type_conversion(value.type_name(), "Array")),
            None => Ok(None),
        }
    }

    pub fn get_object(&self, key: &str) -> ConfigResult<Option<Map>> {
        match self.get(key)? {
            Some(ConfigValue::Object(obj)) => Ok(Some(obj)),
            Some(value) => Err(ConfigError::type_conversion(value.type_name(), "Object")),
            None => Ok(None),
        }
    }

    /// Checks whether a key resolves to a value in the active profile.
    pub fn is_set(&self, key: &str) -> bool {
        self.store.lookup_path(key).is_some()
    }

    /// Top-level keys of the active profile.
    pub fn all_keys(&self) -> Vec<String> {
        self.store
            .as_object()
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The merged data of the active profile.
    pub fn all_settings(&self) -> Map {
        self.store.as_object().cloned().unwrap_or_default()
    }

    /// Sets a configuration value explicitly (highest precedence). Runs
    /// `set` hooks when any are registered; an eager before-hook skips the
    /// write. A non-mapping value set where a lower layer holds a mapping is
    /// kept in the explicit layer but loses the merge, which logs a warning.
    pub fn set(&mut self, key: &str, value: ConfigValue) -> ConfigResult<()> {
        if !self.hooks.is_hooked(HookedMethod::Set) {
            return self.set_unhooked(key, value);
        }
        let hooks = self.hooks.clone();
        let argument = value.clone();
        let args = HookArgs {
            method: HookedMethod::Set,
            key: Some(key),
            value: Some(&argument),
        };
        let before = hooks.run_before(&HookReceiver::new(self), &args);
        let result = if before.is_eager() {
            before
        } else {
            self.set_unhooked(key, value)?;
            HookValue::Empty
        };
        hooks.run_after(&HookReceiver::new(self), &args, result);
        Ok(())
    }

    fn set_unhooked(&mut self, key: &str, value: ConfigValue) -> ConfigResult<()> {
        self.explicit_layer()?.set(key, value)?;
        self.rebuild();
        Ok(())
    }

    /// Sets several explicit values at once; keys may be dotted. Runs
    /// `update` hooks when any are registered.
    pub fn update(&mut self, data: Map) -> ConfigResult<()> {
        if !self.hooks.is_hooked(HookedMethod::Update) {
            return self.update_unhooked(data);
        }
        let hooks = self.hooks.clone();
        let argument = ConfigValue::Object(data);
        let args = HookArgs {
            method: HookedMethod::Update,
            key: None,
            value: Some(&argument),
        };
        let before = hooks.run_before(&HookReceiver::new(self), &args);
        let result = if before.is_eager() {
            before
        } else {
            let data = argument.as_object().cloned().unwrap_or_default();
            self.update_unhooked(data)?;
            HookValue::Empty
        };
        hooks.run_after(&HookReceiver::new(self), &args, result);
        Ok(())
    }

    fn update_unhooked(&mut self, data: Map) -> ConfigResult<()> {
        let layer = self.explicit_layer()?;
        for (key, value) in data {
            layer.set(&key, value)?;
        }
        self.rebuild();
        Ok(())
    }

    fn explicit_layer(&mut self) -> ConfigResult<&mut Box<dyn ConfigLayer>> {
        if !self.layers.iter().any(|layer| layer.as_any().is::<ExplicitConfigLayer>()) {
            self.layers.push(Box::new(ExplicitConfigLayer::new()));
            utils::sort_layers_by_priority(&mut self.layers);
        }
        self.layers
            .iter_mut()
            .find(|layer| layer.as_any().is::<ExplicitConfigLayer>())
            .ok_or_else(|| ConfigError::invalid_value("explicit layer is unavailable"))
    }

    fn defaults_layer(&mut self) -> ConfigResult<&mut DefaultConfigLayer> {
        if !self.layers.iter().any(|layer| layer.as_any().is::<DefaultConfigLayer>()) {
            self.layers.push(Box::new(DefaultConfigLayer::new()));
            utils::sort_layers_by_priority(&mut self.layers);
        }
        self.layers
            .iter_mut()
            .find_map(|layer| layer.as_any_mut().downcast_mut::<DefaultConfigLayer>())
            .ok_or_else(|| ConfigError::invalid_value("defaults layer is unavailable"))
    }

    /// Sets a default configuration value (lowest precedence).
    pub fn set_default(&mut self, key: &str, value: ConfigValue) -> ConfigResult<()> {
        self.defaults_layer()?.set(key, value)?;
        self.rebuild();
        Ok(())
    }

    /// Deep-merges several defaults at once; incoming values win over
    /// existing defaults.
    pub fn set_defaults(&mut self, defaults: Map) -> ConfigResult<()> {
        self.defaults_layer()?.set_defaults(defaults)?;
        self.rebuild();
        Ok(())
    }

    /// Creates a settings object rooted at `key`. Returns `None` when the key
    /// is absent or not an object.
    ///
    /// # Example
    /// ```
    /// use tierconf::{Settings, ConfigValue};
    ///
    /// let mut settings = Settings::new();
    /// settings.set("database.host", ConfigValue::from("localhost")).unwrap();
    ///
    /// let database = settings.sub("database").unwrap().unwrap();
    /// assert_eq!(database.get_string("host").unwrap(), Some("localhost".to_string()));
    /// assert!(settings.sub("database.host").unwrap().is_none());
    /// ```
    pub fn sub(&self, key: &str) -> ConfigResult<Option<Settings>> {
        match self.get(key)? {
            Some(ConfigValue::Object(obj)) => {
                let mut sub = Settings::for_env(self.env.clone());
                sub.default_env = self.default_env.clone();
                sub.add_layer(Box::new(SourceConfigLayer::new(
                    key,
                    LayerPriority::Explicit,
                    obj,
                )));
                Ok(Some(sub))
            }
            _ => Ok(None),
        }
    }

    /// Deserializes the merged configuration into `T`.
    ///
    /// # Example
    /// ```
    /// use tierconf::{Settings, ConfigValue};
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Server {
    ///     host: String,
    ///     port: u16,
    /// }
    ///
    /// let mut settings = Settings::new();
    /// settings.set("host", ConfigValue::from("0.0.0.0")).unwrap();
    /// settings.set("port", ConfigValue::from(8080i64)).unwrap();
    ///
    /// let server: Server = settings.unmarshal().unwrap();
    /// assert_eq!(server.port, 8080);
    /// ```
    pub fn unmarshal<T>(&self) -> ConfigResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let value = serde_json::to_value(&self.store)?;
        serde_json::from_value(value)
            .map_err(ConfigError::from)
            .with_context(|| "Failed to unmarshal configuration".to_string())
    }

    /// Deserializes the value at `key` into `T`.
    pub fn unmarshal_key<T>(&self, key: &str) -> ConfigResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let value = serde_json::to_value(self.attr(key)?)?;
        serde_json::from_value(value)
            .map_err(ConfigError::from)
            .with_context(|| format!("Failed to unmarshal key '{key}'"))
    }

    pub fn validators(&self) -> &ValidatorList {
        &self.validators
    }

    pub fn validators_mut(&mut self) -> &mut ValidatorList {
        &mut self.validators
    }

    /// Runs the registered validators, raising the first failure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validators.validate(self)
    }

    pub fn validate_with(&self, options: &ValidateOptions) -> Result<(), ValidationError> {
        self.validators.validate_with(self, options)
    }

    /// Runs every registered validator; see [`ValidatorList::validate_all`].
    pub fn validate_all(&self, raise_error: bool) -> Result<Vec<ValidationError>, ValidationError> {
        self.validators.validate_all(self, raise_error)
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("env", &self.env)
            .field("default_env", &self.default_env)
            .field("layers", &self.layer_info())
            .field("validators", &self.validators.len())
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Layer for values set directly via `set()` and `update()`.
struct ExplicitConfigLayer {
    data: ConfigValue,
}

impl ExplicitConfigLayer {
    fn new() -> Self {
        Self {
            data: ConfigValue::object(),
        }
    }
}

static EMPTY: Map = Map::new();

impl ConfigLayer for ExplicitConfigLayer {
    fn data(&self) -> &Map {
        self.data.as_object().unwrap_or(&EMPTY)
    }

    fn set(&mut self, key: &str, value: ConfigValue) -> ConfigResult<()> {
        self.data.insert_path(key, value);
        Ok(())
    }

    fn source_name(&self) -> &str {
        "explicit"
    }

    fn priority(&self) -> LayerPriority {
        LayerPriority::Explicit
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
