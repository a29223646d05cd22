//! Settings bound to a schema.

use super::schema::Schema;
use crate::error::{ConfigResult, ValidationError};
use crate::hooks::Hooks;
use crate::layer::{ConfigLayer, LayerPriority};
use crate::merge::deep_merge;
use crate::settings::{Settings, DEFAULT_ENV, SHARED_ENV};
use crate::source_layer::SourceConfigLayer;
use crate::validator::{Validator, ValidatorList};
use crate::value::{ConfigValue, Map};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Construction progress of a [`TypedSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedState {
    Uninitialized,
    SchemaExtracted,
    DefaultsMerged,
    ValidatorsRegistered,
    /// Every registered validator passed
    Validated,
    /// Built with eager validation disabled, changed through one of the
    /// [`TypedSettings`] mutators since the last pass, or failed that pass
    PendingValidation,
}

/// Construction options of a [`TypedSettings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Validate while building and fail on the first error
    pub trigger_validation: bool,
    /// Active profile
    pub env: String,
    /// Profile shared by all profiles
    pub default_env: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            trigger_validation: true,
            env: DEFAULT_ENV.to_string(),
            default_env: SHARED_ENV.to_string(),
        }
    }
}

/// A [`Settings`] object populated from a schema: schema defaults at the
/// lowest precedence, construction-time values above them, the schema's
/// validators registered in order, and extra validators last.
///
/// Derefs to [`Settings`] for reads. Writes go through the mutators on this
/// type, which move the state back to [`TypedState::PendingValidation`] so
/// [`state`](TypedSettings::state) never reports `Validated` for data that
/// has not been checked.
///
/// # Example
/// ```
/// use tierconf::typed::{Field, Schema, TypedSettings, TypedState};
/// use tierconf::{ConfigValue, TypeSpec, Validator};
///
/// let schema = Schema::builder("App")
///     .field(Field::new("name", TypeSpec::Str).validator(Validator::default().ne("denied.com")))
///     .field(Field::new("workers", TypeSpec::Int).default(4i64))
///     .build()
///     .unwrap();
///
/// let app = TypedSettings::builder(&schema)
///     .init("name", ConfigValue::from("example.com"))
///     .build()
///     .unwrap();
/// assert_eq!(app.state(), TypedState::Validated);
/// assert_eq!(app.get_int("workers").unwrap(), Some(4));
///
/// let denied = TypedSettings::builder(&schema)
///     .init("name", ConfigValue::from("denied.com"))
///     .build();
/// assert!(denied.unwrap_err().is_validation_error());
/// ```
pub struct TypedSettings {
    schema: Arc<Schema>,
    settings: Settings,
    state: TypedState,
}

impl TypedSettings {
    pub fn builder(schema: &Arc<Schema>) -> TypedSettingsBuilder {
        TypedSettingsBuilder {
            schema: Arc::clone(schema),
            init: ConfigValue::object(),
            sources: Vec::new(),
            validators: Vec::new(),
            options: Options::default(),
        }
    }

    /// Builds with default options and the given construction-time values.
    pub fn new(schema: &Arc<Schema>, init: Map) -> ConfigResult<Self> {
        Self::builder(schema).init_values(init).build()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn state(&self) -> TypedState {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Runs every registered validator, raising the first failure.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        match self.settings.validate() {
            Ok(()) => {
                self.transition(TypedState::Validated);
                Ok(())
            }
            Err(err) => {
                self.transition(TypedState::PendingValidation);
                Err(err)
            }
        }
    }

    /// Collects every failure; see
    /// [`ValidatorList::validate_all`](crate::ValidatorList::validate_all).
    pub fn validate_all(
        &mut self,
        raise_error: bool,
    ) -> Result<Vec<ValidationError>, ValidationError> {
        let result = self.settings.validate_all(raise_error);
        let passed = matches!(&result, Ok(failures) if failures.is_empty());
        self.transition(if passed {
            TypedState::Validated
        } else {
            TypedState::PendingValidation
        });
        result
    }

    /// See [`Settings::set`].
    pub fn set(&mut self, key: &str, value: ConfigValue) -> ConfigResult<()> {
        self.settings.set(key, value)?;
        self.invalidate();
        Ok(())
    }

    /// See [`Settings::update`].
    pub fn update(&mut self, data: Map) -> ConfigResult<()> {
        self.settings.update(data)?;
        self.invalidate();
        Ok(())
    }

    /// See [`Settings::set_default`].
    pub fn set_default(&mut self, key: &str, value: ConfigValue) -> ConfigResult<()> {
        self.settings.set_default(key, value)?;
        self.invalidate();
        Ok(())
    }

    /// Adds raw data from an external loader after construction.
    pub fn add_layer(&mut self, layer: Box<dyn ConfigLayer>) {
        self.settings.add_layer(layer);
        self.invalidate();
    }

    pub fn add_profiled_source(&mut self, name: &str, priority: LayerPriority, data: Map) {
        self.settings.add_profiled_source(name, priority, data);
        self.invalidate();
    }

    pub fn remove_layers_by_priority(&mut self, priority: LayerPriority) -> usize {
        let removed = self.settings.remove_layers_by_priority(priority);
        if removed > 0 {
            self.invalidate();
        }
        removed
    }

    /// Switches the active profile.
    pub fn set_env(&mut self, env: impl Into<String>) {
        self.settings.set_env(env);
        self.invalidate();
    }

    /// Registered validators; adding one requires a new pass.
    pub fn validators_mut(&mut self) -> &mut ValidatorList {
        self.invalidate();
        self.settings.validators_mut()
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        self.settings.hooks_mut()
    }

    fn invalidate(&mut self) {
        if self.state == TypedState::Validated {
            self.transition(TypedState::PendingValidation);
        }
    }

    fn transition(&mut self, next: TypedState) {
        if self.state != next {
            tracing::debug!(
                schema = self.schema.name(),
                from = ?self.state,
                to = ?next,
                "typed settings state change"
            );
            self.state = next;
        }
    }
}

impl Deref for TypedSettings {
    type Target = Settings;

    fn deref(&self) -> &Settings {
        &self.settings
    }
}

impl fmt::Debug for TypedSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedSettings")
            .field("schema", &self.schema.name())
            .field("state", &self.state)
            .field("settings", &self.settings)
            .finish()
    }
}

pub struct TypedSettingsBuilder {
    schema: Arc<Schema>,
    init: ConfigValue,
    sources: Vec<Box<dyn ConfigLayer>>,
    validators: Vec<Validator>,
    options: Options,
}

impl TypedSettingsBuilder {
    /// Construction-time value; the key may be dotted.
    pub fn init(mut self, key: &str, value: ConfigValue) -> Self {
        self.init.insert_path(key, value);
        self
    }

    /// Several construction-time values, deep-merged over earlier ones.
    pub fn init_values(mut self, values: Map) -> Self {
        if let Some(init) = self.init.as_object_mut() {
            deep_merge(init, values);
        }
        self
    }

    /// Raw data from an external loader.
    pub fn source(mut self, layer: Box<dyn ConfigLayer>) -> Self {
        self.sources.push(layer);
        self
    }

    /// Validator appended after the schema's own validators.
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn trigger_validation(mut self, enabled: bool) -> Self {
        self.options.trigger_validation = enabled;
        self
    }

    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.options.env = env.into();
        self
    }

    /// Runs extraction, merges defaults and overrides, registers validators
    /// and, unless disabled, validates.
    pub fn build(self) -> ConfigResult<TypedSettings> {
        let mut typed = TypedSettings {
            schema: Arc::clone(&self.schema),
            settings: Settings::for_env(self.options.env.clone()),
            state: TypedState::Uninitialized,
        };

        let extraction = self.schema.extraction()?.clone();
        typed.transition(TypedState::SchemaExtracted);

        typed.settings.set_default_env(self.options.default_env.clone());
        typed.settings.set_defaults(extraction.defaults)?;
        if let ConfigValue::Object(init) = self.init {
            if !init.is_empty() {
                typed.settings.add_layer(Box::new(SourceConfigLayer::new(
                    "init",
                    LayerPriority::Init,
                    init,
                )));
            }
        }
        for layer in self.sources {
            typed.settings.add_layer(layer);
        }
        typed.settings.set_spec(extraction.spec);
        typed.transition(TypedState::DefaultsMerged);

        let validators = typed.settings.validators_mut();
        validators.extend(extraction.validators);
        validators.extend(self.validators);
        typed.transition(TypedState::ValidatorsRegistered);

        if self.options.trigger_validation {
            typed.validate()?;
        } else {
            typed.transition(TypedState::PendingValidation);
        }
        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::schema::Field;
    use crate::types::TypeSpec;

    fn schema() -> Arc<Schema> {
        Schema::builder("App")
            .field(Field::new("name", TypeSpec::Str).validator(Validator::default().ne("denied.com")))
            .field(Field::new("port", TypeSpec::Int).default(8000i64))
            .field(Field::new("token", TypeSpec::Str).not_required())
            .build()
            .unwrap()
    }

    #[test]
    fn test_eager_validation_aborts_build() {
        let err = TypedSettings::builder(&schema())
            .init("name", ConfigValue::from("denied.com"))
            .build()
            .unwrap_err();
        let err = err.as_validation().unwrap();
        assert_eq!(err.key, "name");
    }

    #[test]
    fn test_deferred_validation() {
        let mut typed = TypedSettings::builder(&schema())
            .init("name", ConfigValue::from("denied.com"))
            .trigger_validation(false)
            .build()
            .unwrap();
        assert_eq!(typed.state(), TypedState::PendingValidation);

        assert!(typed.validate().is_err());
        typed.set("name", ConfigValue::from("ok.com")).unwrap();
        typed.validate().unwrap();
        assert_eq!(typed.state(), TypedState::Validated);
    }

    #[test]
    fn test_mutation_after_validation_requires_new_pass() {
        let mut typed = TypedSettings::builder(&schema())
            .init("name", ConfigValue::from("ok.com"))
            .build()
            .unwrap();
        assert_eq!(typed.state(), TypedState::Validated);

        typed.set("name", ConfigValue::from("denied.com")).unwrap();
        assert_eq!(typed.state(), TypedState::PendingValidation);
        let err = typed.validate().unwrap_err();
        assert_eq!(
            err.message,
            "name must ne denied.com but it is denied.com in env development"
        );
        assert_eq!(typed.state(), TypedState::PendingValidation);

        typed.set("name", ConfigValue::from("ok.com")).unwrap();
        typed.validate().unwrap();
        typed.set_env("production");
        assert_eq!(typed.state(), TypedState::PendingValidation);

        typed.validate().unwrap();
        let data: Map = serde_json::from_str(r#"{"port": 1}"#).unwrap();
        typed.add_layer(Box::new(SourceConfigLayer::new("late.json", LayerPriority::ConfigFile, data)));
        assert_eq!(typed.state(), TypedState::PendingValidation);
        typed.validate().unwrap();
        assert_eq!(typed.get_int("port").unwrap(), Some(1));

        typed.validators_mut().register(Validator::new(["port"]).gt(10));
        assert_eq!(typed.state(), TypedState::PendingValidation);
        assert_eq!(typed.validate().unwrap_err().key, "port");
    }

    #[test]
    fn test_defaults_and_not_required() {
        let typed = TypedSettings::builder(&schema())
            .init("name", ConfigValue::from("a"))
            .build()
            .unwrap();
        assert_eq!(typed.get_int("port").unwrap(), Some(8000));
        assert!(typed.attr("token").unwrap_err().is_key_not_found());
    }

    #[test]
    fn test_missing_required_field() {
        let err = TypedSettings::new(&schema(), Map::new()).unwrap_err();
        let err = err.as_validation().unwrap();
        assert_eq!(err.key, "name");
        assert_eq!(err.message, "name is required in env development");
    }

    #[test]
    fn test_sources_override_defaults_below_init() {
        let data: Map = serde_json::from_str(r#"{"name": "file", "port": 9000}"#).unwrap();
        let typed = TypedSettings::builder(&schema())
            .source(Box::new(SourceConfigLayer::new("app.json", LayerPriority::ConfigFile, data)))
            .init("name", ConfigValue::from("init"))
            .build()
            .unwrap();
        assert_eq!(typed.get_string("name").unwrap(), Some("init".into()));
        assert_eq!(typed.get_int("port").unwrap(), Some(9000));
    }

    #[test]
    fn test_extra_validators_run_last() {
        let mut typed = TypedSettings::builder(&schema())
            .init("name", ConfigValue::from(1i64))
            .validator(Validator::new(["port"]).lt(10))
            .trigger_validation(false)
            .build()
            .unwrap();
        let failures = typed.validate_all(false).unwrap();
        let keys: Vec<_> = failures.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys.first(), Some(&"name"));
        assert_eq!(keys.last(), Some(&"port"));
        assert_eq!(typed.state(), TypedState::PendingValidation);
    }
}
