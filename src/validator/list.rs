//! Ordered validator registry owned by a settings instance.

use super::Validator;
use crate::error::ValidationError;
use crate::settings::Settings;

/// Filters applied to one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Only run validators with a name under one of these key prefixes
    pub only: Vec<String>,
    /// Skip validators with a name under one of these key prefixes
    pub exclude: Vec<String>,
    /// Check multi-profile validators against the active profile only
    pub only_current_env: bool,
}

impl ValidateOptions {
    pub fn only<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only.extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn only_current_env(mut self, enabled: bool) -> Self {
        self.only_current_env = enabled;
        self
    }

    fn selects(&self, validator: &Validator) -> bool {
        let names = validator.all_names();
        let under = |prefixes: &[String]| {
            names
                .iter()
                .any(|name| prefixes.iter().any(|prefix| is_under(name, prefix)))
        };
        if !self.only.is_empty() && !under(&self.only) {
            return false;
        }
        !under(&self.exclude)
    }
}

fn is_under(name: &str, prefix: &str) -> bool {
    match name.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => {
            name.len() == prefix.len() || name.as_bytes()[prefix.len()] == b'.'
        }
        _ => false,
    }
}

/// Validators in registration order.
///
/// # Example
/// ```
/// use tierconf::{Settings, Validator, ConfigValue};
///
/// let mut settings = Settings::new();
/// settings.set("workers", ConfigValue::from(0i64)).unwrap();
/// settings.validators_mut().register(Validator::new(["name"]).must_exist(true));
/// settings.validators_mut().register(Validator::new(["workers"]).gte(1));
///
/// let failures = settings.validate_all(false).unwrap();
/// assert_eq!(failures.len(), 2);
/// assert_eq!(failures[0].key, "name");
/// assert_eq!(failures[1].key, "workers");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatorList {
    validators: Vec<Validator>,
}

impl ValidatorList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a validator after applying the one-time guard fix-ups.
    pub fn register(&mut self, mut validator: Validator) {
        validator.inherit_from_guard();
        tracing::trace!(names = ?validator.all_names(), "registered validator");
        self.validators.push(validator);
    }

    pub fn extend<I: IntoIterator<Item = Validator>>(&mut self, validators: I) {
        for validator in validators {
            self.register(validator);
        }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Validator> {
        self.validators.iter()
    }

    pub fn clear(&mut self) {
        self.validators.clear();
    }

    /// Key names paired with the description of each documented validator.
    pub fn descriptions(&self) -> Vec<(Vec<String>, String)> {
        self.validators
            .iter()
            .filter_map(|validator| {
                validator.description_text().map(|text| {
                    let names = validator.all_names().into_iter().map(String::from).collect();
                    (names, text.to_string())
                })
            })
            .collect()
    }

    /// Runs every validator in order and raises the first failure.
    pub fn validate(&self, settings: &Settings) -> Result<(), ValidationError> {
        self.validate_with(settings, &ValidateOptions::default())
    }

    pub fn validate_with(
        &self,
        settings: &Settings,
        options: &ValidateOptions,
    ) -> Result<(), ValidationError> {
        for validator in self.selected(options) {
            validator.validate_with(settings, options)?;
        }
        Ok(())
    }

    /// Runs every validator and collects all failures.
    ///
    /// With `raise_error` the collected failures come back as one
    /// `Multiple` error; otherwise they are returned as a list, empty when
    /// everything passed.
    pub fn validate_all(
        &self,
        settings: &Settings,
        raise_error: bool,
    ) -> Result<Vec<ValidationError>, ValidationError> {
        self.validate_all_with(settings, &ValidateOptions::default(), raise_error)
    }

    pub fn validate_all_with(
        &self,
        settings: &Settings,
        options: &ValidateOptions,
        raise_error: bool,
    ) -> Result<Vec<ValidationError>, ValidationError> {
        let failures: Vec<ValidationError> = self
            .selected(options)
            .filter_map(|validator| validator.validate_with(settings, options).err())
            .collect();

        tracing::debug!(
            validators = self.validators.len(),
            failures = failures.len(),
            "validation pass finished"
        );
        if raise_error && !failures.is_empty() {
            return Err(ValidationError::multiple(failures));
        }
        Ok(failures)
    }

    fn selected<'a>(
        &'a self,
        options: &'a ValidateOptions,
    ) -> impl Iterator<Item = &'a Validator> + 'a {
        self.validators
            .iter()
            .filter(move |validator| options.selects(validator))
    }
}

impl<'a> IntoIterator for &'a ValidatorList {
    type Item = &'a Validator;
    type IntoIter = std::slice::Iter<'a, Validator>;

    fn into_iter(self) -> Self::IntoIter {
        self.validators.iter()
    }
}
