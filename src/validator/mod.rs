//! Declarative validators evaluated against resolved configuration.
//!
//! A [`Validator`] names one or more keys and describes what must hold for
//! them: existence, a condition callable, and any number of comparison
//! [operations](ops::Operation). Validators are registered in a
//! [`ValidatorList`] owned by a [`Settings`] instance and run in
//! registration order.
//!
//! ```
//! use tierconf::{Settings, Validator, ConfigValue};
//!
//! let mut settings = Settings::new();
//! settings.set("port", ConfigValue::from(500i64)).unwrap();
//! settings.validators_mut().register(Validator::new(["port"]).gt(999));
//!
//! let err = settings.validate().unwrap_err();
//! assert_eq!(err.message, "port must gt 999 but it is 500 in env development");
//! ```

pub mod list;
pub mod ops;

pub use list::{ValidateOptions, ValidatorList};
pub use ops::{Operation, Pattern};

use crate::error::{ValidationError, ValidationErrorKind};
use crate::settings::Settings;
use crate::types::TypeSpec;
use crate::value::ConfigValue;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::sync::Arc;

/// Existence requirement of a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MustExist {
    /// The key has to be present
    Required,
    /// The key must not be present
    Forbidden,
    /// Absence is fine; checks only run when the key is present
    #[default]
    Unconstrained,
}

/// Failure categories whose message can be customised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageKind {
    MustExistTrue,
    MustExistFalse,
    Condition,
    Operations,
    Combined,
}

impl MessageKind {
    /// Built-in template for this kind of failure.
    pub fn default_template(self) -> &'static str {
        match self {
            MessageKind::MustExistTrue => "{name} is required in env {env}",
            MessageKind::MustExistFalse => "{name} cannot exists in env {env}",
            MessageKind::Condition => "{name} invalid for {function}({value}) in env {env}",
            MessageKind::Operations => {
                "{name} must {operation} {op_value} but it is {value} in env {env}"
            }
            MessageKind::Combined => "combined validators failed {errors}",
        }
    }
}

/// How item validators reach the elements of the target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemsLookup {
    /// Elements of an array
    #[default]
    Elements,
    /// Values of an object, keys are ignored
    Values,
}

/// A named predicate applied to the resolved value.
#[derive(Clone)]
pub struct Condition {
    name: String,
    func: Arc<dyn Fn(&ConfigValue) -> bool + Send + Sync>,
}

impl Condition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, value: &ConfigValue) -> bool {
        (self.func)(value)
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Condition").field(&self.name).finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Combinator {
    Any(Vec<Validator>),
    All(Vec<Validator>),
}

/// A single executable constraint over one or more keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Validator {
    names: Vec<String>,
    must_exist: MustExist,
    condition: Option<Condition>,
    when: Option<Box<Validator>>,
    operations: Vec<Operation>,
    envs: Vec<String>,
    items: Vec<Validator>,
    items_lookup: ItemsLookup,
    messages: BTreeMap<MessageKind, String>,
    description: Option<String>,
    combined: Option<Combinator>,
}

/// Where a validator is being evaluated: the data root, the dotted prefix
/// of that root inside the full configuration, and the profile.
struct Scope<'a> {
    root: &'a ConfigValue,
    prefix: &'a str,
    env: &'a str,
}

impl Scope<'_> {
    fn qualify(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else if name.is_empty() {
            self.prefix.to_string()
        } else {
            format!("{}.{}", self.prefix, name)
        }
    }
}

impl Validator {
    /// Creates a validator for the given key names or patterns.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn existence(&self) -> MustExist {
        self.must_exist
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn env_names(&self) -> &[String] {
        &self.envs
    }

    pub fn guard(&self) -> Option<&Validator> {
        self.when.as_deref()
    }

    pub fn item_validators(&self) -> &[Validator] {
        &self.items
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// True for validators built with `|` or `&`.
    pub fn is_combined(&self) -> bool {
        self.combined.is_some()
    }

    /// Names of this validator and of every combined member.
    pub fn all_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        if let Some(Combinator::Any(members) | Combinator::All(members)) = &self.combined {
            names.extend(members.iter().flat_map(|member| member.all_names()));
        }
        names
    }

    /// `true` requires the key, `false` forbids it.
    pub fn must_exist(mut self, required: bool) -> Self {
        self.must_exist = if required {
            MustExist::Required
        } else {
            MustExist::Forbidden
        };
        self
    }

    pub fn existence_of(mut self, must_exist: MustExist) -> Self {
        self.must_exist = must_exist;
        self
    }

    /// Adds a named predicate the value has to satisfy.
    pub fn condition<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ConfigValue) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Condition {
            name: name.into(),
            func: Arc::new(func),
        });
        self
    }

    /// Only runs this validator when `guard` passes.
    pub fn when(mut self, guard: Validator) -> Self {
        self.when = Some(Box::new(guard));
        self
    }

    /// Checks the named profile instead of the active one. May be repeated.
    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.envs.push(env.into());
        self
    }

    pub fn envs<I, S>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.envs.extend(envs.into_iter().map(Into::into));
        self
    }

    /// Validators applied to every element of an array value. Named item
    /// validators treat each (object) element as their root; unnamed ones
    /// check the element itself.
    pub fn items(mut self, validators: Vec<Validator>) -> Self {
        self.items = validators;
        self
    }

    /// Applies item validators to the values of an object instead of the
    /// elements of an array.
    pub fn items_from_values(mut self) -> Self {
        self.items_lookup = ItemsLookup::Values;
        self
    }

    /// Overrides the message template for one failure kind.
    pub fn message(mut self, kind: MessageKind, template: impl Into<String>) -> Self {
        self.messages.insert(kind, template.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Adds an operation, replacing any earlier operation with the same name.
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.retain(|op| op.name() != operation.name());
        self.operations.push(operation);
        self
    }

    pub fn eq(self, operand: impl Into<ConfigValue>) -> Self {
        self.operation(Operation::Eq(operand.into()))
    }

    pub fn ne(self, operand: impl Into<ConfigValue>) -> Self {
        self.operation(Operation::Ne(operand.into()))
    }

    pub fn gt(self, operand: impl Into<ConfigValue>) -> Self {
        self.operation(Operation::Gt(operand.into()))
    }

    pub fn lt(self, operand: impl Into<ConfigValue>) -> Self {
        self.operation(Operation::Lt(operand.into()))
    }

    pub fn gte(self, operand: impl Into<ConfigValue>) -> Self {
        self.operation(Operation::Gte(operand.into()))
    }

    pub fn lte(self, operand: impl Into<ConfigValue>) -> Self {
        self.operation(Operation::Lte(operand.into()))
    }

    pub fn is_type_of(self, spec: TypeSpec) -> Self {
        self.operation(Operation::IsTypeOf(spec))
    }

    pub fn is_in<I, V>(self, options: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ConfigValue>,
    {
        self.operation(Operation::IsIn(options.into_iter().map(Into::into).collect()))
    }

    pub fn is_not_in<I, V>(self, options: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ConfigValue>,
    {
        self.operation(Operation::IsNotIn(
            options.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn identity(self, operand: impl Into<ConfigValue>) -> Self {
        self.operation(Operation::Identity(operand.into()))
    }

    pub fn cont(self, operand: impl Into<ConfigValue>) -> Self {
        self.operation(Operation::Cont(operand.into()))
    }

    pub fn len_eq(self, n: usize) -> Self {
        self.operation(Operation::LenEq(n))
    }

    pub fn len_ne(self, n: usize) -> Self {
        self.operation(Operation::LenNe(n))
    }

    pub fn len_min(self, n: usize) -> Self {
        self.operation(Operation::LenMin(n))
    }

    pub fn len_max(self, n: usize) -> Self {
        self.operation(Operation::LenMax(n))
    }

    pub fn startswith(self, prefix: impl Into<String>) -> Self {
        self.operation(Operation::StartsWith(prefix.into()))
    }

    pub fn endswith(self, suffix: impl Into<String>) -> Self {
        self.operation(Operation::EndsWith(suffix.into()))
    }

    pub fn regex(self, pattern: impl Into<String>) -> Self {
        self.operation(Operation::Regex(Pattern::new(pattern)))
    }

    /// Binds an unnamed validator (and its unnamed guard and combined
    /// members) to the field it annotates.
    pub(crate) fn bound_to(mut self, name: &str) -> Self {
        self.combined = match self.combined.take() {
            Some(Combinator::Any(members)) => Some(Combinator::Any(
                members.into_iter().map(|m| m.bound_to(name)).collect(),
            )),
            Some(Combinator::All(members)) => Some(Combinator::All(
                members.into_iter().map(|m| m.bound_to(name)).collect(),
            )),
            None => {
                if self.names.is_empty() {
                    self.names = vec![name.to_string()];
                }
                None
            }
        };
        self.when = self.when.take().map(|guard| Box::new(guard.bound_to(name)));
        self
    }

    /// Adds `guard` in front of any existing guard.
    pub(crate) fn guarded_by(mut self, guard: Validator) -> Self {
        let guard = match self.when.take() {
            Some(existing) => guard & *existing,
            None => guard,
        };
        self.when = Some(Box::new(guard));
        self
    }

    /// Moves the validator under `prefix`: names, guards and combined
    /// members are qualified, item validators stay relative to their items.
    pub(crate) fn prefixed(&self, prefix: &str) -> Validator {
        let mut moved = self.clone();
        moved.names = self
            .names
            .iter()
            .map(|name| format!("{prefix}.{name}"))
            .collect();
        moved.when = self.when.as_ref().map(|guard| Box::new(guard.prefixed(prefix)));
        moved.combined = match &self.combined {
            Some(Combinator::Any(members)) => Some(Combinator::Any(
                members.iter().map(|m| m.prefixed(prefix)).collect(),
            )),
            Some(Combinator::All(members)) => Some(Combinator::All(
                members.iter().map(|m| m.prefixed(prefix)).collect(),
            )),
            None => None,
        };
        moved
    }

    /// One-time fix-ups applied at registration: an unnamed guard checks the
    /// validator's own names, and envs flow between validator and guard in
    /// whichever direction is missing.
    pub(crate) fn inherit_from_guard(&mut self) {
        let names = self.names.clone();
        let envs = self.envs.clone();
        if let Some(guard) = self.when.as_mut() {
            if guard.names.is_empty() && !guard.is_combined() {
                guard.names = names;
            }
            if guard.envs.is_empty() {
                guard.envs = envs;
            } else if self.envs.is_empty() {
                self.envs = guard.envs.clone();
            }
            guard.inherit_from_guard();
        }
        if let Some(Combinator::Any(members) | Combinator::All(members)) = self.combined.as_mut() {
            for member in members {
                member.inherit_from_guard();
            }
        }
    }

    /// Profiles this validator is checked in; empty means the active one.
    fn target_envs(&self) -> &[String] {
        if self.envs.is_empty() {
            if let Some(guard) = &self.when {
                return guard.target_envs();
            }
        }
        &self.envs
    }

    /// Validates against `settings`, raising the first failure.
    pub fn validate(&self, settings: &Settings) -> Result<(), ValidationError> {
        self.validate_with(settings, &ValidateOptions::default())
    }

    pub(crate) fn validate_with(
        &self,
        settings: &Settings,
        options: &ValidateOptions,
    ) -> Result<(), ValidationError> {
        let current = settings.current_env();
        let envs = self.target_envs();
        let includes_current = envs.iter().any(|env| env.eq_ignore_ascii_case(current));

        if envs.is_empty() || (envs.len() == 1 && includes_current) {
            return self.validate_at(&Scope {
                root: settings.as_value(),
                prefix: "",
                env: current,
            });
        }
        if options.only_current_env {
            if includes_current {
                return self.validate_at(&Scope {
                    root: settings.as_value(),
                    prefix: "",
                    env: current,
                });
            }
            return Ok(());
        }

        for env in envs {
            let view = ConfigValue::Object(settings.env_view(env));
            self.validate_at(&Scope {
                root: &view,
                prefix: "",
                env,
            })?;
        }
        Ok(())
    }

    fn validate_at(&self, scope: &Scope<'_>) -> Result<(), ValidationError> {
        if let Some(guard) = &self.when {
            if let Err(reason) = guard.validate_at(scope) {
                tracing::trace!(
                    names = ?self.names,
                    env = scope.env,
                    reason = %reason,
                    "guard did not hold, skipping validator"
                );
                return Ok(());
            }
        }
        if let Some(combinator) = &self.combined {
            return self.validate_combined(combinator, scope);
        }
        for name in self.resolve_names(scope.root) {
            self.validate_name(&name, scope)?;
        }
        Ok(())
    }

    fn validate_name(&self, name: &str, scope: &Scope<'_>) -> Result<(), ValidationError> {
        let key = scope.qualify(name);
        let value = match (self.must_exist, scope.root.lookup_path(name)) {
            (MustExist::Required, None) => {
                return Err(self.fail(
                    MessageKind::MustExistTrue,
                    ValidationErrorKind::Missing,
                    &key,
                    scope.env,
                    &[],
                ));
            }
            (MustExist::Forbidden, Some(_)) => {
                return Err(self.fail(
                    MessageKind::MustExistFalse,
                    ValidationErrorKind::Forbidden,
                    &key,
                    scope.env,
                    &[],
                ));
            }
            (_, None) => return Ok(()),
            (_, Some(value)) => value,
        };
        self.check_value(value, &key, scope.env)
    }

    /// Runs condition, operations and item validators on a present value.
    fn check_value(&self, value: &ConfigValue, key: &str, env: &str) -> Result<(), ValidationError> {
        if let Some(condition) = &self.condition {
            if !condition.check(value) {
                return Err(self.fail(
                    MessageKind::Condition,
                    ValidationErrorKind::Condition,
                    key,
                    env,
                    &[
                        ("function", condition.name().to_string()),
                        ("value", value.to_string()),
                    ],
                ));
            }
        }

        for operation in &self.operations {
            if !operation.evaluate(value) {
                return Err(self.fail(
                    MessageKind::Operations,
                    ValidationErrorKind::Operation,
                    key,
                    env,
                    &[
                        ("operation", operation.name().to_string()),
                        ("op_value", operation.operand()),
                        ("value", value.to_string()),
                    ],
                ));
            }
        }

        if !self.items.is_empty() {
            self.validate_items(value, key, env)?;
        }
        Ok(())
    }

    fn validate_items(&self, value: &ConfigValue, key: &str, env: &str) -> Result<(), ValidationError> {
        let elements: Vec<(String, &ConfigValue)> = match (self.items_lookup, value) {
            (_, ConfigValue::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item))
                .collect(),
            (ItemsLookup::Values, ConfigValue::Object(obj)) => {
                obj.iter().map(|(k, v)| (k.clone(), v)).collect()
            }
            _ => return Ok(()),
        };

        for (segment, element) in elements {
            let prefix = format!("{key}.{segment}");
            for validator in &self.items {
                validator.validate_element(element, &prefix, env)?;
            }
        }
        Ok(())
    }

    fn validate_element(
        &self,
        element: &ConfigValue,
        prefix: &str,
        env: &str,
    ) -> Result<(), ValidationError> {
        let scope = Scope {
            root: element,
            prefix,
            env,
        };
        if self.names.is_empty() && self.combined.is_none() {
            if let Some(guard) = &self.when {
                if guard.validate_at(&scope).is_err() {
                    return Ok(());
                }
            }
            return self.check_value(element, prefix, env);
        }
        // non-object elements are reported by the type check of the container
        if !element.is_object() {
            return Ok(());
        }
        self.validate_at(&scope)
    }

    fn validate_combined(
        &self,
        combinator: &Combinator,
        scope: &Scope<'_>,
    ) -> Result<(), ValidationError> {
        match combinator {
            Combinator::Any(members) => {
                let mut errors = Vec::new();
                for member in members {
                    match member.validate_at(scope) {
                        Ok(()) => return Ok(()),
                        Err(err) => errors.push(err),
                    }
                }
                Err(self.combined_failure(errors, scope))
            }
            Combinator::All(members) => {
                for member in members {
                    if let Err(err) = member.validate_at(scope) {
                        return Err(self.combined_failure(vec![err], scope));
                    }
                }
                Ok(())
            }
        }
    }

    fn combined_failure(&self, errors: Vec<ValidationError>, scope: &Scope<'_>) -> ValidationError {
        let rendered = errors
            .iter()
            .map(|err| err.message.clone())
            .collect::<Vec<_>>()
            .join(", ");
        let key = errors
            .first()
            .map(|err| err.key.clone())
            .unwrap_or_else(|| scope.prefix.to_string());
        let mut error = self.fail(
            MessageKind::Combined,
            ValidationErrorKind::Combined,
            &key,
            scope.env,
            &[("errors", format!("[{rendered}]"))],
        );
        error.details = errors;
        error
    }

    fn fail(
        &self,
        kind: MessageKind,
        error_kind: ValidationErrorKind,
        key: &str,
        env: &str,
        extra: &[(&str, String)],
    ) -> ValidationError {
        let template = self
            .messages
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_template());
        let message = render(template, |placeholder| match placeholder {
            "name" => Some(key.to_string()),
            "env" => Some(env.to_string()),
            other => extra
                .iter()
                .find(|(name, _)| *name == other)
                .map(|(_, value)| value.clone()),
        });
        tracing::debug!(key, env, %message, "validation failed");
        ValidationError::new(error_kind, key, env, message)
    }

    /// Expands `*` segments against the data; plain names pass through.
    /// When the key in front of a wildcard is absent, that key itself is
    /// checked, so a required `services.*.port` reports `services`. An
    /// empty mapping or list under a wildcard yields no names.
    fn resolve_names(&self, root: &ConfigValue) -> Vec<String> {
        let mut resolved = Vec::new();
        for name in &self.names {
            if name.split('.').any(|segment| segment == "*") {
                let segments: Vec<&str> = name.split('.').collect();
                expand_pattern(root, &segments, String::new(), &mut resolved);
            } else {
                resolved.push(name.clone());
            }
        }
        resolved
    }
}

fn join_path(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{base}.{segment}")
    }
}

fn expand_pattern(value: &ConfigValue, segments: &[&str], path: String, out: &mut Vec<String>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(path);
        return;
    };
    if *head == "*" {
        match value {
            ConfigValue::Object(obj) => {
                for (key, child) in obj {
                    expand_pattern(child, rest, join_path(&path, key), out);
                }
            }
            ConfigValue::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    expand_pattern(child, rest, join_path(&path, &index.to_string()), out);
                }
            }
            _ => {}
        }
        return;
    }
    match value.lookup_path(head) {
        Some(child) => expand_pattern(child, rest, join_path(&path, head), out),
        // keep the concrete remainder so existence checks still report it
        None if !rest.contains(&"*") => {
            let mut full = join_path(&path, head);
            for segment in rest {
                full = join_path(&full, segment);
            }
            out.push(full);
        }
        // a later wildcard cannot be expanded; report the missing prefix
        None => out.push(join_path(&path, head)),
    }
}

/// Replaces `{placeholder}` markers; unknown markers are left untouched.
fn render<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let placeholder = &after[..end];
                match lookup(placeholder) {
                    Some(value) => rendered.push_str(&value),
                    None => {
                        rendered.push('{');
                        rendered.push_str(placeholder);
                        rendered.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                rendered.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    rendered.push_str(rest);
    rendered
}

impl BitOr for Validator {
    type Output = Validator;

    /// Passes when either side passes.
    fn bitor(self, rhs: Validator) -> Validator {
        Validator {
            combined: Some(Combinator::Any(vec![self, rhs])),
            ..Validator::default()
        }
    }
}

impl BitAnd for Validator {
    type Output = Validator;

    /// Passes when both sides pass.
    fn bitand(self, rhs: Validator) -> Validator {
        Validator {
            combined: Some(Combinator::All(vec![self, rhs])),
            ..Validator::default()
        }
    }
}
