//! Before/after interception of `get`, `set` and `update`.
//!
//! Hooks are plain callbacks held in ordered lists per method. Before-hooks
//! fold over a [`HookValue`] that starts out [`HookValue::Empty`]; returning
//! [`HookValue::Eager`] skips the wrapped operation and hands the value
//! straight to the after-hooks. After-hooks fold over the operation's result.
//!
//! Hooks never see the hooked [`Settings`](crate::Settings) methods. They get
//! a [`HookReceiver`] whose reads bypass the hooks, so a hook that reads
//! configuration cannot recurse into itself.

use crate::error::ConfigResult;
use crate::settings::Settings;
use crate::value::{ConfigValue, Map};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Settings operations that accept hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookedMethod {
    Get,
    Set,
    Update,
}

/// Value threaded through a hook chain.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HookValue {
    /// Nothing produced yet
    #[default]
    Empty,
    Value(ConfigValue),
    /// Skip the wrapped operation and use this value as its result
    Eager(ConfigValue),
}

impl HookValue {
    pub fn value(&self) -> Option<&ConfigValue> {
        match self {
            HookValue::Empty => None,
            HookValue::Value(value) | HookValue::Eager(value) => Some(value),
        }
    }

    pub fn into_value(self) -> Option<ConfigValue> {
        match self {
            HookValue::Empty => None,
            HookValue::Value(value) | HookValue::Eager(value) => Some(value),
        }
    }

    pub fn is_eager(&self) -> bool {
        matches!(self, HookValue::Eager(_))
    }
}

impl From<Option<ConfigValue>> for HookValue {
    fn from(value: Option<ConfigValue>) -> Self {
        value.map_or(HookValue::Empty, HookValue::Value)
    }
}

/// Arguments of the intercepted call.
#[derive(Debug, Clone, Copy)]
pub struct HookArgs<'a> {
    pub method: HookedMethod,
    /// Key passed to `get` or `set`
    pub key: Option<&'a str>,
    /// Value passed to `set`, or the mapping passed to `update`
    pub value: Option<&'a ConfigValue>,
}

/// Read-only view of the settings handed to hooks.
pub struct HookReceiver<'a> {
    settings: &'a Settings,
}

impl<'a> HookReceiver<'a> {
    pub(crate) fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// The un-hooked `get`.
    pub fn get(&self, key: &str) -> ConfigResult<Option<ConfigValue>> {
        self.settings.get_unhooked(key)
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.settings.as_value().lookup_path(key).is_some()
    }

    pub fn current_env(&self) -> &str {
        self.settings.current_env()
    }

    pub fn all_settings(&self) -> Map {
        self.settings.all_settings()
    }
}

/// Callback signature shared by before and after hooks.
pub type Hook = Arc<dyn Fn(&HookReceiver<'_>, &HookArgs<'_>, HookValue) -> HookValue + Send + Sync>;

/// Hook registry owned by a settings instance.
#[derive(Clone, Default)]
pub struct Hooks {
    before: BTreeMap<HookedMethod, Vec<Hook>>,
    after: BTreeMap<HookedMethod, Vec<Hook>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before<F>(&mut self, method: HookedMethod, hook: F)
    where
        F: Fn(&HookReceiver<'_>, &HookArgs<'_>, HookValue) -> HookValue + Send + Sync + 'static,
    {
        self.before.entry(method).or_default().push(Arc::new(hook));
    }

    pub fn after<F>(&mut self, method: HookedMethod, hook: F)
    where
        F: Fn(&HookReceiver<'_>, &HookArgs<'_>, HookValue) -> HookValue + Send + Sync + 'static,
    {
        self.after.entry(method).or_default().push(Arc::new(hook));
    }

    /// True when at least one hook wraps `method`.
    pub fn is_hooked(&self, method: HookedMethod) -> bool {
        self.before.get(&method).is_some_and(|hooks| !hooks.is_empty())
            || self.after.get(&method).is_some_and(|hooks| !hooks.is_empty())
    }

    pub fn clear(&mut self) {
        self.before.clear();
        self.after.clear();
    }

    /// Folds the before-hooks, stopping at the first eager value.
    pub(crate) fn run_before(&self, receiver: &HookReceiver<'_>, args: &HookArgs<'_>) -> HookValue {
        let mut value = HookValue::Empty;
        for hook in self.before.get(&args.method).into_iter().flatten() {
            value = hook(receiver, args, value);
            if value.is_eager() {
                tracing::trace!(method = ?args.method, key = args.key, "eager value from before hook");
                break;
            }
        }
        value
    }

    pub(crate) fn run_after(
        &self,
        receiver: &HookReceiver<'_>,
        args: &HookArgs<'_>,
        result: HookValue,
    ) -> HookValue {
        self.after
            .get(&args.method)
            .into_iter()
            .flatten()
            .fold(result, |value, hook| hook(receiver, args, value))
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = |hooks: &BTreeMap<HookedMethod, Vec<Hook>>| {
            hooks
                .iter()
                .map(|(method, list)| (*method, list.len()))
                .collect::<BTreeMap<_, _>>()
        };
        f.debug_struct("Hooks")
            .field("before", &counts(&self.before))
            .field("after", &counts(&self.after))
            .finish()
    }
}
