//! Process-wide variable store and `#{key}` substitution.

use crate::config::Params;
use crate::Result;
use crate::field::Bindings;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::RwLock;

/// Key/value store shared by the surrounding test framework.
///
/// By convention `get` returns the key itself when nothing is stored under it,
/// so callers can tell "missing" apart without an `Option`.
pub trait VariableStore: Send + Sync {
    /// Value for `key`, or `key` itself when absent.
    fn get(&self, key: &str) -> String;

    /// Store a value.
    fn set(&self, key: &str, value: &str);

    /// Whether a value is stored under `key`.
    fn contains(&self, key: &str) -> bool;

    /// Value for `key`, `None` when absent.
    fn lookup(&self, key: &str) -> Option<String> {
        self.contains(key).then(|| self.get(key))
    }

    /// Replace every `#{key}` placeholder with its stored value.
    /// Unknown placeholders are left as written.
    fn substitute(&self, template: &str) -> String {
        substitute_with(template, |key| self.lookup(key))
    }
}

/// Replace `#{key}` placeholders using `lookup`. Substituted values are not
/// scanned again.
pub fn substitute_with<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match fill_placeholders::<_, Infallible>(template, "#{", |key| Ok(lookup(key))) {
        Ok(filled) => filled,
        Err(never) => match never {},
    }
}

/// Shared scanner for `#{key}` and `${param}`: replaces `<open>name}` with
/// whatever `lookup` returns. `Ok(None)` keeps the placeholder as written and
/// an unterminated placeholder ends the scan.
pub(crate) fn fill_placeholders<F, E>(
    template: &str,
    open: &str,
    mut lookup: F,
) -> std::result::Result<String, E>
where
    F: FnMut(&str) -> std::result::Result<Option<String>, E>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(at) = rest.find(open) {
        let body = &rest[at + open.len()..];
        let Some(close) = body.find('}') else {
            break;
        };
        out.push_str(&rest[..at]);
        match lookup(&body[..close])? {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[at..at + open.len() + close + 1]),
        }
        rest = &body[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// In-memory [`VariableStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style set, handy when seeding in tests.
    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.write().insert(key.into(), value.into());
        self
    }

    /// Copy CLI parameters (`-P key=value`) into the store.
    pub fn seed(&self, params: &Params) {
        let mut values = self.write();
        for (key, value) in params.iter() {
            values.insert(key.to_string(), value.to_string());
        }
    }

    /// Parse and store `key=value` entries. Entries without `=` are rejected
    /// and nothing is stored.
    pub fn set_from_args(&self, args: &[String]) -> Result<()> {
        let params = Params::from_args(args)?;
        self.seed(&params);
        Ok(())
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        self.values.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        self.values.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl VariableStore for MemoryStore {
    fn get(&self, key: &str) -> String {
        self.read()
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    fn set(&self, key: &str, value: &str) {
        self.write().insert(key.to_string(), value.to_string());
    }

    fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }
}

/// Per-call view over the store: runtime bindings shadow stored variables.
pub struct Scope<'a, S: VariableStore + ?Sized> {
    bindings: &'a Bindings,
    store: &'a S,
}

impl<'a, S: VariableStore + ?Sized> Scope<'a, S> {
    pub fn new(bindings: &'a Bindings, store: &'a S) -> Self {
        Self { bindings, store }
    }

    pub fn lookup(&self, key: &str) -> Option<String> {
        self.bindings
            .get(key)
            .map(str::to_string)
            .or_else(|| self.store.lookup(key))
    }

    pub fn substitute(&self, template: &str) -> String {
        substitute_with(template, |key| self.lookup(key))
    }
}
