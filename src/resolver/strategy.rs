//! Page-object selection and strategy lookup.

use crate::config::UrlPattern;
use crate::store::{Scope, VariableStore};
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Name of the page object whose strategy tables are active.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternCode(String);

impl PatternCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatternCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pick the active page object: explicit override, then the first URL rule
/// whose substring occurs in `url`, then the configured default.
pub fn select_pattern_code(
    override_code: Option<&str>,
    url: &str,
    url_patterns: &[UrlPattern],
    default: Option<&str>,
) -> Result<PatternCode> {
    let non_empty = |s: &&str| !s.trim().is_empty();

    if let Some(code) = override_code.filter(non_empty) {
        return Ok(PatternCode(code.trim().to_string()));
    }
    if !url.is_empty() {
        if let Some(rule) = url_patterns
            .iter()
            .find(|rule| !rule.contains.is_empty() && url.contains(&rule.contains))
        {
            debug!("url '{}' matched '{}' -> {}", url, rule.contains, rule.pattern);
            return Ok(PatternCode(rule.pattern.clone()));
        }
    }
    if let Some(code) = default.filter(non_empty) {
        return Ok(PatternCode(code.trim().to_string()));
    }
    Err(Error::NoPattern(format!(
        "no override given, no url rule matches '{}' and no default_pattern is configured",
        url
    )))
}

/// Split a stored strategy string on `;`, keeping order and every part.
pub fn split_strategies(raw: &str) -> Vec<String> {
    raw.split(';').map(str::to_string).collect()
}

pub(crate) fn fields_key(code: &str, element_type: &str) -> String {
    format!("pattern.{}.fields.{}", code, element_type)
}

pub(crate) fn sections_key(code: &str, name: &str) -> String {
    format!("pattern.{}.sections.{}", code, name)
}

pub(crate) fn locations_key(code: &str, name: &str) -> String {
    format!("pattern.{}.locations.{}", code, name)
}

pub(crate) fn scroll_key(code: &str) -> String {
    format!("pattern.{}.scroll", code)
}

/// Fallback entry used when a named location/section has no template.
const DEFAULT_TEMPLATE: &str = "default";

/// Looks up strategy tables for one page object.
///
/// Raw lists are split once and cached for the lifetime of the resolver, which
/// is one resolution call. Placeholders are substituted on every request since
/// bindings such as `forId` change between passes.
pub struct StrategyResolver<'a, S: VariableStore + ?Sized> {
    store: &'a S,
    code: PatternCode,
    cache: HashMap<String, Vec<String>>,
}

impl<'a, S: VariableStore + ?Sized> StrategyResolver<'a, S> {
    pub fn new(store: &'a S, code: &PatternCode) -> Self {
        Self {
            store,
            code: code.clone(),
            cache: HashMap::new(),
        }
    }

    /// Raw (unsubstituted) fallback list for `element_type`. A stored but
    /// blank value (`""`, `";"`) comes back as blank entries.
    pub fn raw(&mut self, element_type: &str) -> &[String] {
        self.load(element_type, true)
    }

    /// Whether `element_type` has at least one non-blank strategy.
    pub fn has_usable(&mut self, element_type: &str) -> bool {
        self.load(element_type, true)
            .iter()
            .any(|s| !s.trim().is_empty())
    }

    /// Fallback list for `element_type` with placeholders substituted.
    pub fn strategies(&mut self, element_type: &str, scope: &Scope<'_, S>) -> Vec<String> {
        self.load(element_type, true)
            .iter()
            .map(|s| scope.substitute(s))
            .collect()
    }

    /// Like [`strategies`](Self::strategies), for types a page object may
    /// legitimately leave out (labels).
    pub fn optional(&mut self, element_type: &str, scope: &Scope<'_, S>) -> Vec<String> {
        self.load(element_type, false)
            .iter()
            .map(|s| scope.substitute(s))
            .collect()
    }

    fn load(&mut self, element_type: &str, required: bool) -> &[String] {
        let store = self.store;
        let code = &self.code;
        self.cache
            .entry(element_type.to_string())
            .or_insert_with(|| {
                let key = fields_key(code.as_str(), element_type);
                let list = stored(store, &key)
                    .map(|raw| split_strategies(&raw))
                    .unwrap_or_default();
                if required && list.iter().all(|s| s.trim().is_empty()) {
                    warn!(
                        "no '{}' strategies in page object '{}' ({})",
                        element_type, code, key
                    );
                }
                list
            })
    }

    /// Section template for `name`, substituted. Empty when `name` is empty or unknown.
    pub fn section(&self, name: &str, scope: &Scope<'_, S>) -> String {
        self.template(name, sections_key, scope)
    }

    /// Location template for `name`, substituted. Empty when `name` is empty or unknown.
    pub fn location(&self, name: &str, scope: &Scope<'_, S>) -> String {
        self.template(name, locations_key, scope)
    }

    /// Scroll containers for this page object, substituted.
    pub fn scroll_targets(&self, scope: &Scope<'_, S>) -> Vec<String> {
        stored(self.store, &scroll_key(self.code.as_str()))
            .map(|raw| {
                split_strategies(&raw)
                    .iter()
                    .map(|s| scope.substitute(s))
                    .filter(|s| !s.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn template(
        &self,
        name: &str,
        key: fn(&str, &str) -> String,
        scope: &Scope<'_, S>,
    ) -> String {
        if name.is_empty() {
            return String::new();
        }
        let code = self.code.as_str();
        let template = stored(self.store, &key(code, name))
            .or_else(|| stored(self.store, &key(code, DEFAULT_TEMPLATE)));
        match template {
            Some(t) => scope.substitute(&t),
            None => {
                debug!("no template for '{}' in page object '{}'", name, code);
                String::new()
            }
        }
    }
}

/// Store value under `key`, treating "returns itself" as missing.
fn stored<S: VariableStore + ?Sized>(store: &S, key: &str) -> Option<String> {
    let value = store.get(key);
    (value != key).then_some(value)
}
