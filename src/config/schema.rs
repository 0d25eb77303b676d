use super::params::{ParamDef, ParamFiller, Params};
use super::PageObject;
use crate::store::VariableStore;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Top-level pattern file.
#[derive(Debug, Clone, Deserialize)]
pub struct LocatorConfig {
    /// Name of this pattern set.
    pub name: String,

    /// Load-time parameter definitions (optional).
    #[serde(default)]
    pub params: HashMap<String, ParamDef>,

    /// Resolution timing and defaults.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// URL substring → pattern code, consulted in order.
    #[serde(default)]
    pub url_patterns: Vec<UrlPattern>,

    /// Variables seeded into the store for `#{key}` templates.
    #[serde(default)]
    pub variables: HashMap<String, String>,

    /// Page objects by pattern code.
    #[serde(default)]
    pub patterns: BTreeMap<String, PageObject>,
}

impl LocatorConfig {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse_with_params(&content, &Params::new())
    }

    /// Load config from a YAML file with parameters.
    pub fn load_with_params<P: AsRef<Path>>(path: P, params: &Params) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse_with_params(&content, params)
    }

    /// Parse config from YAML string (no params).
    pub fn parse(yaml: &str) -> Result<Self> {
        Self::parse_with_params(yaml, &Params::new())
    }

    /// Parse config from YAML string with `${param}` substitution.
    pub fn parse_with_params(yaml: &str, params: &Params) -> Result<Self> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(yaml)?;

        let defs: HashMap<String, ParamDef> = value
            .get("params")
            .and_then(|v| serde_yaml::from_value(v.clone()).ok())
            .unwrap_or_default();

        ParamFiller::new(params, &defs).fill(&mut value)?;

        let mut config: LocatorConfig = serde_yaml::from_value(value)?;
        config.validate()?;
        config.resolver.url_patterns = config.url_patterns.clone();
        Ok(config)
    }

    /// Seed the store with variables and every page object's tables.
    pub fn install<S: VariableStore + ?Sized>(&self, store: &S) {
        for (key, value) in &self.variables {
            store.set(key, value);
        }
        for (code, page) in &self.patterns {
            page.install(code, store);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("name is required".into()));
        }
        if self.patterns.is_empty() {
            return Err(Error::Config(
                "patterns: define at least one pattern".into(),
            ));
        }
        if let Some(ref default) = self.resolver.default_pattern {
            if !self.patterns.contains_key(default) {
                return Err(Error::Config(format!(
                    "resolver.default_pattern '{}' is not a defined pattern",
                    default
                )));
            }
        }
        for rule in &self.url_patterns {
            if rule.contains.is_empty() {
                return Err(Error::Config(
                    "url_patterns: 'contains' must not be empty".into(),
                ));
            }
            if !self.patterns.contains_key(&rule.pattern) {
                return Err(Error::Config(format!(
                    "url_patterns: '{}' maps to undefined pattern '{}'",
                    rule.contains, rule.pattern
                )));
            }
        }
        for (code, page) in &self.patterns {
            page.validate(code)?;
        }
        if self.resolver.timeout_ms == 0 {
            return Err(Error::Config(
                "resolver.timeout_ms must be greater than 0".into(),
            ));
        }
        if self.resolver.retry_interval_ms == 0 {
            return Err(Error::Config(
                "resolver.retry_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Timing and selection settings for [`crate::Resolver`].
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Pattern used when neither an override nor a URL rule applies.
    pub default_pattern: Option<String>,

    /// Overall budget per resolution.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Pause between failed passes.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Pause after each scroll step.
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,

    /// Upper bound for the initial load wait.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    /// Attribute on a label naming its control.
    #[serde(default = "default_indirection_attribute")]
    pub indirection_attribute: String,

    /// URL rules for pattern auto-detection. Filled from the file's
    /// top-level `url_patterns` when parsed.
    #[serde(skip)]
    pub url_patterns: Vec<UrlPattern>,
}

impl ResolverConfig {
    /// Attach URL rules used for pattern auto-detection.
    pub fn with_url_patterns(mut self, url_patterns: Vec<UrlPattern>) -> Self {
        self.url_patterns = url_patterns;
        self
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            default_pattern: None,
            timeout_ms: default_timeout_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            scroll_settle_ms: default_scroll_settle_ms(),
            load_timeout_ms: default_load_timeout_ms(),
            indirection_attribute: default_indirection_attribute(),
            url_patterns: Vec::new(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_retry_interval_ms() -> u64 {
    500
}

fn default_scroll_settle_ms() -> u64 {
    250
}

fn default_load_timeout_ms() -> u64 {
    10_000
}

fn default_indirection_attribute() -> String {
    "for".into()
}

/// Maps a URL substring to a pattern code.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UrlPattern {
    /// Substring of the current document URL.
    pub contains: String,
    /// Pattern code to activate.
    pub pattern: String,
}

impl UrlPattern {
    pub fn new(contains: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            contains: contains.into(),
            pattern: pattern.into(),
        }
    }
}
