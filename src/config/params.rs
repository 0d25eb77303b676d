//! `${param}` values filled into a pattern file while it is loaded.
//!
//! Values come from `-P key=value` and fall back to the defaults declared in
//! the file's `params:` table. Mapping keys are filled as well, so section and
//! location names can be parameterised too. Runtime `#{key}` placeholders are
//! left for the resolver.

use crate::store::fill_placeholders;
use crate::{Error, Result};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};

/// `key=value` pairs given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style set.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse `-P` arguments. Keys are trimmed; values are kept as given and
    /// may contain further `=`.
    pub fn from_args(args: &[String]) -> Result<Self> {
        args.iter().try_fold(Self::new(), |params, arg| {
            match arg.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => Ok(params.set(key.trim(), value)),
                _ => Err(Error::Config(format!(
                    "invalid param '{}', expected key=value",
                    arg
                ))),
            }
        })
    }
}

/// One entry of a pattern file's `params:` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParamDef {
    pub required: bool,
    pub default: Option<String>,
    /// Shown by `--check`.
    pub description: Option<String>,
}

/// Fills `${name}` placeholders throughout a parsed pattern file.
pub(crate) struct ParamFiller<'a> {
    params: &'a Params,
    defs: &'a HashMap<String, ParamDef>,
}

impl<'a> ParamFiller<'a> {
    pub(crate) fn new(params: &'a Params, defs: &'a HashMap<String, ParamDef>) -> Self {
        Self { params, defs }
    }

    /// CLI value, then declared default. Undeclared names stay as written;
    /// declared optional names without a default become empty.
    fn value(&self, name: &str) -> Result<Option<String>> {
        if let Some(value) = self.params.get(name) {
            return Ok(Some(value.to_string()));
        }
        match self.defs.get(name) {
            None => Ok(None),
            Some(ParamDef {
                default: Some(default),
                ..
            }) => Ok(Some(default.clone())),
            Some(ParamDef { required: true, .. }) => Err(Error::Config(format!(
                "missing required parameter: {}",
                name
            ))),
            Some(_) => Ok(Some(String::new())),
        }
    }

    pub(crate) fn fill_str(&self, text: &str) -> Result<String> {
        fill_placeholders(text, "${", |name| self.value(name))
    }

    /// Fill every string in `value`, mapping keys included.
    pub(crate) fn fill(&self, value: &mut Value) -> Result<()> {
        match value {
            Value::String(text) => *text = self.fill_str(text)?,
            Value::Sequence(items) => {
                for item in items {
                    self.fill(item)?;
                }
            }
            Value::Mapping(map) => {
                for (mut key, mut item) in std::mem::take(map) {
                    self.fill(&mut key)?;
                    self.fill(&mut item)?;
                    map.insert(key, item);
                }
            }
            Value::Tagged(tagged) => self.fill(&mut tagged.value)?,
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
        Ok(())
    }
}
