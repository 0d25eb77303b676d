use crate::resolver::strategy::{self, split_strategies};
use crate::store::VariableStore;
use crate::Error;
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;

/// Strategy tables for one page object.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PageObject {
    /// Ordered fallback strategies per element type (`button`, `input`, `label`, ...).
    #[serde(default)]
    pub fields: HashMap<String, Strategies>,

    /// Section templates by section name.
    #[serde(default)]
    pub sections: HashMap<String, String>,

    /// Location templates by location name.
    #[serde(default)]
    pub locations: HashMap<String, String>,

    /// Containers to scroll while waiting for lazy content.
    #[serde(default)]
    pub scroll: Strategies,
}

impl PageObject {
    /// Write this page object into the store under `pattern.<code>.*`.
    pub fn install<S: VariableStore + ?Sized>(&self, code: &str, store: &S) {
        for (element_type, strategies) in &self.fields {
            store.set(&strategy::fields_key(code, element_type), &strategies.joined());
        }
        for (name, template) in &self.sections {
            store.set(&strategy::sections_key(code, name), template);
        }
        for (name, template) in &self.locations {
            store.set(&strategy::locations_key(code, name), template);
        }
        if !self.scroll.is_empty() {
            store.set(&strategy::scroll_key(code), &self.scroll.joined());
        }
    }

    /// List entries are stored `;`-joined, so an entry may not contain `;`.
    pub(crate) fn validate(&self, code: &str) -> crate::Result<()> {
        let lists = self
            .fields
            .iter()
            .map(|(element_type, s)| (format!("fields.{}", element_type), s))
            .chain(std::iter::once(("scroll".to_string(), &self.scroll)));
        for (table, strategies) in lists {
            if let Some(bad) = strategies.0.iter().find(|s| s.contains(';')) {
                return Err(Error::Config(format!(
                    "patterns.{}.{}: strategy \"{}\" contains ';', which separates strategies",
                    code, table, bad
                )));
            }
        }
        Ok(())
    }
}

/// An ordered strategy list. Accepts either a `;`-delimited string or a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Strategies(Vec<String>);

impl Strategies {
    /// The store form: all strategies joined with `;`.
    pub fn joined(&self) -> String {
        self.0.join(";")
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Strategies {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(StrategiesVisitor)
    }
}

struct StrategiesVisitor;

impl<'de> Visitor<'de> for StrategiesVisitor {
    type Value = Strategies;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a ';'-delimited strategy string or a list of strategies")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if value.is_empty() {
            return Ok(Strategies::default());
        }
        Ok(Strategies(split_strategies(value)))
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Strategies::default())
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<String>()? {
            items.push(item);
        }
        Ok(Strategies(items))
    }
}
