//! Configuration — the free-form parameter map carried by rules and modules.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Ordered parameter name → JSON value map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(BTreeMap<String, serde_json::Value>);

impl Configuration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    /// Read a required non-negative integer parameter.
    ///
    /// Integral decimals such as `80.0` are accepted; strings, fractions and
    /// negative numbers are not.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingParameter`] when absent and
    /// [`ConfigurationError::InvalidParameter`] for any other shape.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::float_cmp
    )]
    pub fn get_u32(&self, name: &'static str) -> Result<u32, ConfigurationError> {
        let value = self
            .get(name)
            .ok_or(ConfigurationError::MissingParameter(name))?;
        let invalid = |reason: String| ConfigurationError::InvalidParameter { name, reason };
        if let Some(number) = value.as_u64() {
            return u32::try_from(number).map_err(|_| invalid(format!("{number} is out of range")));
        }
        match value.as_f64() {
            Some(number) if number.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&number) => {
                Ok(number as u32)
            }
            Some(number) => Err(invalid(format!("{number} is not a non-negative integer"))),
            None => Err(invalid(format!("expected a number, got {value}"))),
        }
    }

    /// Read an optional string parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] when present but not a string.
    pub fn get_str(&self, name: &'static str) -> Result<Option<&str>, ConfigurationError> {
        match self.get(name) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(text)) => Ok(Some(text.as_str())),
            Some(other) => Err(ConfigurationError::InvalidParameter {
                name,
                reason: format!("expected a string, got {other}"),
            }),
        }
    }

    /// Read an optional set of strings, given either as a JSON array or a
    /// comma separated string. Blank entries are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] for any other shape.
    pub fn get_string_set(
        &self,
        name: &'static str,
    ) -> Result<BTreeSet<String>, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidParameter { name, reason };
        let raw: Vec<String> = match self.get(name) {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::String(text)) => {
                text.split(',').map(str::to_string).collect()
            }
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| invalid(format!("expected strings, got {item}")))
                })
                .collect::<Result<_, _>>()?,
            Some(other) => return Err(invalid(format!("expected a list, got {other}"))),
        };
        Ok(raw
            .into_iter()
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect())
    }
}

impl FromIterator<(String, serde_json::Value)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
