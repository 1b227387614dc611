//! Generic configuration element with typed attribute helpers.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// A named node with string attributes and ordered children.
///
/// Command parameters travel as one of these: the command reads its
/// attributes in `read_configuration` and writes them back in
/// `write_configuration`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigElement {
    /// Tag name of the node.
    pub name: String,

    /// Attributes by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Child nodes in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ConfigElement>,
}

impl ConfigElement {
    /// Create an empty element with the given tag name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute (builder pattern).
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Add a child node (builder pattern).
    pub fn with_child(mut self, child: ConfigElement) -> Self {
        self.children.push(child);
        self
    }

    /// Get an attribute value.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Set an attribute, replacing any previous value.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Set an attribute from any displayable value.
    pub fn set_display_attribute<T: Display>(&mut self, key: impl Into<String>, value: T) {
        self.set_attribute(key, value.to_string());
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        self.attributes.remove(key)
    }

    /// Check if an attribute exists.
    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Append a child node.
    pub fn add_child(&mut self, child: ConfigElement) {
        self.children.push(child);
    }

    /// All children with the given tag, in document order.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a ConfigElement> {
        self.children.iter().filter(move |c| c.name == tag)
    }

    /// First child with the given tag.
    pub fn first_child(&self, tag: &str) -> Option<&ConfigElement> {
        self.children.iter().find(|c| c.name == tag)
    }

    /// Get a required attribute.
    pub fn required_attribute(&self, key: &str) -> Result<&str, ServerError> {
        self.attribute(key)
            .ok_or_else(|| ServerError::missing_parameter(key))
    }

    /// Get an optional attribute parsed into `T`.
    ///
    /// A present but malformed value is an error naming the attribute.
    pub fn parse_attribute<T>(&self, key: &str) -> Result<Option<T>, ServerError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.attribute(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| ServerError::invalid_parameter(key, e.to_string())),
        }
    }

    /// Get a required attribute parsed into `T`.
    pub fn parse_required_attribute<T>(&self, key: &str) -> Result<T, ServerError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.parse_attribute(key)?
            .ok_or_else(|| ServerError::missing_parameter(key))
    }

    /// Get an optional boolean attribute.
    ///
    /// Accepts `TRUE`/`FALSE` in any case as well as `1`/`0`.
    pub fn bool_attribute(&self, key: &str) -> Result<Option<bool>, ServerError> {
        match self.attribute(key) {
            None => Ok(None),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                other => Err(ServerError::invalid_parameter(
                    key,
                    format!("expected TRUE or FALSE, got '{}'", other),
                )),
            },
        }
    }

    /// Get an optional whitespace-separated list of numbers.
    pub fn vector_attribute(&self, key: &str) -> Result<Option<Vec<f64>>, ServerError> {
        match self.attribute(key) {
            None => Ok(None),
            Some(raw) => raw
                .split_whitespace()
                .map(|part| match part.parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(value),
                    Ok(_) => Err(ServerError::invalid_parameter(
                        key,
                        format!("'{}' is not a finite number", part),
                    )),
                    Err(_) => Err(ServerError::invalid_parameter(
                        key,
                        format!("'{}' is not a number", part),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
        }
    }
}

/// Format a boolean the way attributes carry it.
pub fn format_bool(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Format numbers as a whitespace-separated attribute value.
pub fn format_vector(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
