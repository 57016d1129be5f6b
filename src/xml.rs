// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One XML element as handed across the connection-manager boundary.
///
/// The core never parses or serializes bytes itself (that's the connection manager's job, out
/// of scope here); a node is just a tag name plus an ordered bag of string attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlNode {
    tag: String,
    attributes: BTreeMap<String, String>,
}

impl XmlNode {
    /// Create a node with the given tag and no attributes.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// In-place attribute setter, for codecs assembling a node incrementally.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Parse an attribute as an unsigned decimal integer.
    ///
    /// Returns `None` both when the attribute is absent and when it fails to parse; callers
    /// that need to tell those apart should use [`XmlNode::attribute`] directly.
    pub fn attribute_u64(&self, key: &str) -> Option<u64> {
        self.attribute(key)?.parse().ok()
    }
}

impl fmt::Display for XmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (key, value) in &self.attributes {
            write!(f, " {key}=\"{value}\"")?;
        }
        write!(f, "/>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_accessors_round_trip() {
        let node = XmlNode::new("sync-begin").with_attribute("num-messages", "2".to_string());
        assert_eq!(node.tag(), "sync-begin");
        assert_eq!(node.attribute("num-messages"), Some("2"));
        assert_eq!(node.attribute_u64("num-messages"), Some(2));
        assert_eq!(node.attribute("missing"), None);
    }

    #[test]
    fn malformed_numeric_attribute_parses_as_none() {
        let node = XmlNode::new("sync-begin").with_attribute("num-messages", "not-a-number");
        assert_eq!(node.attribute_u64("num-messages"), None);
    }
}
