//! # Topics
//!
//! A topic names a channel on the bus. It keys both the subscriber registry
//! and the dead-letter partitions, so it is validated once on the way in.

use crate::error::BusError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Validated topic name, e.g. `"lead.new"` or `"Insight.New"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Maximum topic length in bytes.
    pub const MAX_LEN: usize = 255;

    /// Validate and wrap a topic name.
    ///
    /// # Errors
    ///
    /// `BusError::InvalidArgument` if the name is empty, longer than
    /// [`Topic::MAX_LEN`], or contains whitespace or control characters.
    pub fn new(name: impl Into<String>) -> Result<Self, BusError> {
        let name = name.into();

        if name.is_empty() {
            return Err(BusError::invalid("topic must not be empty"));
        }
        if name.len() > Self::MAX_LEN {
            return Err(BusError::invalid(format!(
                "topic is {} bytes long (max {})",
                name.len(),
                Self::MAX_LEN
            )));
        }
        if let Some(c) = name.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(BusError::invalid(format!(
                "topic {name:?} contains illegal character {c:?}"
            )));
        }

        Ok(Self(name))
    }

    /// The topic name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Topic {
    type Error = BusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for Topic {
    type Error = BusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}
