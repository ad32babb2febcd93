//! Hierarchical resource IDs of the form `/key1/value1/key2/value2/...`.
//!
//! Segment keys compare case-insensitively, values keep their case.

use std::fmt;

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    segments: Vec<(String, String)>,
}

impl ResourceId {
    pub fn parse(id: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidResourceId {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let path = id
            .strip_prefix('/')
            .ok_or_else(|| invalid("must start with '/'"))?;
        let parts: Vec<&str> = path.trim_end_matches('/').split('/').collect();
        if parts.len() < 2 || parts.len() % 2 != 0 {
            return Err(invalid("expected an even number of key/value segments"));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("contains an empty segment"));
        }

        let segments = parts
            .chunks(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();
        Ok(Self { segments })
    }

    pub fn builder() -> ResourceIdBuilder {
        ResourceIdBuilder::default()
    }

    /// Value of the first segment whose key matches `key`, ignoring case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn require(&self, key: &str) -> Result<&str, CoreError> {
        self.get(key).ok_or_else(|| CoreError::InvalidResourceId {
            id: self.to_string(),
            reason: format!("missing segment {key:?}"),
        })
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (k, v) in &self.segments {
            write!(f, "/{k}/{v}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ResourceIdBuilder {
    segments: Vec<(String, String)>,
}

impl ResourceIdBuilder {
    pub fn segment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.segments.push((key.into(), value.into()));
        self
    }

    pub fn build(self) -> ResourceId {
        ResourceId {
            segments: self.segments,
        }
    }
}
