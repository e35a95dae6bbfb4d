//! Image reference splitting
//!
//! The create-image endpoint takes the repository and the tag (or digest) as
//! separate query parameters.

use crate::error::EngineError;

const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    name: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageReference {
    pub fn parse(reference: &str) -> Result<Self, EngineError> {
        let reference = reference.trim();
        if reference.is_empty() || reference.chars().any(char::is_whitespace) {
            return Err(EngineError::InvalidReference(reference.to_string()));
        }

        let (remainder, digest) = match reference.split_once('@') {
            Some((name, digest)) if !digest.is_empty() => (name, Some(digest.to_string())),
            Some(_) => return Err(EngineError::InvalidReference(reference.to_string())),
            None => (reference, None),
        };

        // A colon before the last slash belongs to a registry port, not a tag.
        let last_slash = remainder.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (name, tag) = match remainder[last_slash..].rfind(':') {
            Some(pos) => {
                let split = last_slash + pos;
                let tag = &remainder[split + 1..];
                if tag.is_empty() {
                    return Err(EngineError::InvalidReference(reference.to_string()));
                }
                (&remainder[..split], Some(tag.to_string()))
            }
            None => (remainder, None),
        };

        if name.is_empty() || name.ends_with('/') {
            return Err(EngineError::InvalidReference(reference.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            tag,
            digest,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Value for the `tag` query parameter: digest, then tag, then `latest`
    pub fn api_tag(&self) -> &str {
        self.digest
            .as_deref()
            .or(self.tag.as_deref())
            .unwrap_or(DEFAULT_TAG)
    }
}
