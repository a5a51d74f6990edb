//! Context sections — the labeled chunks of text merged into a request.

use serde::{Deserialize, Serialize};

/// Where a section's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionOrigin {
    /// Read back from the conversation's memory buffer
    Persisted,
    /// Extracted from an uploaded attachment
    File,
    /// Fetched from a URL in the latest user turn
    Link,
}

/// One labeled chunk of contextual text, produced per-request and never
/// stored beyond assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSection {
    /// Human-readable label (URL, filename group, or a fixed tag)
    pub label: String,

    /// The section's text content
    pub text: String,

    /// Provenance of the text
    pub origin: SectionOrigin,
}

impl ContextSection {
    pub fn persisted(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
            origin: SectionOrigin::Persisted,
        }
    }

    pub fn file(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
            origin: SectionOrigin::File,
        }
    }

    pub fn link(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
            origin: SectionOrigin::Link,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_origin() {
        assert_eq!(
            ContextSection::persisted("mem", "x").origin,
            SectionOrigin::Persisted
        );
        assert_eq!(ContextSection::file("f", "x").origin, SectionOrigin::File);
        assert_eq!(
            ContextSection::link("https://a.com", "x").origin,
            SectionOrigin::Link
        );
    }

    #[test]
    fn origin_serializes_lowercase() {
        let section = ContextSection::link("https://a.com", "body");
        let json = serde_json::to_string(&section).unwrap();
        assert!(json.contains(r#""origin":"link""#));
    }
}
