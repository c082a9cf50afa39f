//! Scope/tag pairs attached to NSX objects.

use serde::{Deserialize, Serialize};

/// One `{scope, tag}` pair. Order within a tag list is significant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub tag: String,
}

impl Tag {
    pub fn new(scope: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            tag: tag.into(),
        }
    }
}

/// Check tag limits enforced by the manager before sending them.
pub fn validate_tags(tags: &[Tag]) -> Result<(), String> {
    // NSX limits: 30 tags per object, scope <= 128 chars, tag <= 256 chars.
    if tags.len() > 30 {
        return Err(format!("at most 30 tags are allowed, got {}", tags.len()));
    }
    for t in tags {
        if t.scope.chars().count() > 128 {
            return Err(format!("tag scope '{}' exceeds 128 characters", t.scope));
        }
        if t.tag.chars().count() > 256 {
            return Err(format!("tag '{}' exceeds 256 characters", t.tag));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_serde_defaults() {
        let tag: Tag = serde_json::from_str(r#"{"tag": "web"}"#).unwrap();
        assert_eq!(tag, Tag::new("", "web"));
    }

    #[test]
    fn test_validate_tags() {
        assert!(validate_tags(&[Tag::new("env", "prod")]).is_ok());

        let too_many: Vec<Tag> = (0..31).map(|i| Tag::new("s", i.to_string())).collect();
        assert!(validate_tags(&too_many).is_err());

        let long_scope = Tag::new("s".repeat(129), "t");
        assert!(validate_tags(&[long_scope]).is_err());
    }
}
