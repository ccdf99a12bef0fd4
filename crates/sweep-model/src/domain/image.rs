use serde::{Deserialize, Serialize};

/// Opaque image identifier as reported by the container runtime.
pub type ImageId = String;

/// A cached container image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Runtime identifier, stable for the duration of a run.
    pub id: ImageId,
    /// Human-readable repository tags. May be empty (dangling image).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Image {
    pub fn new<I, T>(id: I, tags: T) -> Self
    where
        I: Into<ImageId>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            id: id.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Image without any tag.
    pub fn untagged(id: impl Into<ImageId>) -> Self {
        Self {
            id: id.into(),
            tags: Vec::new(),
        }
    }

    pub fn is_dangling(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_image_is_dangling() {
        let img = Image::untagged("sha256:abc");
        assert!(img.is_dangling());
        assert!(!Image::new("sha256:abc", ["nginx:1.27"]).is_dangling());
    }

    #[test]
    fn tags_omitted_when_empty() {
        let json = serde_json::to_string(&Image::untagged("x")).unwrap();
        assert_eq!(json, r#"{"id":"x"}"#);

        let back: Image = serde_json::from_str(r#"{"id":"y"}"#).unwrap();
        assert!(back.tags.is_empty());
    }
}
