use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TAG: &str = "latest";

/// An image reference split into repository and tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    /// Split `image` at its tag separator, defaulting the tag to `latest`.
    ///
    /// Only a colon after the last `/` separates a tag, so a registry port
    /// (`localhost:5000/app`) stays part of the repository.
    pub fn parse(image: &str) -> Self {
        let image = image.trim();
        let name_start = image.rfind('/').map_or(0, |i| i + 1);
        match image[name_start..].rfind(':') {
            Some(pos) => {
                let split = name_start + pos;
                let tag = &image[split + 1..];
                Self {
                    repository: image[..split].to_owned(),
                    tag: if tag.is_empty() {
                        DEFAULT_TAG.to_owned()
                    } else {
                        tag.to_owned()
                    },
                }
            }
            None => Self {
                repository: image.to_owned(),
                tag: DEFAULT_TAG.to_owned(),
            },
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}
