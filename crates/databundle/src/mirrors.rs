use serde::Deserialize;

/// Ordered list of URLs believed to serve the same bundle, highest priority first.
///
/// Deserialises from either a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "OneOrMany")]
pub struct MirrorList(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for MirrorList {
    fn from(v: OneOrMany) -> Self {
        match v {
            OneOrMany::One(url) => Self(vec![url]),
            OneOrMany::Many(urls) => Self(urls),
        }
    }
}

impl MirrorList {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for MirrorList {
    fn from(url: &str) -> Self {
        Self(vec![url.to_string()])
    }
}

impl From<String> for MirrorList {
    fn from(url: String) -> Self {
        Self(vec![url])
    }
}

impl From<Vec<String>> for MirrorList {
    fn from(urls: Vec<String>) -> Self {
        Self(urls)
    }
}

impl From<&[&str]> for MirrorList {
    fn from(urls: &[&str]) -> Self {
        Self(urls.iter().map(|u| u.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for MirrorList {
    fn from(urls: [&str; N]) -> Self {
        Self(urls.iter().map(|u| u.to_string()).collect())
    }
}
