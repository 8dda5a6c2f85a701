use serde::{Deserialize, Serialize};

/// A required role or permission value: one identifier, or several.
///
/// Serialized the way route tables write it: a bare string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Requirement {
    One(String),
    Many(Vec<String>),
}

impl Requirement {
    pub fn values(&self) -> Vec<&str> {
        match self {
            Requirement::One(v) => vec![v.as_str()],
            Requirement::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// An empty single value. Route metadata treats it as no requirement;
    /// a list, even an empty one, always counts.
    pub fn is_blank(&self) -> bool {
        matches!(self, Requirement::One(v) if v.is_empty())
    }
}

impl From<&str> for Requirement {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for Requirement {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<String>> for Requirement {
    fn from(value: Vec<String>) -> Self {
        Self::Many(value)
    }
}

impl From<Vec<&str>> for Requirement {
    fn from(value: Vec<&str>) -> Self {
        Self::Many(value.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Requirement {
    fn from(value: [&str; N]) -> Self {
        Self::Many(value.iter().map(|v| v.to_string()).collect())
    }
}
