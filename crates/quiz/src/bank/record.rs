use std::fmt;

use serde::{Deserialize, Serialize};

/// Question category. Round-trips through its wire string so kinds this
/// build does not know about survive import/export unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionKind {
    Normal,
    Biblical,
    Other(String),
}

impl QuestionKind {
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Normal => "normal",
            Self::Biblical => "biblical",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for QuestionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "normal" => Self::Normal,
            "biblical" => Self::Biblical,
            _ => Self::Other(value),
        }
    }
}

impl From<QuestionKind> for String {
    fn from(value: QuestionKind) -> Self {
        value.as_wire().to_string()
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    pub id: String,
}

/// Canonical question shape. Invariant (enforced by the normalizer):
/// `question` is non-empty, `choices` holds at least one entry, and
/// `correct` equals exactly one choice's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    pub question: String,
    pub choices: Vec<Choice>,
    pub correct: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verse: Option<String>,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
}

impl QuestionRecord {
    pub fn has_choice(&self, text: &str) -> bool {
        self.choices.iter().any(|choice| choice.text == text)
    }
}

/// Pre-normalization shape accepted from fetched files, imports, and the
/// persisted blob. Every field is optional; the normalizer decides what
/// survives.
#[derive(Debug, Deserialize)]
pub(crate) struct RawQuestion {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) question: Option<String>,
    #[serde(default)]
    pub(crate) choices: Vec<RawChoice>,
    #[serde(default)]
    pub(crate) correct: Option<String>,
    #[serde(default)]
    pub(crate) verse: Option<String>,
    #[serde(default, rename = "type")]
    pub(crate) kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawChoice {
    Text(String),
    Entry {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        id: Option<String>,
    },
    // Anything else (numbers, nulls, nested arrays) lands here and is
    // dropped during normalization instead of failing the whole record.
    Malformed(serde_json::Value),
}
