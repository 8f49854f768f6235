use serde::{Deserialize, Serialize};
use std::fmt;

/// How a portal action finds the element it acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// First element matching a CSS selector.
    Css { selector: String },
    /// Input whose `placeholder` attribute equals the text.
    Placeholder { text: String },
    /// Element under `within` whose trimmed text equals `text`, else one containing it.
    Text { within: String, text: String },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css {
            selector: selector.into(),
        }
    }

    pub fn placeholder(text: impl Into<String>) -> Self {
        Locator::Placeholder { text: text.into() }
    }

    pub fn text(within: impl Into<String>, text: impl Into<String>) -> Self {
        Locator::Text {
            within: within.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css { selector } => write!(f, "{}", selector),
            Locator::Placeholder { text } => write!(f, "[placeholder=\"{}\"]", text),
            Locator::Text { within, text } => write!(f, "{} >> text=\"{}\"", within, text),
        }
    }
}
