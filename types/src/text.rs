//! Styled text handed to the host's chat, action bar and sidebar.
//!
//! The core never encodes colours itself; it builds a list of spans and
//! the host maps [`TextColor`] onto whatever its display surface supports.

use serde::{Deserialize, Serialize};

use crate::formatting::truncate_chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextColor {
    White,
    Gray,
    DarkGray,
    Red,
    DarkRed,
    Green,
    Gold,
    Aqua,
    DarkAqua,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    pub color: TextColor,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

/// An ordered run of coloured spans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyledText {
    pub spans: Vec<Span>,
}

impl StyledText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-span convenience constructor.
    pub fn plain_colored(text: impl Into<String>, color: TextColor) -> Self {
        Self::new().text(text, color)
    }

    pub fn text(mut self, text: impl Into<String>, color: TextColor) -> Self {
        self.spans.push(Span {
            text: text.into(),
            color,
            bold: false,
            italic: false,
        });
        self
    }

    pub fn bold(mut self, text: impl Into<String>, color: TextColor) -> Self {
        self.spans.push(Span {
            text: text.into(),
            color,
            bold: true,
            italic: false,
        });
        self
    }

    pub fn italic(mut self, text: impl Into<String>, color: TextColor) -> Self {
        self.spans.push(Span {
            text: text.into(),
            color,
            bold: false,
            italic: true,
        });
        self
    }

    /// Append every span of `other`.
    pub fn append(mut self, other: StyledText) -> Self {
        self.spans.extend(other.spans);
        self
    }

    /// Visible text with all styling stripped.
    pub fn plain(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn char_len(&self) -> usize {
        self.spans.iter().map(|s| s.text.chars().count()).sum()
    }

    /// Cut the visible text down to `max` characters, dropping empty spans.
    pub fn truncated(mut self, max: usize) -> Self {
        if self.char_len() <= max {
            return self;
        }
        let mut remaining = max;
        self.spans.retain_mut(|span| {
            if remaining == 0 {
                return false;
            }
            let len = span.text.chars().count();
            if len > remaining {
                span.text = truncate_chars(&span.text, remaining);
                remaining = 0;
            } else {
                remaining -= len;
            }
            !span.text.is_empty()
        });
        self
    }
}

impl std::fmt::Display for StyledText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for span in &self.spans {
            f.write_str(&span.text)?;
        }
        Ok(())
    }
}
