use std::fmt;

/// Severity of a user-facing status line. Informational and success
/// messages are transient; errors stay on screen until the next action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusLevel {
    Info,
    Success,
    Error,
}

impl StatusLevel {
    pub(crate) fn auto_clears(self) -> bool {
        !matches!(self, Self::Error)
    }

    fn ansi_color(self) -> &'static str {
        match self {
            Self::Info => "\x1b[36m",
            Self::Success => "\x1b[32m",
            Self::Error => "\x1b[31m",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StatusLine {
    pub(crate) level: StatusLevel,
    pub(crate) text: String,
}

impl StatusLine {
    pub(crate) fn info(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            text: text.into(),
        }
    }

    pub(crate) fn success(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Success,
            text: text.into(),
        }
    }

    pub(crate) fn error(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            text: text.into(),
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}\x1b[0m", self.level.ansi_color(), self.text)
    }
}
