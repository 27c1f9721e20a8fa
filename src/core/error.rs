// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types and diagnostics for the preprocessor.

use std::fmt;

/// Categories of preprocessor errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpErrorKind {
    Cli,
    Downstream,
    Expression,
    Io,
    Malformed,
    Unsupported,
}

/// A preprocessor error with a kind and message.
///
/// All errors are fatal: the first one aborts the run with a one-line
/// diagnostic naming the triggering line where one is available.
#[derive(Debug, Clone)]
pub struct PpError {
    kind: PpErrorKind,
    message: String,
}

impl PpError {
    pub fn new(kind: PpErrorKind, msg: &str, param: Option<&str>) -> Self {
        Self {
            kind,
            message: format_error(msg, param),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> PpErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        diagnostic_code(self.kind)
    }
}

impl fmt::Display for PpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PpError {}

/// Format an error message with an optional parameter.
pub fn format_error(msg: &str, param: Option<&str>) -> String {
    match param {
        Some(p) => format!("{msg}: {p}"),
        None => msg.to_string(),
    }
}

fn diagnostic_code(kind: PpErrorKind) -> &'static str {
    match kind {
        PpErrorKind::Cli => "gpp101",
        PpErrorKind::Downstream => "gpp501",
        PpErrorKind::Expression => "gpp401",
        PpErrorKind::Io => "gpp502",
        PpErrorKind::Malformed => "gpp201",
        PpErrorKind::Unsupported => "gpp301",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_includes_parameter() {
        let err = PpError::new(PpErrorKind::Malformed, "Too many arguments to macro", Some("m"));
        assert_eq!(err.to_string(), "Too many arguments to macro: m");
        assert_eq!(err.kind(), PpErrorKind::Malformed);
    }

    #[test]
    fn diagnostic_codes_are_stable_per_kind() {
        let err = PpError::new(PpErrorKind::Unsupported, "Unknown conditional directive", None);
        assert_eq!(err.code(), "gpp301");
        let err = PpError::new(PpErrorKind::Downstream, "Broken pipe", None);
        assert_eq!(err.code(), "gpp501");
    }
}
