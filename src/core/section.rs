// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Section directive tracking for `.previous` support.

use crate::core::error::{PpError, PpErrorKind};

/// Stack of section-changing directive lines in source order.
///
/// Every `.section`, `.text`, and `.const_data` line is pushed. `.previous`
/// resolves to the next-to-last entry and pushes it again, so a second
/// `.previous` toggles back.
pub struct SectionStack {
    stack: Vec<String>,
}

impl SectionStack {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    pub fn push(&mut self, line: String) {
        self.stack.push(line);
    }

    /// Resolve `.previous`: return the next-to-last section directive and
    /// make it current again.
    pub fn previous(&mut self) -> Result<String, PpError> {
        if self.stack.len() < 2 {
            return Err(PpError::new(
                PpErrorKind::Unsupported,
                ".previous without a previous section",
                None,
            ));
        }
        let line = self.stack[self.stack.len() - 2].clone();
        self.stack.push(line.clone());
        Ok(line)
    }

    pub fn current(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }
}

impl Default for SectionStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previous_toggles_between_the_last_two_sections() {
        let mut sections = SectionStack::new();
        sections.push(".text".to_string());
        sections.push(".const_data".to_string());
        assert_eq!(sections.previous().unwrap(), ".text");
        assert_eq!(sections.previous().unwrap(), ".const_data");
        assert_eq!(sections.current(), Some(".const_data"));
    }

    #[test]
    fn previous_requires_two_prior_sections() {
        let mut sections = SectionStack::new();
        sections.push(".text".to_string());
        let err = sections.previous().unwrap_err();
        assert_eq!(err.to_string(), ".previous without a previous section");
    }
}
