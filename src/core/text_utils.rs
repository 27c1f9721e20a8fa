// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Byte-oriented text helpers shared by the preprocessing passes.

pub fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

/// Everything up to the first occurrence of the comment character.
pub fn strip_comment(line: &str, comm: char) -> &str {
    match line.find(comm) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// True when the first non-whitespace character is the comment character.
pub fn is_full_comment(line: &str, comm: char) -> bool {
    line.trim_start().starts_with(comm)
}

/// True when `code` begins with `name` as a whole directive token.
pub fn directive_is(code: &str, name: &str) -> bool {
    let code = code.trim_start();
    code.starts_with(name)
        && code.as_bytes()
            .get(name.len())
            .is_none_or(|b| !is_ident_char(*b))
}

/// Text following a leading `name` directive token, left-trimmed.
///
/// Callers must have established the prefix with [`directive_is`].
pub fn directive_rest<'a>(code: &'a str, name: &str) -> &'a str {
    code.trim_start()[name.len()..].trim_start()
}

/// Position of `name` in `line` as a standalone directive token.
pub fn find_directive(line: &str, name: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut start = 0;
    while let Some(rel) = line[start..].find(name) {
        let idx = start + rel;
        let before_ok = idx == 0 || !is_ident_char(bytes[idx - 1]);
        let after = idx + name.len();
        let after_ok = after >= bytes.len() || !is_ident_char(bytes[after]);
        if before_ok && after_ok {
            return Some(idx);
        }
        start = idx + 1;
    }
    None
}

/// Replace a standalone directive token, preserving the rest of the line.
pub fn replace_directive(line: &str, name: &str, replacement: &str) -> Option<String> {
    let idx = find_directive(line, name)?;
    let mut out = String::with_capacity(line.len() + replacement.len());
    out.push_str(&line[..idx]);
    out.push_str(replacement);
    out.push_str(&line[idx + name.len()..]);
    Some(out)
}

/// Forward-only byte cursor over a line of source text.
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn next(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    pub fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Consume a run of identifier characters, or None when there is none.
    pub fn take_ident(&mut self) -> Option<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        String::from_utf8(self.bytes[start..self.pos].to_vec()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_comment_keeps_code_before_comment_char() {
        assert_eq!(strip_comment("mov r0, r1 @ zero it", '@'), "mov r0, r1 ");
        assert_eq!(strip_comment("mov r0, r1", '@'), "mov r0, r1");
    }

    #[test]
    fn directive_is_requires_token_boundary() {
        assert!(directive_is(".text", ".text"));
        assert!(directive_is("  .text  ", ".text"));
        assert!(!directive_is(".textual", ".text"));
        assert!(!directive_is(".endmacro", ".endm"));
    }

    #[test]
    fn find_directive_skips_embedded_occurrences() {
        assert_eq!(find_directive("x .size y", ".size"), Some(2));
        assert_eq!(find_directive("label.size", ".size"), None);
        assert_eq!(find_directive(".sizeof", ".size"), None);
    }

    #[test]
    fn replace_directive_preserves_surrounding_text() {
        assert_eq!(
            replace_directive("  .global sym", ".global", ".globl").as_deref(),
            Some("  .globl sym")
        );
        assert_eq!(replace_directive(".globl sym", ".global", ".globl"), None);
    }

    #[test]
    fn cursor_takes_identifiers() {
        let mut cursor = Cursor::new("  add3 r0");
        cursor.skip_ws();
        assert_eq!(cursor.take_ident().as_deref(), Some("add3"));
        assert_eq!(cursor.peek(), Some(b' '));
    }
}
