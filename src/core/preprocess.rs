// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Three-pass line transformer turning gas constructs into output Apple's
//! legacy assembler accepts.
//!
//! Pass 1 normalizes each raw line and expands macro invocations, pass 2
//! expands repetition blocks and applies the architecture-specific rewrites,
//! pass 3 filters conditional blocks and flushes the literal pool. Each pass
//! consumes the buffered output of the previous one; there is no real parser,
//! lines are matched against pattern fragments.

use std::collections::HashMap;

use crate::core::arch::Arch;
use crate::core::conditional::ConditionalStack;
use crate::core::error::{PpError, PpErrorKind};
use crate::core::literal_pool::LiteralPool;
use crate::core::section::SectionStack;
use crate::core::text_utils::{
    directive_is, directive_rest, find_directive, is_full_comment, replace_directive,
    strip_comment,
};

#[path = "preprocess_macros.rs"]
mod preprocess_macros;
#[path = "preprocess_repeats.rs"]
mod preprocess_repeats;
#[path = "preprocess_conditionals.rs"]
mod preprocess_conditionals;

use preprocess_macros::MacroDef;
use preprocess_repeats::Repetition;

const MAX_EXPANSION_DEPTH: usize = 64;

/// Directives Apple's assembler rejects; neutralized with the comment
/// character up front. The neutralized `.ltorg` is still recognized by the
/// repetition pass, which drains the literal pool in its place.
const COMMENTED_DIRECTIVES: &[&str] = &[
    ".type",
    ".func",
    ".endfunc",
    ".ltorg",
    ".size",
    ".fpu",
    ".arch",
    ".object_arch",
];

/// Owns all transformer state: the macro table, section stack, literal
/// pool, conditional stack, and the active repetition block.
pub struct Preprocessor {
    arch: Arch,
    comm: char,
    fix_unreq: bool,
    macros: HashMap<String, MacroDef>,
    macro_level: u32,
    current_macro: Option<String>,
    sections: SectionStack,
    literals: LiteralPool,
    conditionals: ConditionalStack,
    repetition: Option<Repetition>,
    expanded: Vec<String>,
}

impl Preprocessor {
    pub fn new(arch: Arch, fix_unreq: bool) -> Self {
        Self {
            arch,
            comm: arch.comment_char(),
            fix_unreq,
            macros: HashMap::new(),
            macro_level: 0,
            current_macro: None,
            sections: SectionStack::new(),
            literals: LiteralPool::new(),
            conditionals: ConditionalStack::new(),
            repetition: None,
            expanded: Vec::new(),
        }
    }

    /// Run all passes over `lines` and return the transformed stream,
    /// terminated by `.text` and any residual literal-pool entries.
    pub fn process<I>(&mut self, lines: I) -> Result<Vec<String>, PpError>
    where
        I: IntoIterator<Item = String>,
    {
        for raw in lines {
            let line = self.normalize(&raw)?;
            self.feed(line)?;
        }
        if self.macro_level > 0 {
            return Err(PpError::new(
                PpErrorKind::Malformed,
                ".macro without matching .endm",
                self.current_macro.as_deref(),
            ));
        }
        let expanded = std::mem::take(&mut self.expanded);
        let rewritten = self.rewrite(expanded)?;
        self.filter(rewritten)
    }

    /// Normalize one raw input line: comment stripping, directive
    /// neutralization, alias rewrites, and the Mach-O section check.
    ///
    /// A line that already is a comment passes through untouched.
    fn normalize(&self, raw: &str) -> Result<String, PpError> {
        let trimmed = raw.trim_end_matches(['\r', '\n']);
        if is_full_comment(trimmed, self.comm) {
            return Ok(trimmed.to_string());
        }
        let mut line = strip_comment(trimmed, self.comm).to_string();
        for name in COMMENTED_DIRECTIVES {
            if let Some(idx) = find_directive(&line, name) {
                line.insert(idx, self.comm);
            }
        }
        if let Some(rewritten) = replace_directive(&line, ".global", ".globl") {
            line = rewritten;
        }
        if let Some(rewritten) = replace_directive(&line, ".int", ".long") {
            line = rewritten;
        }
        if let Some(rewritten) = replace_directive(&line, ".float", ".single") {
            line = rewritten;
        }
        if directive_is(&line, ".section") {
            if line.contains(".rodata") {
                let indent_len = line.len() - line.trim_start().len();
                line.truncate(indent_len);
                line.push_str(".const_data");
            } else if !directive_rest(&line, ".section").contains(',') {
                return Err(PpError::new(
                    PpErrorKind::Unsupported,
                    "Unsupported section name; Mach-O sections are segment,section pairs",
                    Some(trimmed),
                ));
            }
        }
        Ok(line)
    }
}
