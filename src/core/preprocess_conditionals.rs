// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Conditional filtering and the literal-pool tail flush (pass 3).

use crate::core::conditional::CondState;
use crate::core::error::{PpError, PpErrorKind};
use crate::core::eval::eval_expr;
use crate::core::text_utils::directive_is;

use super::Preprocessor;

impl Preprocessor {
    /// Pass 3 over the rewritten stream: evaluate `.if` chains, emit only
    /// lines inside live branches, then terminate the output with `.text`
    /// and any literals no explicit `.ltorg` covered.
    pub(super) fn filter(&mut self, lines: Vec<String>) -> Result<Vec<String>, PpError> {
        let mut out = Vec::new();
        for line in lines {
            self.filter_line(&line, &mut out)?;
        }
        if !self.conditionals.is_empty() {
            return Err(PpError::new(
                PpErrorKind::Malformed,
                ".if without matching .endif",
                None,
            ));
        }
        out.push(".text".to_string());
        out.extend(self.literals.drain());
        Ok(out)
    }

    fn filter_line(&mut self, line: &str, out: &mut Vec<String>) -> Result<(), PpError> {
        let code = line.trim_start();
        if code.starts_with(self.comm) {
            if self.conditionals.emitting() {
                out.push(line.to_string());
            }
            return Ok(());
        }
        if directive_is(code, ".elseif") {
            return self.handle_elseif(rest_after(code, ".elseif"), line);
        }
        if directive_is(code, ".else") {
            return self.handle_else(line);
        }
        if directive_is(code, ".endif") {
            return self.handle_endif(line);
        }
        if let Some((variant, rest)) = split_if_directive(code) {
            let state = if self.eval_predicate(variant, rest, line)? {
                CondState::True
            } else {
                CondState::False
            };
            self.conditionals.push(state);
            return Ok(());
        }
        if self.conditionals.emitting() {
            out.push(line.to_string());
        }
        Ok(())
    }

    fn handle_elseif(&mut self, rest: &str, line: &str) -> Result<(), PpError> {
        if self.conditionals.is_empty() {
            return Err(PpError::new(
                PpErrorKind::Malformed,
                ".elseif without matching .if",
                Some(line),
            ));
        }
        let holds = self.eval_predicate("", rest, line)?;
        let Some(state) = self.conditionals.last_mut() else {
            return Err(PpError::new(
                PpErrorKind::Malformed,
                ".elseif without matching .if",
                Some(line),
            ));
        };
        *state = match *state {
            CondState::True => CondState::StickyFalse,
            CondState::False if holds => CondState::True,
            CondState::False => CondState::False,
            CondState::StickyFalse => CondState::StickyFalse,
        };
        Ok(())
    }

    fn handle_else(&mut self, line: &str) -> Result<(), PpError> {
        let Some(state) = self.conditionals.last_mut() else {
            return Err(PpError::new(
                PpErrorKind::Malformed,
                ".else without matching .if",
                Some(line),
            ));
        };
        *state = match *state {
            CondState::True => CondState::False,
            CondState::False => CondState::True,
            CondState::StickyFalse => CondState::StickyFalse,
        };
        Ok(())
    }

    fn handle_endif(&mut self, line: &str) -> Result<(), PpError> {
        if self.conditionals.pop().is_none() {
            return Err(PpError::new(
                PpErrorKind::Malformed,
                ".endif without matching .if",
                Some(line),
            ));
        }
        Ok(())
    }

    /// Truth of one `.if` variant. `.ife` is an alias of `.if`; anything
    /// else unrecognized is rejected rather than silently miscompiled.
    fn eval_predicate(&self, variant: &str, rest: &str, line: &str) -> Result<bool, PpError> {
        let arith = |text: &str| {
            eval_expr(text.trim())
                .map_err(|err| PpError::new(PpErrorKind::Expression, err.message(), Some(line)))
        };
        let value = match variant {
            "" | "e" => arith(rest)? != 0,
            "n" => arith(rest)? == 0,
            "b" => rest.split_whitespace().next().is_none(),
            "nb" => rest.split_whitespace().next().is_some(),
            "c" | "nc" => {
                let Some((left, right)) = rest.split_once(',') else {
                    return Err(PpError::new(
                        PpErrorKind::Malformed,
                        ".ifc requires two comma-separated operands",
                        Some(line),
                    ));
                };
                let equal = left.trim() == right.trim();
                if variant == "c" { equal } else { !equal }
            }
            "eq" => arith(rest)? == 0,
            "lt" => arith(rest)? < 0,
            "le" => arith(rest)? <= 0,
            "gt" => arith(rest)? > 0,
            "ge" => arith(rest)? >= 0,
            _ => {
                return Err(PpError::new(
                    PpErrorKind::Unsupported,
                    "Unknown conditional directive",
                    Some(line),
                ));
            }
        };
        Ok(value)
    }
}

/// Split a `.ifVARIANT EXPR` line into the variant letters and the operand.
fn split_if_directive(code: &str) -> Option<(&str, &str)> {
    let rest = code.strip_prefix(".if")?;
    let end = rest
        .bytes()
        .position(|b| !b.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    Some((&rest[..end], rest[end..].trim()))
}

fn rest_after<'a>(code: &'a str, name: &str) -> &'a str {
    code[name.len()..].trim()
}
