// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Repetition expansion and architecture-specific rewrites (pass 2).

use crate::core::arch::{spr_number, Arch};
use crate::core::error::{PpError, PpErrorKind};
use crate::core::eval::eval_expr;
use crate::core::text_utils::{directive_is, directive_rest, Cursor};

use super::Preprocessor;

/// One active repetition block being collected.
#[derive(Debug, Clone)]
pub(super) enum Repetition {
    Rept {
        count: i64,
        body: Vec<String>,
    },
    Irp {
        param: String,
        values: Vec<String>,
        body: Vec<String>,
    },
    Irpc {
        param: String,
        values: Vec<char>,
        body: Vec<String>,
    },
}

impl Repetition {
    fn body_mut(&mut self) -> &mut Vec<String> {
        match self {
            Repetition::Rept { body, .. }
            | Repetition::Irp { body, .. }
            | Repetition::Irpc { body, .. } => body,
        }
    }
}

impl Preprocessor {
    /// Pass 2 over the fully macro-expanded stream. The rewrites apply to
    /// every line, including lines that are then accumulated into a
    /// repetition body, so a literal inside `.rept` is interned exactly
    /// once and all emitted copies share its label.
    pub(super) fn rewrite(&mut self, lines: Vec<String>) -> Result<Vec<String>, PpError> {
        let mut out = Vec::new();
        for line in lines {
            self.rewrite_line(line, &mut out)?;
        }
        if self.repetition.is_some() {
            return Err(PpError::new(
                PpErrorKind::Malformed,
                ".rept or .irp without matching .endr",
                None,
            ));
        }
        Ok(out)
    }

    fn rewrite_line(&mut self, line: String, out: &mut Vec<String>) -> Result<(), PpError> {
        if line.trim_start().starts_with(self.comm) {
            // only the neutralized .ltorg marker drains here, never a
            // comment that merely mentions the directive in prose
            let drains = line
                .trim_start()
                .strip_prefix(self.comm)
                .is_some_and(|rest| rest.trim() == ".ltorg");
            if drains && self.repetition.is_some() {
                return Err(PpError::new(
                    PpErrorKind::Unsupported,
                    ".ltorg inside a repetition block is not supported",
                    Some(&line),
                ));
            }
            self.route(line, out)?;
            if drains {
                self.drain_literals(out)?;
            }
            return Ok(());
        }
        let mut line = line;
        if directive_is(&line, ".section")
            || directive_is(&line, ".text")
            || directive_is(&line, ".const_data")
        {
            self.sections.push(line.clone());
        } else if directive_is(&line, ".previous") {
            line = self.sections.previous()?;
        }
        if self.arch == Arch::Arm {
            if let Some(rewritten) = self.intern_ldr_literal(&line) {
                line = rewritten;
            }
        }
        if line.contains(".ltorg") {
            if self.repetition.is_some() {
                return Err(PpError::new(
                    PpErrorKind::Unsupported,
                    ".ltorg inside a repetition block is not supported",
                    Some(&line),
                ));
            }
            self.route(line, out)?;
            return self.drain_literals(out);
        }
        if self.arch == Arch::PowerPc {
            line = rewrite_reloc_suffix(&line, "@ha", "ha16");
            line = rewrite_reloc_suffix(&line, "@l", "lo16");
            if let Some(rewritten) = rewrite_spr_access(&line) {
                line = rewritten;
            }
        }
        if self.arch == Arch::Arm && self.fix_unreq {
            if let Some((lower, upper)) = duplicate_unreq(&line) {
                self.route(lower, out)?;
                self.route(upper, out)?;
                return Ok(());
            }
        }
        self.route(line, out)
    }

    /// Repetition dispatch: begin, accumulate, or materialize; anything
    /// else flows straight to the output.
    fn route(&mut self, line: String, out: &mut Vec<String>) -> Result<(), PpError> {
        let code = line.trim_start();
        if directive_is(code, ".rept") {
            self.begin_rept(directive_rest(code, ".rept"), &line)
        } else if directive_is(code, ".irpc") {
            self.begin_irpc(directive_rest(code, ".irpc"), &line)
        } else if directive_is(code, ".irp") {
            self.begin_irp(directive_rest(code, ".irp"), &line)
        } else if directive_is(code, ".endr") {
            self.end_repetition(out, &line)
        } else if let Some(repetition) = self.repetition.as_mut() {
            repetition.body_mut().push(line);
            Ok(())
        } else {
            out.push(line);
            Ok(())
        }
    }

    fn check_not_nested(&self, line: &str) -> Result<(), PpError> {
        if self.repetition.is_some() {
            return Err(PpError::new(
                PpErrorKind::Unsupported,
                "Nested repetition blocks are not supported",
                Some(line),
            ));
        }
        Ok(())
    }

    fn begin_rept(&mut self, rest: &str, line: &str) -> Result<(), PpError> {
        self.check_not_nested(line)?;
        let mut count_text = rest;
        let mut body = Vec::new();
        // a directive may trail the count on the same line; .endr may not
        if let Some(idx) = find_trailing_directive(rest) {
            body.push(rest[idx..].to_string());
            count_text = &rest[..idx];
        }
        let count = eval_expr(count_text.trim())
            .map_err(|err| PpError::new(PpErrorKind::Expression, err.message(), Some(line)))?;
        self.repetition = Some(Repetition::Rept {
            count: count.max(0),
            body,
        });
        Ok(())
    }

    fn begin_irp(&mut self, rest: &str, line: &str) -> Result<(), PpError> {
        self.check_not_nested(line)?;
        let (param, arglist) = split_iteration_param(rest, line)?;
        let values = arglist
            .replace(',', " ")
            .split_whitespace()
            .map(str::to_string)
            .collect();
        self.repetition = Some(Repetition::Irp {
            param,
            values,
            body: Vec::new(),
        });
        Ok(())
    }

    fn begin_irpc(&mut self, rest: &str, line: &str) -> Result<(), PpError> {
        self.check_not_nested(line)?;
        let (param, arglist) = split_iteration_param(rest, line)?;
        let values = arglist
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();
        self.repetition = Some(Repetition::Irpc {
            param,
            values,
            body: Vec::new(),
        });
        Ok(())
    }

    fn end_repetition(&mut self, out: &mut Vec<String>, line: &str) -> Result<(), PpError> {
        let Some(repetition) = self.repetition.take() else {
            return Err(PpError::new(
                PpErrorKind::Malformed,
                ".endr without matching .rept or .irp",
                Some(line),
            ));
        };
        match repetition {
            Repetition::Rept { count, body } => {
                for _ in 0..count {
                    out.extend(body.iter().cloned());
                }
            }
            Repetition::Irp {
                param,
                values,
                body,
            } => {
                for value in &values {
                    for body_line in &body {
                        out.push(substitute_iteration(body_line, &param, value));
                    }
                }
            }
            Repetition::Irpc {
                param,
                values,
                body,
            } => {
                for value in &values {
                    for body_line in &body {
                        out.push(substitute_iteration(body_line, &param, &value.to_string()));
                    }
                }
            }
        }
        Ok(())
    }

    fn drain_literals(&mut self, out: &mut Vec<String>) -> Result<(), PpError> {
        if !self.literals.has_pending() {
            return Ok(());
        }
        for entry in self.literals.drain() {
            self.route(entry, out)?;
        }
        Ok(())
    }

    /// Rewrite `ldr REG, =EXPR` to a literal-pool label reference.
    fn intern_ldr_literal(&mut self, line: &str) -> Option<String> {
        let bytes = line.as_bytes();
        let mut search = 0;
        while let Some(rel) = line[search..].find("ldr") {
            let idx = search + rel;
            search = idx + 1;
            let before_ok = idx == 0
                || !(bytes[idx - 1].is_ascii_alphanumeric() || bytes[idx - 1] == b'_');
            let mut pos = idx + 3;
            if !before_ok || !bytes.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
                continue;
            }
            while bytes.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
                pos += 1;
            }
            let reg_start = pos;
            while bytes
                .get(pos)
                .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
            {
                pos += 1;
            }
            if pos == reg_start {
                continue;
            }
            let reg_end = pos;
            while bytes.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
                pos += 1;
            }
            if bytes.get(pos) != Some(&b',') {
                continue;
            }
            pos += 1;
            while bytes.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
                pos += 1;
            }
            if bytes.get(pos) != Some(&b'=') {
                continue;
            }
            let expr = line[pos + 1..].trim();
            if expr.is_empty() {
                continue;
            }
            let label = self.literals.intern(expr);
            return Some(format!(
                "{}ldr {}, {}",
                &line[..idx],
                &line[reg_start..reg_end],
                label
            ));
        }
        None
    }
}

fn substitute_iteration(line: &str, param: &str, value: &str) -> String {
    line.replace(&format!("\\{param}"), value).replace("\\()", "")
}

/// First position of a `.directive` token trailing a repeat count.
fn find_trailing_directive(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    (0..bytes.len().saturating_sub(1)).find(|&i| {
        bytes[i] == b'.' && (bytes[i + 1].is_ascii_alphanumeric() || bytes[i + 1] == b'_')
    })
}

fn split_iteration_param(rest: &str, line: &str) -> Result<(String, String), PpError> {
    let mut cursor = Cursor::new(rest);
    cursor.skip_ws();
    let Some(param) = cursor.take_ident() else {
        return Err(PpError::new(
            PpErrorKind::Malformed,
            "Repetition parameter name is required",
            Some(line),
        ));
    };
    Ok((param, rest[cursor.pos()..].trim_start().to_string()))
}

/// Rewrite `, X@suffix` relocation operands into `, func(X)` calls.
fn rewrite_reloc_suffix(line: &str, suffix: &str, func: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    loop {
        let Some(idx) = rest.find(suffix) else {
            out.push_str(rest);
            return out;
        };
        let after = idx + suffix.len();
        let boundary = rest
            .as_bytes()
            .get(after)
            .is_none_or(|b| !b.is_ascii_alphanumeric() && *b != b'_');
        let operand = rest[..idx]
            .rfind(',')
            .map(|comma| (comma, rest[comma + 1..idx].trim()));
        match operand {
            Some((comma, operand))
                if boundary && !operand.is_empty() && !operand.contains(char::is_whitespace) =>
            {
                out.push_str(&rest[..comma + 1]);
                out.push(' ');
                out.push_str(func);
                out.push('(');
                out.push_str(operand);
                out.push(')');
            }
            _ => out.push_str(&rest[..after]),
        }
        rest = &rest[after..];
    }
}

/// Rewrite symbolic SPR access (`mfctr 3`, `mtvrsave 4`) into numbered
/// `mfspr`/`mtspr` forms. Operand order differs by direction: the SPR
/// number is the destination of `mtspr` and the source of `mfspr`.
fn rewrite_spr_access(line: &str) -> Option<String> {
    let code = line.trim_start();
    let indent = &line[..line.len() - code.len()];
    let (op, rest) = if let Some(rest) = code.strip_prefix("mt") {
        ("mt", rest)
    } else if let Some(rest) = code.strip_prefix("mf") {
        ("mf", rest)
    } else {
        return None;
    };
    let name_end = rest.find(char::is_whitespace)?;
    let number = spr_number(&rest[..name_end])?;
    let operand = rest[name_end..].trim();
    if operand.is_empty()
        || !operand
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        return None;
    }
    Some(match op {
        "mt" => format!("{indent}mtspr {number}, {operand}"),
        _ => format!("{indent}mfspr {operand}, {number}"),
    })
}

/// Emit `.unreq` for both name cases: legacy gas registers `.req` names in
/// both cases but `.unreq` removes only the one spelled.
fn duplicate_unreq(line: &str) -> Option<(String, String)> {
    let code = line.trim_start();
    if !directive_is(code, ".unreq") {
        return None;
    }
    let indent = &line[..line.len() - code.len()];
    let operand = directive_rest(code, ".unreq").trim();
    if operand.is_empty() {
        return None;
    }
    Some((
        format!("{indent}.unreq {}", operand.to_ascii_lowercase()),
        format!("{indent}.unreq {}", operand.to_ascii_uppercase()),
    ))
}
