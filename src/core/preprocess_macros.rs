// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Macro collection and recursive expansion (pass 1b).

use std::collections::{HashMap, VecDeque};

use crate::core::error::{PpError, PpErrorKind};
use crate::core::text_utils::{find_directive, is_full_comment, is_ident_char, Cursor};

use super::{Preprocessor, MAX_EXPANSION_DEPTH};

/// One formal macro parameter.
#[derive(Debug, Clone)]
pub(super) struct MacroParam {
    pub(super) name: String,
    pub(super) default: Option<String>,
    pub(super) vararg: bool,
}

/// A collected `.macro` definition.
///
/// The body holds raw lines, including any nested `.macro`/`.endm` text,
/// which is re-parsed when the outer macro expands.
#[derive(Debug, Clone, Default)]
pub(super) struct MacroDef {
    pub(super) params: Vec<MacroParam>,
    pub(super) body: Vec<String>,
}

impl Preprocessor {
    /// Macro engine entry point: collect definitions and expand
    /// invocations. Expanded body lines are pushed onto the front of a
    /// work queue so recursive expansions stay in source order without
    /// unbounded call recursion.
    pub(super) fn feed(&mut self, line: String) -> Result<(), PpError> {
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((line, 0));
        while let Some((line, depth)) = queue.pop_front() {
            self.feed_one(line, depth, &mut queue)?;
        }
        Ok(())
    }

    fn feed_one(
        &mut self,
        line: String,
        depth: usize,
        queue: &mut VecDeque<(String, usize)>,
    ) -> Result<(), PpError> {
        if is_full_comment(&line, self.comm) {
            if self.macro_level > 0 {
                self.macro_body_push(line);
            } else {
                self.expanded.push(line);
            }
            return Ok(());
        }
        if let Some(idx) = find_directive(&line, ".macro") {
            self.macro_level += 1;
            if self.macro_level > 1 {
                if self.current_macro.is_none() {
                    return Err(PpError::new(
                        PpErrorKind::Malformed,
                        "Nested .macro without an enclosing definition",
                        Some(&line),
                    ));
                }
                self.macro_body_push(line);
            } else {
                self.begin_macro(idx, &line)?;
            }
            return Ok(());
        }
        if find_directive(&line, ".endm").is_some() {
            if self.macro_level == 0 {
                return Err(PpError::new(
                    PpErrorKind::Malformed,
                    ".endm without matching .macro",
                    Some(&line),
                ));
            }
            self.macro_level -= 1;
            if self.macro_level == 0 {
                self.current_macro = None;
            } else {
                self.macro_body_push(line);
            }
            return Ok(());
        }
        if self.macro_level > 0 {
            self.macro_body_push(line);
            return Ok(());
        }
        self.expand_or_forward(line, depth, queue)
    }

    fn macro_body_push(&mut self, line: String) {
        if let Some(name) = &self.current_macro {
            if let Some(def) = self.macros.get_mut(name) {
                def.body.push(line);
            }
        }
    }

    fn begin_macro(&mut self, directive_idx: usize, line: &str) -> Result<(), PpError> {
        let rest = line[directive_idx + ".macro".len()..].trim();
        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or("");
        if name.is_empty() {
            return Err(PpError::new(
                PpErrorKind::Malformed,
                "Macro name is required after .macro",
                Some(line),
            ));
        }
        let params = parse_macro_params(parts.next().unwrap_or(""), line)?;
        self.current_macro = Some(name.to_string());
        self.macros.insert(
            name.to_string(),
            MacroDef {
                params,
                body: Vec::new(),
            },
        );
        Ok(())
    }

    fn expand_or_forward(
        &mut self,
        line: String,
        depth: usize,
        queue: &mut VecDeque<(String, usize)>,
    ) -> Result<(), PpError> {
        if let Some(idx) = find_directive(&line, ".purgem") {
            let name = line[idx + ".purgem".len()..].trim();
            self.macros.remove(name);
            return Ok(());
        }
        let Some((label, opcode, rest)) = split_invocation(&line) else {
            self.expanded.push(line);
            return Ok(());
        };
        let Some(def) = self.macros.get(opcode) else {
            self.expanded.push(line);
            return Ok(());
        };
        if depth >= MAX_EXPANSION_DEPTH {
            return Err(PpError::new(
                PpErrorKind::Malformed,
                "Macro expansion exceeded maximum depth",
                Some(&line),
            ));
        }
        let def = def.clone();
        let (args, separators) = split_arguments(rest);
        let replacements = build_substitutions(&def, opcode, &args, &separators)?;
        let plan = substitution_plan(&replacements);
        self.expanded.push(label.to_string());
        for body_line in def.body.iter().rev() {
            queue.push_front((substitute_line(body_line, &plan), depth + 1));
        }
        Ok(())
    }
}

pub(super) fn parse_macro_params(text: &str, line: &str) -> Result<Vec<MacroParam>, PpError> {
    let flattened = text.replace(',', " ");
    let mut params = Vec::new();
    for spec in flattened.split_whitespace() {
        let (name_part, default) = match spec.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (spec, None),
        };
        let (name, vararg) = match name_part.strip_suffix(":vararg") {
            Some(stripped) => (stripped, true),
            None => (name_part, false),
        };
        if name.is_empty() {
            return Err(PpError::new(
                PpErrorKind::Malformed,
                "Macro parameter name cannot be empty",
                Some(line),
            ));
        }
        params.push(MacroParam {
            name: name.to_string(),
            default,
            vararg,
        });
    }
    Ok(params)
}

/// Split a line into `[LABEL:] OPCODE REST`. Returns None when no opcode
/// token is present.
pub(super) fn split_invocation(line: &str) -> Option<(&str, &str, &str)> {
    let mut cursor = Cursor::new(line);
    cursor.skip_ws();
    let first_start = cursor.pos();
    while cursor.peek().is_some_and(|b| !b.is_ascii_whitespace()) {
        cursor.next();
    }
    let first = &line[first_start..cursor.pos()];
    let (label, opcode_from) = match first.rfind(':') {
        Some(idx) => (
            &line[first_start..first_start + idx + 1],
            first_start + idx + 1,
        ),
        None => (&line[first_start..first_start], first_start),
    };
    let tail = &line[opcode_from..];
    let mut cursor = Cursor::new(tail);
    cursor.skip_ws();
    let opcode_start = cursor.pos();
    while cursor.peek().is_some_and(is_ident_char) {
        cursor.next();
    }
    if cursor.pos() == opcode_start {
        return None;
    }
    let opcode = &tail[opcode_start..cursor.pos()];
    let rest = tail[cursor.pos()..].trim();
    Some((label, opcode, rest))
}

/// Split raw invocation arguments. Commas are significant because adjacent
/// commas denote a blank positional argument; the separator preceding each
/// token is recorded for vararg concatenation.
pub(super) fn split_arguments(rest: &str) -> (Vec<String>, Vec<String>) {
    let mut groups: Vec<&str> = rest.split(',').collect();
    while groups.last() == Some(&"") {
        groups.pop();
    }
    let mut args = Vec::new();
    let mut separators = Vec::new();
    let mut comma_required = false;
    for group in groups {
        let group = collapse_sign_spacing(group);
        let tokens: Vec<&str> = group.split_whitespace().collect();
        if tokens.is_empty() {
            args.push(String::new());
            separators.push(String::new());
        } else {
            for token in tokens {
                args.push(token.to_string());
                separators.push(if comma_required {
                    ", ".to_string()
                } else {
                    String::new()
                });
                comma_required = false;
            }
        }
        comma_required = true;
    }
    (args, separators)
}

/// Collapse whitespace around `+` and `-` so expressions stay one token.
fn collapse_sign_spacing(group: &str) -> String {
    let mut out = String::with_capacity(group.len());
    let mut iter = group.chars().peekable();
    while let Some(c) = iter.next() {
        if c == '+' || c == '-' {
            while out.ends_with([' ', '\t']) {
                out.pop();
            }
            out.push(c);
            while iter.peek().is_some_and(|n| n.is_whitespace()) {
                iter.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Build the name-to-value substitution map: defaults first, then
/// positionals, `name=value` overrides, and vararg overflow. Mixing named
/// and positional arguments keeps last-write-wins semantics.
pub(super) fn build_substitutions(
    def: &MacroDef,
    name: &str,
    args: &[String],
    separators: &[String],
) -> Result<HashMap<String, String>, PpError> {
    let mut replacements = HashMap::new();
    for param in &def.params {
        if let Some(default) = &param.default {
            replacements.insert(param.name.clone(), default.clone());
        }
    }
    for (i, arg) in args.iter().enumerate() {
        if let Some((key, value)) = arg.split_once('=') {
            replacements.insert(key.to_string(), value.to_string());
        } else if i >= def.params.len() {
            let Some(last) = def.params.last().filter(|param| param.vararg) else {
                return Err(PpError::new(
                    PpErrorKind::Malformed,
                    "Too many arguments to macro",
                    Some(name),
                ));
            };
            let entry: &mut String = replacements.entry(last.name.clone()).or_default();
            entry.push_str(&separators[i]);
            entry.push_str(arg);
        } else {
            replacements.insert(def.params[i].name.clone(), arg.clone());
        }
    }
    Ok(replacements)
}

/// Order replacements longest name first so a parameter that is a prefix of
/// another never clobbers it.
pub(super) fn substitution_plan(replacements: &HashMap<String, String>) -> Vec<(String, &str)> {
    let mut keys: Vec<&String> = replacements.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    keys.into_iter()
        .map(|key| (format!("\\{key}"), replacements[key].as_str()))
        .collect()
}

pub(super) fn substitute_line(line: &str, plan: &[(String, &str)]) -> String {
    let mut out = line.to_string();
    for (pattern, value) in plan {
        if out.contains(pattern.as_str()) {
            out = out.replace(pattern.as_str(), value);
        }
    }
    out.replace("\\()", "")
}
