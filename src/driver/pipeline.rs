// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Subprocess plumbing: expand the input, transform it, feed the assembler.
//!
//! The same command line serves both ends of the pipe. Stripped of `-c` and
//! with its output redirected, it expands the input (`-S` for C sources,
//! `-E` for preprocessed assembly); unchanged except for the input argument
//! becoming `-`, it assembles the transformed stream from stdin.

use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};

use crate::core::error::{PpError, PpErrorKind};
use crate::core::preprocess::Preprocessor;

use super::cli::DriverConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    /// `.c`: compile to assembly with `-S`.
    CSource,
    /// `.S`: run through the C preprocessor with `-E`.
    CppAsm,
    /// `.s`: already preprocessed, read from disk.
    PlainAsm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct PipelinePlan {
    pub(super) input_path: String,
    pub(super) expand_cmd: Option<Vec<String>>,
    pub(super) assemble_cmd: Vec<String>,
}

/// Derive the expand and assemble command lines from the driver's
/// assembler invocation.
pub(super) fn plan_commands(cmd: &[String]) -> Result<PipelinePlan, PpError> {
    let Some(input_path) = cmd
        .iter()
        .rev()
        .find(|arg| arg.ends_with(".c") || arg.ends_with(".s") || arg.ends_with(".S"))
        .cloned()
    else {
        return Err(PpError::new(
            PpErrorKind::Cli,
            "No .c/.s/.S input file in assembler command",
            None,
        ));
    };
    let kind = if input_path.ends_with(".c") {
        InputKind::CSource
    } else if input_path.ends_with(".S") {
        InputKind::CppAsm
    } else {
        InputKind::PlainAsm
    };

    let expand_cmd = match kind {
        InputKind::PlainAsm => None,
        _ => {
            let mut expand = Vec::with_capacity(cmd.len() + 2);
            let mut iter = cmd.iter();
            while let Some(arg) = iter.next() {
                if arg == "-c" {
                    continue;
                }
                if arg == "-o" {
                    iter.next();
                    continue;
                }
                expand.push(arg.clone());
            }
            expand.push("-o".to_string());
            expand.push("-".to_string());
            expand.push(
                match kind {
                    InputKind::CSource => "-S",
                    _ => "-E",
                }
                .to_string(),
            );
            Some(expand)
        }
    };

    let assemble_cmd = cmd
        .iter()
        .map(|arg| {
            if *arg == input_path {
                "-".to_string()
            } else {
                arg.clone()
            }
        })
        .collect();

    Ok(PipelinePlan {
        input_path,
        expand_cmd,
        assemble_cmd,
    })
}

/// Run the full pipeline for one driver invocation.
pub(super) fn run(config: &DriverConfig) -> Result<(), PpError> {
    let plan = plan_commands(&config.assembler_cmd)?;
    let lines = read_input_lines(&plan, config.verbose)?;

    let mut preprocessor = Preprocessor::new(config.arch, config.fix_unreq);
    let output = preprocessor.process(lines)?;

    if config.preprocess_only {
        return write_stdout(&output);
    }
    feed_assembler(&plan.assemble_cmd, &output, config.verbose)
}

fn read_input_lines(plan: &PipelinePlan, verbose: bool) -> Result<Vec<String>, PpError> {
    let Some(expand_cmd) = &plan.expand_cmd else {
        let text = fs::read_to_string(&plan.input_path).map_err(|err| {
            PpError::new(
                PpErrorKind::Io,
                "Error reading input file",
                Some(&format!("{}: {err}", plan.input_path)),
            )
        })?;
        return Ok(text.lines().map(str::to_string).collect());
    };

    if verbose {
        eprintln!("gaspre: expanding with: {}", expand_cmd.join(" "));
    }
    let mut child = spawn_command(expand_cmd, Stdio::inherit(), Stdio::piped())?;
    let Some(stdout) = child.stdout.take() else {
        return Err(PpError::new(
            PpErrorKind::Downstream,
            "Expand command stdout unavailable",
            expand_cmd.first().map(String::as_str),
        ));
    };
    let mut lines = Vec::new();
    for line in BufReader::new(stdout).lines() {
        let line = line.map_err(|err| {
            PpError::new(
                PpErrorKind::Downstream,
                "Error reading expand command output",
                Some(&err.to_string()),
            )
        })?;
        lines.push(line);
    }
    wait_command(child, expand_cmd)?;
    Ok(lines)
}

fn write_stdout(lines: &[String]) -> Result<(), PpError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for line in lines {
        writeln!(handle, "{line}").map_err(|err| {
            PpError::new(PpErrorKind::Io, "Error writing output", Some(&err.to_string()))
        })?;
    }
    Ok(())
}

fn feed_assembler(cmd: &[String], lines: &[String], verbose: bool) -> Result<(), PpError> {
    if verbose {
        eprintln!("gaspre: assembling with: {}", cmd.join(" "));
    }
    let mut child = spawn_command(cmd, Stdio::piped(), Stdio::inherit())?;
    let Some(mut stdin) = child.stdin.take() else {
        return Err(PpError::new(
            PpErrorKind::Downstream,
            "Assembler stdin unavailable",
            cmd.first().map(String::as_str),
        ));
    };
    for line in lines {
        if let Err(err) = writeln!(stdin, "{line}") {
            // broken pipe: the assembler died while we were writing
            drop(stdin);
            let _ = child.wait();
            return Err(PpError::new(
                PpErrorKind::Downstream,
                "Error writing to assembler",
                Some(&err.to_string()),
            ));
        }
    }
    // close the pipe so the assembler sees end of input
    drop(stdin);
    wait_command(child, cmd)
}

fn spawn_command(cmd: &[String], stdin: Stdio, stdout: Stdio) -> Result<Child, PpError> {
    let Some((program, args)) = cmd.split_first() else {
        return Err(PpError::new(PpErrorKind::Cli, "Empty command", None));
    };
    Command::new(program)
        .args(args)
        .stdin(stdin)
        .stdout(stdout)
        .spawn()
        .map_err(|err| {
            PpError::new(
                PpErrorKind::Downstream,
                "Failed to spawn command",
                Some(&format!("{program}: {err}")),
            )
        })
}

fn wait_command(mut child: Child, cmd: &[String]) -> Result<(), PpError> {
    let program = cmd.first().map(String::as_str).unwrap_or("");
    let status = child.wait().map_err(|err| {
        PpError::new(
            PpErrorKind::Downstream,
            "Failed to wait for command",
            Some(&format!("{program}: {err}")),
        )
    })?;
    if !status.success() {
        return Err(PpError::new(
            PpErrorKind::Downstream,
            "Command failed",
            Some(&format!("{program} ({status})")),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn plan_for_preprocessed_asm_appends_dash_e() {
        let plan = plan_commands(&cmd(&["as", "-arch", "arm", "-c", "-o", "out.o", "in.S"]))
            .expect("plan");
        assert_eq!(plan.input_path, "in.S");
        assert_eq!(
            plan.expand_cmd,
            Some(cmd(&["as", "-arch", "arm", "in.S", "-o", "-", "-E"]))
        );
        assert_eq!(
            plan.assemble_cmd,
            cmd(&["as", "-arch", "arm", "-c", "-o", "out.o", "-"])
        );
    }

    #[test]
    fn plan_for_c_source_appends_dash_s() {
        let plan = plan_commands(&cmd(&["gcc", "-c", "-o", "out.o", "in.c"])).expect("plan");
        assert_eq!(
            plan.expand_cmd,
            Some(cmd(&["gcc", "in.c", "-o", "-", "-S"]))
        );
        assert_eq!(plan.assemble_cmd, cmd(&["gcc", "-c", "-o", "out.o", "-"]));
    }

    #[test]
    fn plan_for_plain_asm_reads_the_file_directly() {
        let plan = plan_commands(&cmd(&["as", "-o", "out.o", "in.s"])).expect("plan");
        assert_eq!(plan.expand_cmd, None);
        assert_eq!(plan.assemble_cmd, cmd(&["as", "-o", "out.o", "-"]));
    }

    #[test]
    fn plan_requires_a_recognized_input_file() {
        let err = plan_commands(&cmd(&["as", "-o", "out.o"])).expect_err("should fail");
        assert_eq!(err.kind(), PpErrorKind::Cli);
        assert!(err.to_string().contains("input file"));
    }

    #[test]
    fn plan_uses_the_last_input_looking_argument() {
        let plan = plan_commands(&cmd(&["as", "ignore.s", "real.S"])).expect("plan");
        assert_eq!(plan.input_path, "real.S");
    }
}
