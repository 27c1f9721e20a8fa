// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::env;

use clap::{ArgAction, Parser, ValueEnum};

use crate::core::arch::Arch;
use crate::core::error::{PpError, PpErrorKind};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "Translates GNU assembler (gas) syntax into the dialect accepted by Apple's
legacy assembler.

The trailing words form the downstream assembler invocation, e.g.
`gaspre -- as -arch arm -o out.o in.S` or a full `gcc -c` command line.
The input file is located inside that command: .c inputs are compiled to
assembly first, .S inputs are run through the C preprocessor, and .s
inputs are read directly. The transformed stream is piped to the
assembler's standard input.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArchChoice {
    Arm,
    Ppc,
}

impl ArchChoice {
    pub fn to_arch(self) -> Arch {
        match self {
            ArchChoice::Arm => Arch::Arm,
            ArchChoice::Ppc => Arch::PowerPc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "gaspre",
    version = VERSION,
    about = "gas-to-Apple assembler dialect preprocessor",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        long = "arch",
        value_enum,
        long_help = "Force the target architecture instead of autodetecting it from the assembler command's -arch flag."
    )]
    pub arch: Option<ArchChoice>,
    #[arg(
        long = "fix-unreq",
        action = ArgAction::SetTrue,
        conflicts_with = "no_fix_unreq",
        long_help = "Also emit an uppercase copy of every .unreq operand. Old gas versions register .req names in both cases but .unreq removes only the spelling given. Default: enabled on Apple hosts."
    )]
    pub fix_unreq: bool,
    #[arg(
        long = "no-fix-unreq",
        action = ArgAction::SetTrue,
        long_help = "Disable the .unreq case duplication."
    )]
    pub no_fix_unreq: bool,
    #[arg(
        short = 'E',
        long = "preprocess-only",
        action = ArgAction::SetTrue,
        long_help = "Write the transformed stream to stdout and do not spawn the assembler."
    )]
    pub preprocess_only: bool,
    #[arg(
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        long_help = "Select diagnostic output format. text is default; json emits one machine-readable object per failure."
    )]
    pub format: OutputFormat,
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::SetTrue,
        long_help = "Echo spawned command lines to stderr."
    )]
    pub verbose: bool,
    #[arg(
        long = "print-capabilities",
        action = ArgAction::SetTrue,
        long_help = "Print deterministic capability metadata and exit."
    )]
    pub print_capabilities: bool,
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        long_help = "Downstream assembler command line, input file included."
    )]
    pub assembler_cmd: Vec<String>,
}

/// Validated driver configuration.
#[derive(Debug)]
pub struct DriverConfig {
    pub arch: Arch,
    pub fix_unreq: bool,
    pub preprocess_only: bool,
    pub output_format: OutputFormat,
    pub verbose: bool,
    pub assembler_cmd: Vec<String>,
}

fn parse_env_bool(var_name: &str) -> Result<Option<bool>, PpError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_ascii_lowercase();
    let parsed = match value.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        "" => None,
        _ => {
            return Err(PpError::new(
                PpErrorKind::Cli,
                "Invalid boolean value",
                Some(&format!("{var_name}={value}")),
            ));
        }
    };
    Ok(parsed)
}

fn parse_env_string(var_name: &str) -> Result<Option<String>, PpError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_string();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(value))
}

/// Validate CLI arguments against their environment fallbacks and return
/// the driver configuration. CLI values win over `GASPRE_*` variables.
pub fn validate_cli(cli: &Cli) -> Result<DriverConfig, PpError> {
    let env_arch = parse_env_string("GASPRE_ARCH")?;
    let env_fix_unreq = parse_env_bool("GASPRE_FIX_UNREQ")?;
    let env_verbose = parse_env_bool("GASPRE_VERBOSE")?;

    if cli.assembler_cmd.is_empty() {
        return Err(PpError::new(
            PpErrorKind::Cli,
            "No assembler command given",
            None,
        ));
    }

    let arch = if let Some(choice) = cli.arch {
        choice.to_arch()
    } else if let Some(name) = env_arch.as_deref() {
        Arch::from_name(name).ok_or_else(|| {
            PpError::new(PpErrorKind::Cli, "Invalid GASPRE_ARCH value", Some(name))
        })?
    } else {
        Arch::detect_from_args(&cli.assembler_cmd)?
    };

    let fix_unreq = if cli.fix_unreq {
        true
    } else if cli.no_fix_unreq {
        false
    } else {
        env_fix_unreq.unwrap_or(cfg!(target_os = "macos"))
    };

    let verbose = if cli.verbose {
        true
    } else {
        env_verbose.unwrap_or(false)
    };

    Ok(DriverConfig {
        arch,
        fix_unreq,
        preprocess_only: cli.preprocess_only,
        output_format: cli.format,
        verbose,
        assembler_cmd: cli.assembler_cmd.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::ffi::OsString;
    use std::sync::{Mutex, OnceLock};

    fn with_env_vars(vars: &[(&str, Option<&str>)], test: impl FnOnce()) {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let _guard = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .expect("lock env mutex");

        let saved: Vec<(String, Option<OsString>)> = vars
            .iter()
            .map(|(key, _)| (key.to_string(), env::var_os(key)))
            .collect();

        for (key, value) in vars {
            match value {
                Some(value) => {
                    // SAFETY: tests serialize env access via ENV_LOCK.
                    unsafe { env::set_var(key, value) }
                }
                None => {
                    // SAFETY: tests serialize env access via ENV_LOCK.
                    unsafe { env::remove_var(key) }
                }
            }
        }

        test();

        for (key, value) in saved {
            match value {
                Some(value) => {
                    // SAFETY: tests serialize env access via ENV_LOCK.
                    unsafe { env::set_var(key, value) }
                }
                None => {
                    // SAFETY: tests serialize env access via ENV_LOCK.
                    unsafe { env::remove_var(key) }
                }
            }
        }
    }

    #[test]
    fn cli_parses_options_and_assembler_command() {
        let cli = Cli::parse_from([
            "gaspre",
            "--arch",
            "arm",
            "--fix-unreq",
            "-E",
            "--format",
            "json",
            "-v",
            "as",
            "-arch",
            "arm",
            "-o",
            "out.o",
            "in.S",
        ]);
        assert_eq!(cli.arch, Some(ArchChoice::Arm));
        assert!(cli.fix_unreq);
        assert!(cli.preprocess_only);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.verbose);
        assert_eq!(
            cli.assembler_cmd,
            vec!["as", "-arch", "arm", "-o", "out.o", "in.S"]
        );
    }

    #[test]
    fn cli_keeps_hyphen_values_in_assembler_command() {
        let cli = Cli::parse_from(["gaspre", "as", "-arch", "ppc", "-o", "out.o", "in.S"]);
        assert_eq!(cli.arch, None);
        assert_eq!(
            cli.assembler_cmd,
            vec!["as", "-arch", "ppc", "-o", "out.o", "in.S"]
        );
    }

    #[test]
    fn validate_cli_rejects_empty_assembler_command() {
        with_env_vars(&[("GASPRE_ARCH", None)], || {
            let cli = Cli::parse_from(["gaspre", "--arch", "arm"]);
            let err = validate_cli(&cli).expect_err("empty command should fail");
            assert_eq!(err.to_string(), "No assembler command given");
        });
    }

    #[test]
    fn validate_cli_autodetects_arch_from_assembler_command() {
        with_env_vars(&[("GASPRE_ARCH", None), ("GASPRE_FIX_UNREQ", None)], || {
            let cli = Cli::parse_from(["gaspre", "as", "-arch", "ppc", "-o", "o.o", "in.S"]);
            let config = validate_cli(&cli).expect("validate cli");
            assert_eq!(config.arch, Arch::PowerPc);
        });
    }

    #[test]
    fn validate_cli_arch_flag_overrides_detection() {
        with_env_vars(&[("GASPRE_ARCH", None)], || {
            let cli = Cli::parse_from([
                "gaspre", "--arch", "arm", "as", "-arch", "ppc", "-o", "o.o", "in.S",
            ]);
            let config = validate_cli(&cli).expect("validate cli");
            assert_eq!(config.arch, Arch::Arm);
        });
    }

    #[test]
    fn validate_cli_applies_env_defaults_when_cli_not_set() {
        with_env_vars(
            &[
                ("GASPRE_ARCH", Some("ppc")),
                ("GASPRE_FIX_UNREQ", Some("true")),
                ("GASPRE_VERBOSE", Some("1")),
            ],
            || {
                let cli = Cli::parse_from(["gaspre", "as", "-o", "o.o", "in.S"]);
                let config = validate_cli(&cli).expect("validate cli");
                assert_eq!(config.arch, Arch::PowerPc);
                assert!(config.fix_unreq);
                assert!(config.verbose);
            },
        );
    }

    #[test]
    fn validate_cli_flags_override_env_values() {
        with_env_vars(
            &[
                ("GASPRE_ARCH", Some("ppc")),
                ("GASPRE_FIX_UNREQ", Some("true")),
            ],
            || {
                let cli = Cli::parse_from([
                    "gaspre",
                    "--arch",
                    "arm",
                    "--no-fix-unreq",
                    "as",
                    "-o",
                    "o.o",
                    "in.S",
                ]);
                let config = validate_cli(&cli).expect("validate cli");
                assert_eq!(config.arch, Arch::Arm);
                assert!(!config.fix_unreq);
            },
        );
    }

    #[test]
    fn validate_cli_rejects_invalid_env_boolean_value() {
        with_env_vars(&[("GASPRE_FIX_UNREQ", Some("maybe")), ("GASPRE_ARCH", Some("arm"))], || {
            let cli = Cli::parse_from(["gaspre", "as", "in.S"]);
            let err = validate_cli(&cli).expect_err("invalid env bool should fail");
            assert!(err.to_string().contains("Invalid boolean value"));
        });
    }

    #[test]
    fn validate_cli_rejects_invalid_env_arch_value() {
        with_env_vars(&[("GASPRE_ARCH", Some("i386"))], || {
            let cli = Cli::parse_from(["gaspre", "as", "in.S"]);
            let err = validate_cli(&cli).expect_err("invalid env arch should fail");
            assert_eq!(err.to_string(), "Invalid GASPRE_ARCH value: i386");
        });
    }
}
