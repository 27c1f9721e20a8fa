// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Outer driver: CLI validation, architecture selection, and the
//! expand-transform-assemble pipeline.

pub mod cli;
mod pipeline;

use serde_json::json;

use crate::core::error::PpError;

use cli::{validate_cli, Cli};

pub use cli::VERSION;

/// Run the driver with parsed command-line arguments.
pub fn run_with_cli(cli: &Cli) -> Result<(), PpError> {
    let config = validate_cli(cli)?;
    pipeline::run(&config)
}

pub fn capabilities_report() -> String {
    let lines = [
        "gaspre-capabilities-v1".to_string(),
        format!("version={VERSION}"),
        "feature=macro-expansion".to_string(),
        "feature=repetition-blocks".to_string(),
        "feature=conditional-assembly".to_string(),
        "feature=literal-pool".to_string(),
        "feature=section-stack".to_string(),
        "arch=arm".to_string(),
        "arch=ppc".to_string(),
    ];
    format!("{}\n", lines.join("\n"))
}

pub fn capabilities_report_json() -> String {
    json!({
        "schema": "gaspre-capabilities-v1",
        "version": VERSION,
        "features": [
            "macro-expansion",
            "repetition-blocks",
            "conditional-assembly",
            "literal-pool",
            "section-stack",
        ],
        "archs": ["arm", "ppc"],
    })
    .to_string()
}
