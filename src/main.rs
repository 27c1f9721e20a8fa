// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for gaspre.

use clap::Parser;
use serde_json::json;

use gaspre::driver::cli::{Cli, OutputFormat};

fn main() {
    let cli = Cli::parse();
    if cli.print_capabilities {
        match cli.format {
            OutputFormat::Json => println!("{}", gaspre::driver::capabilities_report_json()),
            OutputFormat::Text => print!("{}", gaspre::driver::capabilities_report()),
        }
        return;
    }
    if let Err(err) = gaspre::driver::run_with_cli(&cli) {
        match cli.format {
            OutputFormat::Json => eprintln!(
                "{}",
                json!({
                    "error": {
                        "code": err.code(),
                        "message": err.message(),
                    },
                })
            ),
            OutputFormat::Text => eprintln!("gaspre: error[{}]: {err}", err.code()),
        }
        std::process::exit(1);
    }
}
