// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Target architecture selection and architecture-specific tables.

use crate::core::error::{PpError, PpErrorKind};

/// Architecture of the downstream assembler invocation.
///
/// Selects the comment character and enables the architecture-specific line
/// rewrites: the `ldr Rn, =expr` literal pool and `.unreq` duplication on
/// Arm, the `@l`/`@ha` relocation functions and symbolic SPR access on
/// PowerPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Arm,
    PowerPc,
}

impl Arch {
    pub fn comment_char(self) -> char {
        match self {
            Arch::Arm => '@',
            Arch::PowerPc => '#',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Arch::Arm => "arm",
            Arch::PowerPc => "ppc",
        }
    }

    /// Map an `-arch` value (arm, armv6, ppc, ppc7400, powerpc, ...).
    pub fn from_name(name: &str) -> Option<Arch> {
        let name = name.to_ascii_lowercase();
        if name.starts_with("arm") {
            Some(Arch::Arm)
        } else if name.starts_with("ppc") || name == "powerpc" {
            Some(Arch::PowerPc)
        } else {
            None
        }
    }

    /// Scan an assembler command line for `-arch <value>`.
    pub fn detect_from_args(args: &[String]) -> Result<Arch, PpError> {
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if arg != "-arch" {
                continue;
            }
            let Some(value) = iter.next() else {
                return Err(PpError::new(
                    PpErrorKind::Cli,
                    "-arch without a value in assembler command",
                    None,
                ));
            };
            return Arch::from_name(value).ok_or_else(|| {
                PpError::new(PpErrorKind::Unsupported, "Unsupported architecture", Some(value))
            });
        }
        Err(PpError::new(
            PpErrorKind::Unsupported,
            "Cannot determine target architecture; pass --arch or include -arch",
            None,
        ))
    }
}

/// PowerPC special-purpose registers addressed by symbolic name in
/// `mfNAME`/`mtNAME` forms.
pub fn spr_number(name: &str) -> Option<u32> {
    match name {
        "ctr" => Some(9),
        "vrsave" => Some(256),
        _ => None,
    }
}
