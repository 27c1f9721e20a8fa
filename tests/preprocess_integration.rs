// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! End-to-end preprocessing scenarios through the public library API.

use gaspre::core::arch::Arch;
use gaspre::core::preprocess::Preprocessor;

fn run(arch: Arch, fix_unreq: bool, input: &str) -> Vec<String> {
    let mut preprocessor = Preprocessor::new(arch, fix_unreq);
    preprocessor
        .process(input.lines().map(str::to_string))
        .expect("preprocess")
}

fn run_arm(input: &str) -> Vec<String> {
    run(Arch::Arm, false, input)
}

fn trimmed(out: &[String]) -> Vec<String> {
    out.iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

#[test]
fn macro_with_three_arguments_expands_to_one_instruction() {
    let out = run_arm(".macro add3 a,b,c\n add \\a, \\b, \\c\n.endm\nadd3 r0,r1,r2\n");
    let adds: Vec<String> = trimmed(&out)
        .into_iter()
        .filter(|line| line.starts_with("add "))
        .collect();
    assert_eq!(adds, ["add r0, r1, r2"]);
}

#[test]
fn rept_emits_three_nops_in_order() {
    let out = run_arm(".rept 3\nnop\n.endr\n");
    assert_eq!(out.iter().filter(|line| line.trim() == "nop").count(), 3);
}

#[test]
fn irp_emits_one_mov_per_register() {
    let out = run_arm(".irp reg, r0 r1 r2\nmov \\reg, #0\n.endr\n");
    let movs: Vec<String> = trimmed(&out)
        .into_iter()
        .filter(|line| line.starts_with("mov"))
        .collect();
    assert_eq!(movs, ["mov r0, #0", "mov r1, #0", "mov r2, #0"]);
}

#[test]
fn equal_literals_share_a_pool_entry() {
    let out = run_arm("ldr r0, =0xdeadbeef\nldr r1, =0xdeadbeef\n.ltorg\n");
    assert!(out.iter().any(|line| line.trim() == "ldr r0, .Literal_0"));
    assert!(out.iter().any(|line| line.trim() == "ldr r1, .Literal_0"));
    assert_eq!(
        out.iter().filter(|line| line.trim() == ".Literal_0:").count(),
        1
    );
    let label_idx = out
        .iter()
        .position(|line| line.trim() == ".Literal_0:")
        .expect("pool label");
    assert_eq!(out[label_idx + 1].trim(), ".word 0xdeadbeef");
}

#[test]
fn literal_counter_spans_ltorg_drains() {
    let out = run_arm("ldr r0, =1\n.ltorg\nldr r1, =2\n");
    assert!(out.iter().any(|line| line.trim() == "ldr r0, .Literal_0"));
    assert!(out.iter().any(|line| line.trim() == "ldr r1, .Literal_1"));
    // the tail flush emits only the entry the explicit .ltorg did not cover
    assert_eq!(
        out.iter().filter(|line| line.trim() == ".Literal_0:").count(),
        1
    );
    assert_eq!(
        out.iter().filter(|line| line.trim() == ".Literal_1:").count(),
        1
    );
}

#[test]
fn conditional_branches_keep_only_live_lines() {
    let out = run_arm(".if 1\na\n.else\nb\n.endif\n.if 0\nc\n.else\nd\n.endif\n");
    let lines = trimmed(&out);
    assert!(lines.contains(&"a".to_string()));
    assert!(lines.contains(&"d".to_string()));
    assert!(!lines.contains(&"b".to_string()));
    assert!(!lines.contains(&"c".to_string()));
}

#[test]
fn ppc_spr_mnemonics_become_numbered_spr_access() {
    let out = run(Arch::PowerPc, false, "mfctr 3\nmtvrsave 4\n");
    assert!(out.iter().any(|line| line.trim() == "mfspr 3, 9"));
    assert!(out.iter().any(|line| line.trim() == "mtspr 256, 4"));
}

#[test]
fn label_on_invocation_precedes_the_expansion() {
    let out = run_arm(".macro m\nnop\n.endm\nentry: m\n");
    let nop_idx = out
        .iter()
        .position(|line| line.trim() == "nop")
        .expect("nop line");
    assert_eq!(out[nop_idx - 1], "entry:");
}

#[test]
fn vararg_macro_keeps_comma_separators() {
    let out = run_arm(".macro m x:vararg\n \\x\n.endm\nm 1, 2, 3\n");
    assert!(out.iter().any(|line| line.trim() == "1, 2, 3"));
}

#[test]
fn section_stack_toggles_through_previous() {
    let out = run_arm(".text\n.const_data\n.previous\n.previous\nnop\n");
    let sections: Vec<String> = trimmed(&out)
        .into_iter()
        .filter(|line| line == ".text" || line == ".const_data")
        .collect();
    // the two .previous lines resolve to .text then back to .const_data,
    // and the tail flush appends a final .text
    assert_eq!(
        sections,
        [".text", ".const_data", ".text", ".const_data", ".text"]
    );
}

#[test]
fn arm_macro_body_with_literal_pool_round_trips() {
    let input = "\
.macro load_const reg, value
 ldr \\reg, =\\value
.endm
load_const r0, 0x12345678
load_const r1, 0x12345678
load_const r2, 0xcafebabe
";
    let out = run_arm(input);
    assert!(out.iter().any(|line| line.trim() == "ldr r0, .Literal_0"));
    assert!(out.iter().any(|line| line.trim() == "ldr r1, .Literal_0"));
    assert!(out.iter().any(|line| line.trim() == "ldr r2, .Literal_1"));
    let text_idx = out.iter().rposition(|line| line == ".text").expect(".text");
    assert!(out[text_idx..].iter().any(|line| line.trim() == ".word 0x12345678"));
    assert!(out[text_idx..].iter().any(|line| line.trim() == ".word 0xcafebabe"));
}

#[test]
fn unreq_duplication_covers_both_cases_when_enabled() {
    let out = run(Arch::Arm, true, ".unreq Width\n");
    assert!(out.contains(&".unreq width".to_string()));
    assert!(out.contains(&".unreq WIDTH".to_string()));
}

#[test]
fn rejected_constructs_surface_as_errors() {
    let mut preprocessor = Preprocessor::new(Arch::Arm, false);
    let err = preprocessor
        .process(".section nocomma\n".lines().map(str::to_string))
        .expect_err("non-Mach-O section should fail");
    assert!(err.to_string().contains("Mach-O"));
}
