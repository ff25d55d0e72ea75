#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # gaspp
//!
//! A preprocessor that translates GNU-assembler (gas) source into the
//! dialect accepted by Apple's legacy assembler. It sits between a
//! compiler driver and the real assembler: it consumes already
//! C-preprocessed assembly lines plus an architecture tag, transforms
//! unsupported directives into an equivalent form, and emits lines ready
//! to be piped into the downstream assembler invocation.
//!
//! The core is a five-stage line-oriented pipeline, in order:
//!
//! - **Normalizer** ([`normalize`]) — strips comments, neutralizes
//!   directives the target assembler rejects, rewrites directive
//!   aliases, and rejects non-Mach-O section names.
//! - **Macro engine** ([`macros`]) — collects `.macro`/`.endm`
//!   definitions and expands invocations with argument substitution.
//! - **Repetition & architecture rewriter** ([`rewrite`]) — expands
//!   `.rept`/`.irp`/`.irpc`, tracks the section stack for `.previous`,
//!   and applies ARM literal-pool and PowerPC relocation/SPR rewrites.
//! - **Conditional filter** ([`conditionals`]) — evaluates the `.if`
//!   family and emits only lines inside truthy branches.
//! - **Literal-pool tail flush** — emits any literal-pool entries left
//!   over after the last `.ltorg`.
//!
//! ## Example
//!
//! ```rust
//! use gaspp::{process, GaspConfig};
//!
//! let input = vec![
//!     ".macro add3 a,b,c".to_string(),
//!     "add \\a, \\b, \\c".to_string(),
//!     ".endm".to_string(),
//!     "add3 r0,r1,r2".to_string(),
//! ];
//!
//! let output = process(&GaspConfig::for_arm(), &input).unwrap();
//! assert!(output.iter().any(|l| l.trim() == "add r0, r1, r2"));
//! ```

mod config;
mod context;
mod driver;
mod engine;
mod error;
mod macro_def;

pub mod conditionals;
pub mod macros;
pub mod normalize;
pub mod rewrite;

pub use config::{ArchTag, GaspConfig};
pub use context::GaspContext;
pub use driver::GaspDriver;
pub use error::{GaspError, GaspResult};
pub use macro_def::{MacroDefinition, MacroParam};

/// Run the full pipeline over `input` with the given `config`.
///
/// Convenience wrapper around [`GaspDriver::process`] for callers who
/// don't need to reuse a driver across multiple inputs.
pub fn process(config: &GaspConfig, input: &[String]) -> GaspResult<Vec<String>> {
    GaspDriver::new(config.clone()).process(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn comment_only_line_produces_no_content() {
        let input = lines("@ this whole line is a comment\n");
        let out = process(&GaspConfig::for_arm(), &input).unwrap();
        // Everything after the comment character is stripped in Pass 1a,
        // leaving a blank line that carries through to the tail flush.
        assert_eq!(out, vec!["", ".text"]);
    }

    #[test]
    fn scenario_macro_invocation() {
        let input = lines(".macro add3 a,b,c\nadd \\a, \\b, \\c\n.endm\nadd3 r0,r1,r2\n");
        let out = process(&GaspConfig::for_arm(), &input).unwrap();
        assert!(out.iter().any(|l| l.trim() == "add r0, r1, r2"));
    }

    #[test]
    fn scenario_rept() {
        let input = lines(".rept 3\nnop\n.endr\n");
        let out = process(&GaspConfig::for_arm(), &input).unwrap();
        assert_eq!(out.iter().filter(|l| l.trim() == "nop").count(), 3);
    }

    #[test]
    fn scenario_irp() {
        let input = lines(".irp reg, r0 r1 r2\nmov \\reg, #0\n.endr\n");
        let out = process(&GaspConfig::for_arm(), &input).unwrap();
        assert_eq!(
            out.iter()
                .filter(|l| l.trim().starts_with("mov"))
                .cloned()
                .collect::<Vec<_>>(),
            vec!["mov r0, #0", "mov r1, #0", "mov r2, #0"]
        );
    }

    #[test]
    fn scenario_literal_pool_drain() {
        let input = lines("ldr r0, =0xdeadbeef\nldr r1, =0xdeadbeef\n.ltorg\n");
        let out = process(&GaspConfig::for_arm(), &input).unwrap();
        assert!(out.iter().any(|l| l.contains("ldr r0, .Literal_0")));
        assert!(out.iter().any(|l| l.contains("ldr r1, .Literal_0")));
        assert!(out.iter().any(|l| l.trim() == ".Literal_0:"));
        assert_eq!(
            out.iter().filter(|l| l.trim() == ".Literal_0:").count(),
            1,
            "each label is flushed at most once total across all drains"
        );
    }

    #[test]
    fn scenario_conditional_filter() {
        let input = lines(".if 1\na\n.else\nb\n.endif\n.if 0\nc\n.else\nd\n.endif\n");
        let out = process(&GaspConfig::for_arm(), &input).unwrap();
        assert!(out.iter().any(|l| l.trim() == "a"));
        assert!(out.iter().any(|l| l.trim() == "d"));
        assert!(!out.iter().any(|l| l.trim() == "b"));
        assert!(!out.iter().any(|l| l.trim() == "c"));
    }

    #[test]
    fn scenario_powerpc_spr_rewrite() {
        let input = lines("mfctr 3\nmtvrsave 4\n");
        let out = process(&GaspConfig::for_powerpc(), &input).unwrap();
        assert!(out.iter().any(|l| l.trim() == "mfspr 3, 9"));
        assert!(out.iter().any(|l| l.trim() == "mtspr 256, 4"));
    }

    #[test]
    fn tail_flush_always_appends_text_directive() {
        let input = lines("nop\n");
        let out = process(&GaspConfig::for_arm(), &input).unwrap();
        assert_eq!(out.last().map(String::as_str), Some(".text"));
    }

    #[test]
    fn unreq_duplication_is_gated_by_fix_unreq() {
        let input = lines(".unreq foo\n");
        let with_fix = process(&GaspConfig::for_arm(), &input).unwrap();
        assert!(with_fix.iter().any(|l| l.trim() == ".unreq FOO"));

        let without_fix = process(&GaspConfig::for_arm().with_fix_unreq(false), &input).unwrap();
        assert!(!without_fix.iter().any(|l| l.trim() == ".unreq FOO"));
    }

    #[test]
    fn rejects_non_macho_section() {
        let input = lines(".section .text\n");
        let err = process(&GaspConfig::for_arm(), &input).unwrap_err();
        assert!(matches!(err, GaspError::UnsupportedConstruct { .. }));
    }
}
