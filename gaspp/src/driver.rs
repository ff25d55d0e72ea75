use log::debug;

use crate::config::GaspConfig;
use crate::context::GaspContext;
use crate::error::GaspResult;
use crate::{conditionals, macros, normalize, rewrite};

/// Orchestrates the five pipeline stages over one buffered input.
///
/// Owns nothing across calls to [`GaspDriver::process`]: a fresh
/// [`GaspContext`] is created per call, so a driver can be reused for
/// multiple independent inputs without leaking macro definitions, section
/// stack state, or literal-pool entries between them.
pub struct GaspDriver {
    config: GaspConfig,
}

impl GaspDriver {
    #[must_use]
    pub fn new(config: GaspConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline: Normalizer → Macro engine → Repetition &
    /// architecture rewriter → Conditional filter → literal-pool tail
    /// flush.
    pub fn process(&self, input: &[String]) -> GaspResult<Vec<String>> {
        let comment_char = self.config.arch.comment_char();
        let mut ctx = GaspContext::new(&self.config);

        debug!("pass 1a (normalize): {} input lines", input.len());
        let mut normalized = Vec::with_capacity(input.len());
        for (idx, line) in input.iter().enumerate() {
            normalized.push(normalize::normalize_line(line, comment_char, idx + 1)?);
        }

        ctx.current_line = 0;
        debug!("pass 1b (macro engine): {} lines", normalized.len());
        let macro_expanded = macros::expand(normalized, &mut ctx)?;

        ctx.current_line = 0;
        debug!("pass 2 (repetition & arch rewrite): {} lines", macro_expanded.len());
        let rewritten = rewrite::rewrite(macro_expanded, &mut ctx)?;

        ctx.current_line = 0;
        debug!("pass 3 (conditional filter): {} lines", rewritten.len());
        let mut filtered = conditionals::filter(rewritten, &mut ctx)?;

        debug!("pass 3 tail: literal pool empty = {}", ctx.literal_pool.is_empty());
        filtered.extend(conditionals::flush_tail(&mut ctx));

        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GaspConfig;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn end_to_end_macro_invocation() {
        let driver = GaspDriver::new(GaspConfig::for_arm());
        let input = lines(".macro add3 a,b,c\n add \\a, \\b, \\c\n.endm\nadd3 r0,r1,r2\n");
        let out = driver.process(&input).unwrap();
        assert!(out.iter().any(|l| l.trim() == "add r0, r1, r2"));
    }

    #[test]
    fn end_to_end_conditional_and_rept() {
        let driver = GaspDriver::new(GaspConfig::for_arm());
        let input = lines(".rept 3\nnop\n.endr\n.if 1\na\n.else\nb\n.endif\n");
        let out = driver.process(&input).unwrap();
        let nop_count = out.iter().filter(|l| l.trim() == "nop").count();
        assert_eq!(nop_count, 3);
        assert!(out.iter().any(|l| l.trim() == "a"));
        assert!(!out.iter().any(|l| l.trim() == "b"));
    }

    #[test]
    fn end_to_end_powerpc_spr_rewrite() {
        let driver = GaspDriver::new(GaspConfig::for_powerpc());
        let input = lines("mfctr 3\nmtvrsave 4\n");
        let out = driver.process(&input).unwrap();
        assert!(out.iter().any(|l| l.trim() == "mfspr 3, 9"));
        assert!(out.iter().any(|l| l.trim() == "mtspr 256, 4"));
    }
}
