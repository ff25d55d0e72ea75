use std::collections::VecDeque;

use log::trace;

use crate::config::ArchTag;
use crate::context::{GaspContext, RepetitionContext};
use crate::engine::{
    eval, flatten_commas_to_spaces, normalize_plus_minus, rewrite_ldr_literal,
    rewrite_ppc_relocations, rewrite_ppc_spr, ENDR_LINE, IRPC_LINE, IRP_LINE, LTORG_LINE,
    PREVIOUS_LINE, RPT_LINE, SECTION_TRACK_LINE, UNREQ_LINE,
};
use crate::error::{GaspError, GaspResult};

/// Pass 2. Expands `.rept`/`.irp`/`.irpc`, maintains the section stack for
/// `.previous`, rewrites ARM literal loads into labeled pool references,
/// and applies the PowerPC relocation-suffix and SPR rewrites. Like Pass
/// 1b, repetition materialization re-feeds its output to the front of a
/// work queue rather than recursing, so a materialized `.rept` body gets
/// the ordinary per-line rewrites applied exactly once, on its second
/// pass through this function.
pub fn rewrite(lines: Vec<String>, ctx: &mut GaspContext) -> GaspResult<Vec<String>> {
    let mut queue: VecDeque<String> = VecDeque::from(lines);
    let mut output = Vec::new();

    while let Some(line) = queue.pop_front() {
        ctx.current_line += 1;
        process_line(line, &mut queue, &mut output, ctx)?;
    }
    Ok(output)
}

fn process_line(
    line: String,
    queue: &mut VecDeque<String>,
    output: &mut Vec<String>,
    ctx: &mut GaspContext,
) -> GaspResult<()> {
    if ENDR_LINE.is_match(&line) {
        if ctx.repetition.is_none() {
            return Err(GaspError::malformed(
                ctx.current_line,
                "`.endr` with no matching `.rept`/`.irp`/`.irpc`",
            ));
        }
        return materialize_repetition(queue, ctx);
    }

    if ctx.repetition.is_some() {
        if RPT_LINE.is_match(&line) || IRP_LINE.is_match(&line) || IRPC_LINE.is_match(&line) {
            return Err(GaspError::unsupported(
                ctx.current_line,
                "nested `.rept`/`.irp`/`.irpc` is not supported",
            ));
        }
        ctx.repetition.as_mut().unwrap().body_mut().push(line);
        return Ok(());
    }

    if let Some(caps) = RPT_LINE.captures(&line) {
        let rest = normalize_plus_minus(caps[1].trim());
        let (count_expr, trailer) = split_first_token(&rest);
        let count = eval(&count_expr, ctx.current_line)?;
        let mut body = Vec::new();
        if !trailer.trim().is_empty() {
            body.push(trailer.trim().to_string());
        }
        ctx.repetition = Some(RepetitionContext::Rpt { count, body });
        return Ok(());
    }

    if let Some(caps) = IRP_LINE.captures(&line) {
        let param = caps[1].to_string();
        let args_text = flatten_commas_to_spaces(&caps[2]);
        let args: Vec<String> = args_text.split_whitespace().map(str::to_string).collect();
        ctx.repetition = Some(RepetitionContext::Irp {
            param,
            args,
            body: Vec::new(),
        });
        return Ok(());
    }

    if let Some(caps) = IRPC_LINE.captures(&line) {
        let param = caps[1].to_string();
        let chars: Vec<char> = caps[2].chars().collect();
        ctx.repetition = Some(RepetitionContext::Irpc {
            param,
            chars,
            body: Vec::new(),
        });
        return Ok(());
    }

    if SECTION_TRACK_LINE.is_match(&line) {
        trace!("line {}: section stack push `{line}`", ctx.current_line);
        ctx.section_stack.push(line.clone());
        output.push(line);
        return Ok(());
    }

    if PREVIOUS_LINE.is_match(&line) {
        let resolved = ctx.section_stack.resolve_previous().ok_or_else(|| {
            GaspError::unsupported(
                ctx.current_line,
                "`.previous` without two prior section directives",
            )
        })?;
        trace!("line {}: `.previous` resolved to `{resolved}`", ctx.current_line);
        output.push(resolved);
        return Ok(());
    }

    if LTORG_LINE.is_match(&line) {
        let drained = ctx.literal_pool.drain();
        trace!("line {}: `.ltorg` drains {} literal(s)", ctx.current_line, drained.len());
        for (label, expr) in drained {
            output.push(format!("{label}:"));
            output.push(format!("    .word {expr}"));
        }
        return Ok(());
    }

    let mut line = line;

    if let Some((prefix, expr)) = rewrite_ldr_literal(&line) {
        let label = ctx.literal_pool.intern(&expr);
        trace!("line {}: interned literal `{expr}` as `{label}`", ctx.current_line);
        line = format!("{prefix}{label}");
    }

    if ctx.arch == ArchTag::PowerPc {
        line = rewrite_ppc_relocations(&line);
        if let Some(rewritten) = rewrite_ppc_spr(&line) {
            line = rewritten;
        }
    }

    if ctx.arch == ArchTag::Arm && ctx.fix_unreq {
        if let Some(caps) = UNREQ_LINE.captures(&line) {
            let indent_and_directive = caps[1].to_string();
            let operand = caps[2].to_string();
            output.push(format!("{indent_and_directive}{}", operand.to_lowercase()));
            output.push(format!("{indent_and_directive}{}", operand.to_uppercase()));
            return Ok(());
        }
    }

    output.push(line);
    Ok(())
}

fn materialize_repetition(queue: &mut VecDeque<String>, ctx: &mut GaspContext) -> GaspResult<()> {
    let rep = ctx
        .repetition
        .take()
        .expect("materialize_repetition called without an active repetition");

    let materialized = match rep {
        RepetitionContext::Rpt { count, body } => {
            if count < 0 {
                return Err(GaspError::malformed(
                    ctx.current_line,
                    "`.rept` count evaluated to a negative value",
                ));
            }
            let mut out = Vec::with_capacity(body.len() * count.max(0) as usize);
            for _ in 0..count {
                out.extend(body.iter().cloned());
            }
            out
        }
        RepetitionContext::Irp { param, args, body } => {
            let mut out = Vec::with_capacity(body.len() * args.len());
            for value in &args {
                for line in &body {
                    out.push(substitute_param(line, &param, value));
                }
            }
            out
        }
        RepetitionContext::Irpc { param, chars, body } => {
            let mut out = Vec::with_capacity(body.len() * chars.len());
            for ch in &chars {
                let value = ch.to_string();
                for line in &body {
                    out.push(substitute_param(line, &param, &value));
                }
            }
            out
        }
    };

    for line in materialized.into_iter().rev() {
        queue.push_front(line);
    }
    Ok(())
}

fn substitute_param(line: &str, param: &str, value: &str) -> String {
    line.replace(&format!("\\{param}"), value).replace("\\()", "")
}

fn split_first_token(s: &str) -> (String, String) {
    match s.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.to_string()),
        None => (s.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GaspConfig;

    fn ctx_arm() -> GaspContext {
        GaspContext::new(&GaspConfig::for_arm())
    }

    fn ctx_ppc() -> GaspContext {
        GaspContext::new(&GaspConfig::for_powerpc())
    }

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn rept_emits_body_n_times() {
        let mut c = ctx_arm();
        let out = rewrite(lines(".rept 3\nnop\n.endr\n"), &mut c).unwrap();
        assert_eq!(out, vec!["nop", "nop", "nop"]);
    }

    #[test]
    fn irp_substitutes_each_argument() {
        let mut c = ctx_arm();
        let out = rewrite(lines(".irp reg, r0 r1 r2\nmov \\reg, #0\n.endr\n"), &mut c).unwrap();
        assert_eq!(out, vec!["mov r0, #0", "mov r1, #0", "mov r2, #0"]);
    }

    #[test]
    fn literal_uniqueness_across_ldr_and_ltorg() {
        let mut c = ctx_arm();
        let out = rewrite(
            lines("ldr r0, =0xdeadbeef\nldr r1, =0xdeadbeef\n.ltorg\n"),
            &mut c,
        )
        .unwrap();
        assert_eq!(
            out,
            vec![
                "ldr r0, .Literal_0",
                "ldr r1, .Literal_0",
                ".Literal_0:",
                "    .word 0xdeadbeef",
            ]
        );
    }

    #[test]
    fn section_stack_toggles_on_previous() {
        let mut c = ctx_arm();
        let out = rewrite(lines(".text\n.const_data\n.previous\n.previous\n"), &mut c).unwrap();
        assert_eq!(out, vec![".text", ".const_data", ".text", ".const_data"]);
    }

    #[test]
    fn previous_without_predecessor_fails() {
        let mut c = ctx_arm();
        let err = rewrite(lines(".previous\n"), &mut c).unwrap_err();
        assert!(matches!(err, GaspError::UnsupportedConstruct { .. }));
    }

    #[test]
    fn powerpc_spr_rewrite() {
        let mut c = ctx_ppc();
        let out = rewrite(lines("mfctr 3\nmtvrsave 4\n"), &mut c).unwrap();
        assert_eq!(out, vec!["mfspr 3, 9", "mtspr 256, 4"]);
    }

    #[test]
    fn powerpc_relocation_suffixes() {
        let mut c = ctx_ppc();
        let out = rewrite(lines("lwz r3, foo@l(r4)\nlwz r3, foo@ha(r4)\n"), &mut c).unwrap();
        assert_eq!(out, vec!["lwz r3, lo16(foo)(r4)", "lwz r3, ha16(foo)(r4)"]);
    }

    #[test]
    fn nested_repetition_is_rejected() {
        let mut c = ctx_arm();
        let err = rewrite(lines(".rept 2\n.rept 2\nnop\n.endr\n.endr\n"), &mut c).unwrap_err();
        assert!(matches!(err, GaspError::UnsupportedConstruct { .. }));
    }
}
