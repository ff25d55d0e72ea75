use crate::context::{ConditionalState, GaspContext};
use crate::engine::{eval, ELSEIF_LINE, ELSE_LINE, ENDIF_LINE, IF_FAMILY};
use crate::error::{GaspError, GaspResult};

/// Pass 3. Evaluates the `.if` family and emits only lines inside truthy
/// branches. Directive lines themselves (`.if*`, `.elseif`, `.else`,
/// `.endif`) are always processed structurally — even while nested inside
/// a currently-false branch — so the stack stays balanced; only ordinary
/// content lines are subject to the emission rule.
pub fn filter(lines: Vec<String>, ctx: &mut GaspContext) -> GaspResult<Vec<String>> {
    let mut output = Vec::new();

    for line in lines {
        ctx.current_line += 1;

        if let Some(caps) = IF_FAMILY.captures(&line) {
            let variant = caps[1].to_string();
            let expr = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            let truth = evaluate_predicate(&variant, expr, ctx.current_line)?;
            ctx.conditional_stack.push(if truth {
                ConditionalState::True
            } else {
                ConditionalState::False
            });
            continue;
        }

        if let Some(caps) = ELSEIF_LINE.captures(&line) {
            let expr = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            let top = ctx.conditional_stack.last_mut().ok_or_else(|| {
                GaspError::malformed(ctx.current_line, "`.elseif` with no matching `.if`")
            })?;
            *top = match top {
                ConditionalState::False => {
                    if eval(expr, ctx.current_line)? != 0 {
                        ConditionalState::True
                    } else {
                        ConditionalState::False
                    }
                }
                ConditionalState::True => ConditionalState::StickyFalse,
                ConditionalState::StickyFalse => ConditionalState::StickyFalse,
            };
            continue;
        }

        if ELSE_LINE.is_match(&line) {
            let top = ctx.conditional_stack.last_mut().ok_or_else(|| {
                GaspError::malformed(ctx.current_line, "`.else` with no matching `.if`")
            })?;
            *top = match top {
                ConditionalState::True => ConditionalState::False,
                ConditionalState::False => ConditionalState::True,
                ConditionalState::StickyFalse => ConditionalState::StickyFalse,
            };
            continue;
        }

        if ENDIF_LINE.is_match(&line) {
            ctx.conditional_stack.pop().ok_or_else(|| {
                GaspError::malformed(ctx.current_line, "`.endif` with no matching `.if`")
            })?;
            continue;
        }

        if ctx.conditionals_all_true() {
            output.push(line);
        }
    }

    Ok(output)
}

fn evaluate_predicate(variant: &str, expr: &str, line_no: usize) -> GaspResult<bool> {
    match variant {
        "if" | "ife" => Ok(eval(expr, line_no)? != 0),
        "ifn" => Ok(eval(expr, line_no)? == 0),
        "ifb" => Ok(expr.chars().all(char::is_whitespace)),
        "ifnb" => Ok(!expr.chars().all(char::is_whitespace)),
        "ifc" | "ifnc" => {
            let (a, b) = split_ifc_operands(expr, line_no)?;
            let equal = a == b;
            Ok(if variant == "ifc" { equal } else { !equal })
        }
        "ifeq" => Ok(eval(expr, line_no)? == 0),
        "iflt" => Ok(eval(expr, line_no)? < 0),
        "ifle" => Ok(eval(expr, line_no)? <= 0),
        "ifgt" => Ok(eval(expr, line_no)? > 0),
        "ifge" => Ok(eval(expr, line_no)? >= 0),
        other => Err(GaspError::unsupported(
            line_no,
            format!("unrecognized `.if` variant `.{other}`"),
        )),
    }
}

fn split_ifc_operands(expr: &str, line_no: usize) -> GaspResult<(String, String)> {
    let (a, b) = expr
        .split_once(',')
        .ok_or_else(|| GaspError::malformed(line_no, "malformed `.ifc`/`.ifnc` operand list"))?;
    Ok((a.trim().to_string(), b.trim().to_string()))
}

/// Pass 3 tail. After all input is processed, emit `.text` followed by
/// every literal-pool entry not yet drained by an explicit `.ltorg`, so
/// any `ldr …,=EXPR` lacking a trailing `.ltorg` still gets a backing
/// word.
pub fn flush_tail(ctx: &mut GaspContext) -> Vec<String> {
    let mut output = vec![".text".to_string()];
    for (label, expr) in ctx.literal_pool.drain() {
        output.push(format!("{label}:"));
        output.push(format!("    .word {expr}"));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GaspConfig;

    fn ctx() -> GaspContext {
        GaspContext::new(&GaspConfig::for_arm())
    }

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn conditional_truth_table() {
        let mut c = ctx();
        let out = filter(
            lines(".if 1\na\n.else\nb\n.endif\n.if 0\nc\n.else\nd\n.endif\n"),
            &mut c,
        )
        .unwrap();
        assert_eq!(out, vec!["a", "d"]);
    }

    #[test]
    fn ifeq_and_iflt() {
        let mut c = ctx();
        let out = filter(lines(".ifeq 0\na\n.endif\n.iflt -1\nb\n.endif\n"), &mut c).unwrap();
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn ifc_and_ifnc() {
        let mut c = ctx();
        let out = filter(
            lines(".ifc foo,foo\na\n.endif\n.ifnc foo,bar\nb\n.endif\n"),
            &mut c,
        )
        .unwrap();
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn sticky_false_blocks_else_after_taken_elseif() {
        let mut c = ctx();
        let out = filter(
            lines(".if 1\na\n.elseif 1\nb\n.else\nc\n.endif\n"),
            &mut c,
        )
        .unwrap();
        assert_eq!(out, vec!["a"]);
    }

    #[test]
    fn unrecognized_if_variant_is_unsupported() {
        let mut c = ctx();
        let err = filter(lines(".ifne 1\na\n.endif\n"), &mut c).unwrap_err();
        assert!(matches!(err, GaspError::UnsupportedConstruct { .. }));
    }

    #[test]
    fn endif_underflow_is_malformed() {
        let mut c = ctx();
        let err = filter(lines(".endif\n"), &mut c).unwrap_err();
        assert!(matches!(err, GaspError::MalformedInput { .. }));
    }

    #[test]
    fn tail_flush_emits_residual_literal() {
        let mut c = ctx();
        c.literal_pool.intern("0xdeadbeef");
        let out = flush_tail(&mut c);
        assert_eq!(out, vec![".text", ".Literal_0:", "    .word 0xdeadbeef"]);
    }
}
