use lazy_static::lazy_static;
use regex::Regex;

use crate::engine::{is_macho_section, strip_comment, SECTION_LINE};
use crate::error::{GaspError, GaspResult};

lazy_static! {
    /// Directives the downstream assembler rejects outright; neutralized
    /// by prefixing them with the comment character. `.ltorg` is
    /// deliberately absent here — Pass 2 replaces it wholesale with the
    /// drained literal pool, so there is never a leftover `.ltorg` line
    /// for this pass's comment-out to shadow.
    static ref COMMENT_OUT: Regex =
        Regex::new(r"^(\s*)\.(type|func|endfunc|size|fpu|arch|object_arch)\b").unwrap();

    static ref GLOBAL_ALIAS: Regex = Regex::new(r"^(\s*)\.global\b").unwrap();
    static ref INT_ALIAS: Regex = Regex::new(r"^(\s*)\.int\b").unwrap();
    static ref FLOAT_ALIAS: Regex = Regex::new(r"^(\s*)\.float\b").unwrap();
}

/// Pass 1a. Normalizes one raw line: strips comments, neutralizes
/// directives the target assembler doesn't accept, rewrites a handful of
/// directive aliases, and rejects non-Mach-O section names.
pub fn normalize_line(line: &str, comment_char: char, line_no: usize) -> GaspResult<String> {
    let stripped = strip_comment(line, comment_char);

    if let Some(caps) = SECTION_LINE.captures(&stripped) {
        let name = &caps[1];
        if !is_macho_section(name) {
            return Err(GaspError::unsupported(
                line_no,
                format!("`.section {name}` is not a Mach-O two-part section name"),
            ));
        }
    }

    let mut out = stripped;

    if out.contains("rodata") && SECTION_LINE.is_match(&out) {
        out = out.replace("rodata", "const_data");
    }
    out = GLOBAL_ALIAS.replace(&out, "${1}.globl").to_string();
    out = INT_ALIAS.replace(&out, "${1}.long").to_string();
    out = FLOAT_ALIAS.replace(&out, "${1}.single").to_string();

    if let Some(caps) = COMMENT_OUT.captures(&out) {
        let indent = &caps[1];
        let rest = out[indent.len()..].to_string();
        out = format!("{indent}{comment_char}{rest}");
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_comment() {
        let result = normalize_line("mov r0, #1 @ set flag", '@', 1).unwrap();
        assert_eq!(result, "mov r0, #1 ");
    }

    #[test]
    fn comment_idempotence() {
        let once = normalize_line("@ already a comment", '@', 1).unwrap();
        let twice = normalize_line(&once, '@', 1).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn comments_out_size_directive() {
        let result = normalize_line(".size foo, .-foo", '@', 1).unwrap();
        assert_eq!(result, "@.size foo, .-foo");
    }

    #[test]
    fn leaves_ltorg_verbatim() {
        let result = normalize_line(".ltorg", '@', 1).unwrap();
        assert_eq!(result, ".ltorg");
    }

    #[test]
    fn rewrites_global_alias() {
        let result = normalize_line(".global _main", '@', 1).unwrap();
        assert_eq!(result, ".globl _main");
    }

    #[test]
    fn rewrites_int_and_float_alias() {
        assert_eq!(normalize_line(".int 1", '@', 1).unwrap(), ".long 1");
        assert_eq!(normalize_line(".float 1.0", '@', 1).unwrap(), ".single 1.0");
    }

    #[test]
    fn rewrites_rodata_section() {
        let result = normalize_line(".section __TEXT,__rodata", '@', 1).unwrap();
        assert_eq!(result, ".section __TEXT,__const_data");
    }

    #[test]
    fn rejects_non_macho_section() {
        let err = normalize_line(".section .rodata", '@', 1).unwrap_err();
        assert!(matches!(err, GaspError::UnsupportedConstruct { .. }));
    }
}
