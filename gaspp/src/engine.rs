use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{GaspError, GaspResult};
use crate::macro_def::MacroParam;

lazy_static! {
    /// `.section NAME` — used to reject non-Mach-O section names in Pass 1a.
    pub static ref SECTION_LINE: Regex = Regex::new(r"^\s*\.section\s+(\S+)").unwrap();

    pub static ref MACRO_LINE: Regex = Regex::new(r"^\s*\.macro\b(.*)$").unwrap();
    pub static ref ENDM_LINE: Regex = Regex::new(r"^\s*\.endm\b").unwrap();
    pub static ref PURGEM_LINE: Regex = Regex::new(r"^\s*\.purgem\s+(\S+)").unwrap();

    pub static ref SECTION_TRACK_LINE: Regex = Regex::new(r"^\s*\.(section|text|const_data)\b").unwrap();
    pub static ref PREVIOUS_LINE: Regex = Regex::new(r"^\s*\.previous\b").unwrap();

    pub static ref LDR_LITERAL: Regex =
        Regex::new(r"^(?P<prefix>.*\bldr\s+)(?P<regs>[^,]+),\s*=\s*(?P<expr>\S+)\s*$").unwrap();
    pub static ref LTORG_LINE: Regex = Regex::new(r"^\s*\.ltorg\b").unwrap();

    pub static ref PPC_RELOC_L: Regex = Regex::new(r",\s*([A-Za-z0-9_.+\-]+)@l\b").unwrap();
    pub static ref PPC_RELOC_HA: Regex = Regex::new(r",\s*([A-Za-z0-9_.+\-]+)@ha\b").unwrap();
    pub static ref PPC_MFSPR: Regex = Regex::new(r"^(\s*)mf(ctr|vrsave)\s+(\S+)\s*$").unwrap();
    pub static ref PPC_MTSPR: Regex = Regex::new(r"^(\s*)mt(ctr|vrsave)\s+(\S+)\s*$").unwrap();

    pub static ref RPT_LINE: Regex = Regex::new(r"^\s*\.rept\s+(.*)$").unwrap();
    pub static ref IRP_LINE: Regex = Regex::new(r"^\s*\.irp\s+([^\s,]+)\s*,?\s*(.*)$").unwrap();
    pub static ref IRPC_LINE: Regex = Regex::new(r"^\s*\.irpc\s+([^\s,]+)\s*,?\s*(\S+)\s*$").unwrap();
    pub static ref ENDR_LINE: Regex = Regex::new(r"^\s*\.endr\b").unwrap();

    /// Matches any `.ifSUFFIX` spelling, not just the recognized ones —
    /// unrecognized suffixes (e.g. `.ifne`) must be flagged as an
    /// unsupported construct rather than silently passed through as a
    /// content line or silently treated as `.if`.
    pub static ref IF_FAMILY: Regex = Regex::new(r"^\s*\.(if[a-zA-Z]*)\b(.*)$").unwrap();
    pub static ref ELSEIF_LINE: Regex = Regex::new(r"^\s*\.elseif\b(.*)$").unwrap();
    pub static ref ELSE_LINE: Regex = Regex::new(r"^\s*\.else\b").unwrap();
    pub static ref ENDIF_LINE: Regex = Regex::new(r"^\s*\.endif\b").unwrap();

    pub static ref UNREQ_LINE: Regex = Regex::new(r"^(\s*\.unreq\s+)(\S+)\s*$").unwrap();

    /// Collapses whitespace that surrounds a `+` or `-` so that argument
    /// splitting (whitespace-based) doesn't fragment `x + 1` into three
    /// positional tokens.
    pub static ref PLUS_MINUS_SPACING: Regex = Regex::new(r"\s*([+\-])\s*").unwrap();

    /// `mfspr`/`mtspr` symbolic SPR name table.
    pub static ref SPR_TABLE: std::collections::HashMap<&'static str, u32> = {
        let mut m = std::collections::HashMap::new();
        m.insert("ctr", 9);
        m.insert("vrsave", 256);
        m
    };
}

/// Strip everything from the first occurrence of `comment_char` onward.
///
/// Matches spec §4.1 literally: no string-literal awareness, since gas
/// assembly lines in practice don't carry the comment character inside
/// operands this preprocessor needs to understand.
pub fn strip_comment(line: &str, comment_char: char) -> String {
    match line.find(comment_char) {
        Some(idx) => line[..idx].to_string(),
        None => line.to_string(),
    }
}

/// True if the first non-whitespace character of `line` is the comment
/// character — used by the "comment idempotence" property.
pub fn is_comment_only(line: &str, comment_char: char) -> bool {
    line.trim_start().starts_with(comment_char)
}

/// Replace whitespace surrounding `+`/`-` with nothing, so `x + 1`
/// becomes `x+1` before whitespace-splitting into positional tokens.
pub fn normalize_plus_minus(s: &str) -> String {
    PLUS_MINUS_SPACING.replace_all(s, "$1").to_string()
}

/// Flatten commas to spaces, treating them as optional separators — used
/// for parameter lists and `.irp`/`.rept` trailing argument lists where
/// comma-vs-whitespace carries no semantic weight.
pub fn flatten_commas_to_spaces(s: &str) -> String {
    s.replace(',', " ")
}

/// Split on commas, preserving empty fields: two adjacent commas denote
/// an empty positional argument. Surrounding whitespace of each field is
/// trimmed, but the field itself is not otherwise normalized.
pub fn split_commas_significant(s: &str) -> Vec<String> {
    s.split(',').map(|field| field.trim().to_string()).collect()
}

/// Parse a `.macro NAME PARAMS…` parameter list (everything after NAME).
///
/// Commas are optional separators; each token is `NAME`, `NAME=DEFAULT`,
/// or either form with a `:vararg` suffix on NAME.
pub fn parse_macro_params(rest: &str) -> GaspResult<Vec<MacroParam>> {
    let flattened = flatten_commas_to_spaces(rest);
    let mut params = Vec::new();
    for token in flattened.split_whitespace() {
        let (mut name, default) = match token.split_once('=') {
            Some((n, d)) => (n.to_string(), Some(d.to_string())),
            None => (token.to_string(), None),
        };
        let vararg = name.ends_with(":vararg");
        if vararg {
            name.truncate(name.len() - ":vararg".len());
        }
        params.push(MacroParam {
            name,
            default,
            vararg,
        });
    }
    let vararg_count = params.iter().filter(|p| p.vararg).count();
    if vararg_count > 1 {
        return Err(GaspError::malformed(
            0,
            "more than one :vararg parameter in macro declaration",
        ));
    }
    Ok(params)
}

/// Intern the label for an ARM literal-pool expression, applying the
/// `ldr Rn,=EXPR` rewrite to a line if it matches. Returns `None` if the
/// line doesn't match the pattern.
pub fn rewrite_ldr_literal(line: &str) -> Option<(String, String)> {
    let caps = LDR_LITERAL.captures(line)?;
    let prefix = caps.name("prefix").unwrap().as_str();
    let regs = caps.name("regs").unwrap().as_str();
    let expr = caps.name("expr").unwrap().as_str();
    Some((format!("{prefix}{regs}, "), expr.to_string()))
}

/// Rewrite PowerPC `@l`/`@ha` relocation suffixes to `lo16()`/`ha16()`.
pub fn rewrite_ppc_relocations(line: &str) -> String {
    let line = PPC_RELOC_L.replace_all(line, ", lo16($1)");
    PPC_RELOC_HA.replace_all(&line, ", ha16($1)").to_string()
}

/// Rewrite a PowerPC `mfNAME`/`mtNAME` symbolic-SPR line to its numeric
/// `mfspr`/`mtspr` form, if `line` matches a known SPR name.
pub fn rewrite_ppc_spr(line: &str) -> Option<String> {
    if let Some(caps) = PPC_MFSPR.captures(line) {
        let indent = &caps[1];
        let name = &caps[2];
        let reg = &caps[3];
        let num = SPR_TABLE.get(name)?;
        return Some(format!("{indent}mfspr {reg}, {num}"));
    }
    if let Some(caps) = PPC_MTSPR.captures(line) {
        let indent = &caps[1];
        let name = &caps[2];
        let reg = &caps[3];
        let num = SPR_TABLE.get(name)?;
        return Some(format!("{indent}mtspr {num}, {reg}"));
    }
    None
}

/// Trivial arithmetic/relational/logical evaluator for macro-generated
/// numeric expressions: integer literals (decimal or `0x`-prefixed hex),
/// parens, unary `-`/`!`, and `+ - * / % == != < <= > >= && ||`,
/// evaluated left to right with C-like precedence. Identifiers that
/// aren't numeric literals evaluate to 0 — this preprocessor only needs
/// to evaluate expressions macros actually generate, not a full gas
/// expression grammar.
pub fn eval(expr: &str, line_no: usize) -> GaspResult<i64> {
    let tokens = tokenize_expr(expr, line_no)?;
    let mut parser = ExprParser { tokens: &tokens, pos: 0, line_no };
    let value = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(GaspError::malformed(line_no, format!("trailing tokens in expression `{expr}`")));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum ExprTok {
    Num(i64),
    Op(String),
    LParen,
    RParen,
}

fn tokenize_expr(expr: &str, line_no: usize) -> GaspResult<Vec<ExprTok>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '(' {
            tokens.push(ExprTok::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(ExprTok::RParen);
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            if c == '0' && chars.get(i + 1).is_some_and(|n| *n == 'x' || *n == 'X') {
                i += 2;
                while i < chars.len() && chars[i].is_ascii_hexdigit() {
                    i += 1;
                }
                let text = &chars[start + 2..i].iter().collect::<String>();
                let value = i64::from_str_radix(text, 16)
                    .map_err(|e| GaspError::malformed(line_no, format!("bad hex literal: {e}")))?;
                tokens.push(ExprTok::Num(value));
            } else {
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text = chars[start..i].iter().collect::<String>();
                let value = text
                    .parse::<i64>()
                    .map_err(|e| GaspError::malformed(line_no, format!("bad integer literal: {e}")))?;
                tokens.push(ExprTok::Num(value));
            }
        } else {
            let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
            if matches!(two.as_str(), "==" | "!=" | "<=" | ">=" | "&&" | "||") {
                tokens.push(ExprTok::Op(two));
                i += 2;
            } else if matches!(c, '+' | '-' | '*' | '/' | '%' | '<' | '>' | '!') {
                tokens.push(ExprTok::Op(c.to_string()));
                i += 1;
            } else if c.is_alphabetic() || c == '_' {
                // Bare identifier: skip it, it evaluates to 0.
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(ExprTok::Num(0));
            } else {
                return Err(GaspError::malformed(line_no, format!("unexpected character `{c}` in expression")));
            }
        }
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    tokens: &'a [ExprTok],
    pos: usize,
    line_no: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&ExprTok> {
        self.tokens.get(self.pos)
    }

    fn peek_op(&self, ops: &[&str]) -> bool {
        matches!(self.peek(), Some(ExprTok::Op(o)) if ops.contains(&o.as_str()))
    }

    fn bump_op(&mut self) -> String {
        match self.tokens[self.pos].clone() {
            ExprTok::Op(o) => {
                self.pos += 1;
                o
            }
            _ => unreachable!(),
        }
    }

    fn parse_or(&mut self) -> GaspResult<i64> {
        let mut lhs = self.parse_and()?;
        while self.peek_op(&["||"]) {
            self.bump_op();
            let rhs = self.parse_and()?;
            lhs = i64::from(lhs != 0 || rhs != 0);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> GaspResult<i64> {
        let mut lhs = self.parse_equality()?;
        while self.peek_op(&["&&"]) {
            self.bump_op();
            let rhs = self.parse_equality()?;
            lhs = i64::from(lhs != 0 && rhs != 0);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> GaspResult<i64> {
        let mut lhs = self.parse_relational()?;
        while self.peek_op(&["==", "!="]) {
            let op = self.bump_op();
            let rhs = self.parse_relational()?;
            lhs = i64::from(if op == "==" { lhs == rhs } else { lhs != rhs });
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> GaspResult<i64> {
        let mut lhs = self.parse_additive()?;
        while self.peek_op(&["<", "<=", ">", ">="]) {
            let op = self.bump_op();
            let rhs = self.parse_additive()?;
            lhs = i64::from(match op.as_str() {
                "<" => lhs < rhs,
                "<=" => lhs <= rhs,
                ">" => lhs > rhs,
                _ => lhs >= rhs,
            });
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> GaspResult<i64> {
        let mut lhs = self.parse_multiplicative()?;
        while self.peek_op(&["+", "-"]) {
            let op = self.bump_op();
            let rhs = self.parse_multiplicative()?;
            lhs = if op == "+" { lhs + rhs } else { lhs - rhs };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> GaspResult<i64> {
        let mut lhs = self.parse_unary()?;
        while self.peek_op(&["*", "/", "%"]) {
            let op = self.bump_op();
            let rhs = self.parse_unary()?;
            lhs = match op.as_str() {
                "*" => lhs * rhs,
                "/" => {
                    if rhs == 0 {
                        return Err(GaspError::malformed(self.line_no, "division by zero in expression"));
                    }
                    lhs / rhs
                }
                _ => {
                    if rhs == 0 {
                        return Err(GaspError::malformed(self.line_no, "modulo by zero in expression"));
                    }
                    lhs % rhs
                }
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> GaspResult<i64> {
        if self.peek_op(&["-"]) {
            self.bump_op();
            return Ok(-self.parse_unary()?);
        }
        if self.peek_op(&["!"]) {
            self.bump_op();
            return Ok(i64::from(self.parse_unary()? == 0));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> GaspResult<i64> {
        match self.tokens.get(self.pos) {
            Some(ExprTok::Num(n)) => {
                self.pos += 1;
                Ok(*n)
            }
            Some(ExprTok::LParen) => {
                self.pos += 1;
                let value = self.parse_or()?;
                match self.tokens.get(self.pos) {
                    Some(ExprTok::RParen) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err(GaspError::malformed(self.line_no, "unmatched `(` in expression")),
                }
            }
            other => Err(GaspError::malformed(
                self.line_no,
                format!("unexpected token in expression: {other:?}"),
            )),
        }
    }
}

/// Validate a Mach-O two-part section name (`__SEGMENT,__section`).
pub fn is_macho_section(name: &str) -> bool {
    name.contains(',')
}
