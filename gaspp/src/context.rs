use std::collections::HashMap;

use crate::config::{ArchTag, GaspConfig};
use crate::macro_def::MacroDefinition;

/// Tri-state value tracked per nesting level of an active `.if` chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionalState {
    /// Emit lines in this branch.
    True,
    /// Skip lines in this branch; a future `.elseif`/`.else` may flip it.
    False,
    /// A branch in this chain already fired; no later branch may fire.
    StickyFalse,
}

/// The section-directive stack used to implement `.previous`.
///
/// `.section`, `.text`, and `.const_data` lines push their own text.
/// `.previous` resolves to the second-from-top entry and pushes a copy of
/// it, so that a second consecutive `.previous` toggles back.
#[derive(Debug, Default)]
pub struct SectionStack {
    stack: Vec<String>,
}

impl SectionStack {
    pub fn push(&mut self, line: String) {
        self.stack.push(line);
    }

    /// Resolve `.previous`: the second-from-top entry, which is then
    /// pushed again (so it becomes the new top, matching push semantics).
    /// Returns `None` if fewer than two section directives precede it.
    pub fn resolve_previous(&mut self) -> Option<String> {
        if self.stack.len() < 2 {
            return None;
        }
        let previous = self.stack[self.stack.len() - 2].clone();
        self.stack.push(previous.clone());
        Some(previous)
    }
}

/// Interns `=EXPR` operands of ARM `ldr Rn,=EXPR` into synthesized labels.
///
/// The counter is monotonically increasing and never resets, even across
/// multiple `.ltorg` drains, per the "literal uniqueness" property: two
/// `ldr` lines with the same expression always share one label, and each
/// label is flushed at most once total.
#[derive(Debug, Default)]
pub struct LiteralPool {
    labels: HashMap<String, String>,
    order: Vec<String>,
    counter: usize,
}

impl LiteralPool {
    /// Look up or create the label for `expr`, recording insertion order
    /// for the pending entries that a drain will emit.
    pub fn intern(&mut self, expr: &str) -> String {
        if let Some(label) = self.labels.get(expr) {
            return label.clone();
        }
        let label = format!(".Literal_{}", self.counter);
        self.counter += 1;
        self.labels.insert(expr.to_string(), label.clone());
        self.order.push(expr.to_string());
        label
    }

    /// Drain all pending entries as `(label, expr)` pairs in insertion
    /// order, clearing the pending set. The counter is untouched.
    pub fn drain(&mut self) -> Vec<(String, String)> {
        let entries: Vec<(String, String)> = self
            .order
            .drain(..)
            .map(|expr| {
                let label = self.labels.remove(&expr).expect("interned expr missing");
                (label, expr)
            })
            .collect();
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// The repetition construct currently being accumulated by Pass 2.
///
/// At most one is active at a time; nesting is detected and rejected.
#[derive(Debug)]
pub enum RepetitionContext {
    Rpt { count: i64, body: Vec<String> },
    Irp { param: String, args: Vec<String>, body: Vec<String> },
    Irpc { param: String, chars: Vec<char>, body: Vec<String> },
}

impl RepetitionContext {
    pub fn body_mut(&mut self) -> &mut Vec<String> {
        match self {
            RepetitionContext::Rpt { body, .. } => body,
            RepetitionContext::Irp { body, .. } => body,
            RepetitionContext::Irpc { body, .. } => body,
        }
    }
}

/// All mutable state shared across the pipeline's passes, owned by a
/// single logical processor (never process-wide statics, per the
/// concurrency model: one `GaspContext` per `process` call).
pub struct GaspContext {
    /// Defined `.macro` entries, keyed by name.
    pub macros: HashMap<String, MacroDefinition>,
    /// Nesting depth of `.macro`/`.endm` currently being collected.
    pub macro_level: u32,
    /// Name of the outermost macro currently being defined, if any.
    pub current_macro: Option<String>,

    pub section_stack: SectionStack,
    pub literal_pool: LiteralPool,
    pub conditional_stack: Vec<ConditionalState>,
    pub repetition: Option<RepetitionContext>,

    pub arch: ArchTag,
    pub fix_unreq: bool,
    pub max_expansion_depth: usize,

    /// 1-based line number of whichever pass's input is currently being
    /// processed, used only for diagnostics.
    pub current_line: usize,
}

impl GaspContext {
    #[must_use]
    pub fn new(config: &GaspConfig) -> Self {
        Self {
            macros: HashMap::new(),
            macro_level: 0,
            current_macro: None,
            section_stack: SectionStack::default(),
            literal_pool: LiteralPool::default(),
            conditional_stack: Vec::new(),
            repetition: None,
            arch: config.arch,
            fix_unreq: config.fix_unreq,
            max_expansion_depth: config.max_expansion_depth,
            current_line: 0,
        }
    }

    /// Whether every entry in the conditional stack is `True` — the
    /// emission rule for ordinary (non-`.if`-family) lines.
    #[must_use]
    pub fn conditionals_all_true(&self) -> bool {
        self.conditional_stack
            .iter()
            .all(|s| matches!(s, ConditionalState::True))
    }
}
