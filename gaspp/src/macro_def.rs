/// One parameter of a `.macro` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroParam {
    /// Parameter name with the `:vararg` suffix already stripped.
    pub name: String,
    /// Default value from `NAME=DEFAULT`, if any.
    pub default: Option<String>,
    /// Set when the declared name ended in `:vararg`. By convention this
    /// is the last parameter, but nothing here enforces that beyond the
    /// invariant that at most one parameter is variadic.
    pub vararg: bool,
}

/// A `.macro`/`.endm` definition, as collected by the macro engine.
///
/// The body is stored as raw, unexpanded lines: nested `.macro`/`.endm`
/// text is kept verbatim and only re-parsed when this definition is
/// itself expanded and its body re-fed through the macro engine.
#[derive(Clone, Debug, Default)]
pub struct MacroDefinition {
    pub params: Vec<MacroParam>,
    pub body: Vec<String>,
}

impl MacroDefinition {
    pub fn new(params: Vec<MacroParam>) -> Self {
        Self {
            params,
            body: Vec::new(),
        }
    }

    /// Index of the vararg parameter, if this definition has one.
    pub fn vararg_index(&self) -> Option<usize> {
        self.params.iter().position(|p| p.vararg)
    }

    /// Parameter names ordered longest-first, so that substituting `\foo`
    /// never gets clobbered by a shorter parameter like `\f` matching
    /// inside it first. Computed once per expansion rather than per line.
    pub fn substitution_order(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()));
        names
    }
}
