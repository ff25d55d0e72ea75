/// Target architecture tag supplied by the driver collaborator.
///
/// Selects the comment character and enables architecture-specific
/// rewrites in Pass 2 (ARM literal pools and `.unreq` duplication, or
/// PowerPC relocation-suffix and SPR rewriting).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchTag {
    /// ARM (and AArch32) targets. Comment character is `@`.
    Arm,
    /// PowerPC targets. Comment character is `#`.
    PowerPc,
}

impl ArchTag {
    /// The comment character this architecture's assembler uses.
    #[must_use]
    pub const fn comment_char(self) -> char {
        match self {
            ArchTag::Arm => '@',
            ArchTag::PowerPc => '#',
        }
    }
}

/// Configuration for the gas-to-Mach-O preprocessor.
///
/// Mirrors the driver-surface configuration from the system description:
/// the architecture tag and the `fix-unreq` flag are both supplied by the
/// outer collaborator, not derived by the core.
#[derive(Clone, Debug)]
pub struct GaspConfig {
    /// Target architecture, determining comment character and rewrites.
    pub arch: ArchTag,
    /// Whether `.unreq` should be duplicated in uppercase (ARM legacy-gas
    /// quirk). Defaults to enabled, matching the default on Apple hosts.
    pub fix_unreq: bool,
    /// Maximum macro/repetition expansion depth before aborting with
    /// `GaspError::MalformedInput`. Not part of the directive surface;
    /// purely a safety guard against runaway recursive expansion.
    pub max_expansion_depth: usize,
}

impl GaspConfig {
    /// Configuration for ARM targets, with `fix-unreq` enabled.
    #[must_use]
    pub const fn for_arm() -> Self {
        Self {
            arch: ArchTag::Arm,
            fix_unreq: true,
            max_expansion_depth: 4096,
        }
    }

    /// Configuration for PowerPC targets.
    #[must_use]
    pub const fn for_powerpc() -> Self {
        Self {
            arch: ArchTag::PowerPc,
            fix_unreq: true,
            max_expansion_depth: 4096,
        }
    }

    /// Override the `fix-unreq` flag.
    #[must_use]
    pub const fn with_fix_unreq(mut self, fix_unreq: bool) -> Self {
        self.fix_unreq = fix_unreq;
        self
    }

    /// Override the expansion-depth guard.
    #[must_use]
    pub const fn with_max_expansion_depth(mut self, depth: usize) -> Self {
        self.max_expansion_depth = depth;
        self
    }
}

impl Default for GaspConfig {
    fn default() -> Self {
        Self::for_arm()
    }
}
