//! Evaluator configuration, threaded through construction rather than read
//! from global state.

/// The Python version whose semantics are being modeled.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PythonVersion {
    pub major: u8,
    pub minor: u8,
}

impl PythonVersion {
    pub const PY27: PythonVersion = PythonVersion { major: 2, minor: 7 };
    pub const PY38: PythonVersion = PythonVersion { major: 3, minor: 8 };

    /// The iterator-step slot: `next` on Python 2, `__next__` since 3.
    pub const fn next_slot_name(self) -> &'static str {
        if self.major == 2 { "next" } else { "__next__" }
    }
}

impl Default for PythonVersion {
    fn default() -> Self {
        Self::PY38
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Settings {
    /// When constructing a builtin `list`/`set` at module scope, also scan
    /// for later append-like mutations to refine the element type.
    pub dynamic_array_additions: bool,
    pub python_version: PythonVersion,
    /// Ceiling on recursive inference depth. Exceeding it aborts the query
    /// branch with a best-effort empty result instead of hanging.
    pub recursion_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dynamic_array_additions: true,
            python_version: PythonVersion::default(),
            recursion_limit: 256,
        }
    }
}
