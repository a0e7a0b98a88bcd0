//! Keyed edit instructions.

use std::collections::BTreeMap;

/// Instructions keyed by locator expression.
///
/// Keys are unique and iterate in sorted order, which is also the order the
/// transformer applies them in.
pub type Instructions = BTreeMap<String, Instruction>;

/// One requested edit: a replacement value plus the directives to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instruction {
    /// Replacement text, or markup fragment for `add`.
    pub value: String,
    /// Requested directive names, in the order they were given.
    pub directives: Vec<String>,
}

impl Instruction {
    /// Plain replacement with no directives.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            directives: Vec::new(),
        }
    }

    /// Append a requested directive.
    #[must_use]
    pub fn with_directive(mut self, name: impl Into<String>) -> Self {
        self.directives.push(name.into());
        self
    }

    /// Whether the directive was requested (case-insensitive).
    #[must_use]
    pub fn requests(&self, name: &str) -> bool {
        self.directives.iter().any(|d| d.eq_ignore_ascii_case(name))
    }
}
