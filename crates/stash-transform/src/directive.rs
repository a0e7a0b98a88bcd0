//! Directive names and the fixed capability set a transformer supports.

use std::fmt;

/// Directive that merges the instruction value into the target's children.
pub const ADD: &str = "add";

/// Directive that detaches the target node from its parent.
pub const REMOVE: &str = "remove";

/// Named optional capability of a transformer.
///
/// Directive names are case-insensitive: `Add`, `ADD` and `add` are the same
/// directive.
#[derive(Debug, Clone)]
pub struct Directive {
    name: String,
}

impl Directive {
    /// Create a directive with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Directive name as it was declared.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Case-insensitive name comparison.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl PartialEq for Directive {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.name)
    }
}

impl Eq for Directive {}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Immutable set of directives a transformer understands.
///
/// Built once when the transformer is constructed; duplicates (compared
/// case-insensitively) are collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveSet {
    directives: Vec<Directive>,
}

impl DirectiveSet {
    /// Empty set: every requested directive is unsupported.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether a directive with this name is in the set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.directives.iter().any(|d| d.matches(name))
    }

    /// Number of distinct directives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    /// Whether the set has no directives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Iterate over the directives in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Directive> {
        self.directives.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for DirectiveSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut directives: Vec<Directive> = Vec::new();
        for name in iter {
            let directive = Directive::new(name);
            if !directives.contains(&directive) {
                directives.push(directive);
            }
        }
        Self { directives }
    }
}
