//! Error types for document transformation.

use std::fmt;

/// Problem with the directives requested by a single instruction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DirectiveError {
    /// Requested directive is not in the transformer's capability set.
    #[error("[{0}] directive is not supported")]
    Unsupported(String),

    /// Two directives that cannot be applied to the same node were requested.
    #[error("{first} and {second} directives together are not supported")]
    Conflicting {
        /// First directive of the pair.
        first: String,
        /// Second directive of the pair.
        second: String,
    },
}

/// Directive failure tagged with the locator key of its instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Locator key of the failing instruction.
    pub key: String,
    /// What was wrong.
    pub error: DirectiveError,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]: {}", self.key, self.error)
    }
}

/// Every directive failure found in one validation pass.
///
/// Never empty. A single failure displays as itself; more than one is an
/// aggregate and callers should walk [`ValidationErrors::failures`] to report
/// each of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    failures: Vec<ValidationFailure>,
}

impl ValidationErrors {
    /// Wrap collected failures. Returns `None` when there is nothing to report.
    #[must_use]
    pub fn from_failures(failures: Vec<ValidationFailure>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self { failures })
        }
    }

    /// All underlying failures, in the order they were found.
    #[must_use]
    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    /// Number of underlying failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether more than one failure was collected.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        self.failures.len() > 1
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failures.as_slice() {
            [single] => write!(f, "{single}"),
            failures => write!(
                f,
                "multiple errors processing directives ({} failures)",
                failures.len()
            ),
        }
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ValidationFailure;
    type IntoIter = std::vec::IntoIter<ValidationFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationFailure;
    type IntoIter = std::slice::Iter<'a, ValidationFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.failures.iter()
    }
}

/// Error while reading or writing XML.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum XmlError {
    /// XML syntax error reported by the reader.
    #[error("XML parse error: {0}")]
    Parse(#[from] quick_xml::Error),

    /// XML attribute error.
    #[error("XML attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    /// Encoding error during XML parsing.
    #[error("encoding error: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Well-formedness violation not caught by the reader.
    #[error("malformed XML: {0}")]
    Malformed(String),
}

/// Locator key that cannot be resolved to a node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LocatorError {
    /// Expression could not be parsed.
    #[error("invalid locator [{expression}]: {reason}")]
    InvalidExpression {
        /// The offending expression.
        expression: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Expression parsed but failed while evaluating, for example on an
    /// unknown function or namespace prefix.
    #[error("cannot evaluate locator [{expression}]: {reason}")]
    Evaluation {
        /// The offending expression.
        expression: String,
        /// Evaluator message.
        reason: String,
    },

    /// Expression yields something other than an element, attribute, text,
    /// comment or processing instruction node.
    #[error("locator [{expression}] selects {found}, not a node that can be changed")]
    UnsupportedResult {
        /// The offending expression.
        expression: String,
        /// What the expression produced.
        found: String,
    },
}

/// Error from a transformer's load, transform or save.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransformError {
    /// `transform` or `save` called before `load`.
    #[error("no document loaded")]
    NotLoaded,

    /// One or more instructions requested directives that cannot be applied.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// Locator found no node; creating missing nodes is not implemented.
    #[error("no node matches [{key}]; creating missing nodes is not implemented")]
    TargetNotFound {
        /// Locator key of the instruction.
        key: String,
    },

    /// Locator key is not a valid expression.
    #[error("{0}")]
    InvalidLocator(#[from] LocatorError),

    /// Loaded document is not well-formed.
    #[error("malformed document: {0}")]
    MalformedDocument(#[source] XmlError),

    /// `add` value is not a well-formed content fragment.
    #[error("cannot merge value into [{key}]: {source}")]
    Merge {
        /// Locator key of the instruction.
        key: String,
        /// Fragment parse failure.
        source: XmlError,
    },

    /// Directive cannot act on the kind of node the key selected, such as
    /// `add` on an attribute.
    #[error("cannot {directive} [{key}]: target is {target}")]
    UnsupportedTarget {
        /// Locator key of the instruction.
        key: String,
        /// Directive that was requested.
        directive: &'static str,
        /// DOM-style name of the selected node.
        target: String,
    },

    /// `remove` targeted the document root, which has no parent.
    #[error("cannot remove [{key}]: the document root has no parent")]
    RemoveRoot {
        /// Locator key of the instruction.
        key: String,
    },

    /// I/O error while opening or writing a stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[source] XmlError),
}
