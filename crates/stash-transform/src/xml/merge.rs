//! Structural merge of content fragments into a target element.
//!
//! A fragment child is skipped when the target already has a child with the
//! same node name and an equal attribute set. Content below that level is not
//! compared, so merging the same fragment twice leaves the document unchanged.

use super::parser::XmlParser;
use super::tree::{Attribute, Document, NodeId, NodeKind};
use crate::error::XmlError;

/// Outcome of merging one fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Fragment nodes appended to the target.
    pub inserted: usize,
    /// Fragment nodes skipped because an equivalent child already exists.
    pub skipped: usize,
}

/// Merge `fragment` into the children of `target`.
///
/// Whitespace-only text between fragment nodes is formatting and is not
/// merged.
///
/// # Errors
///
/// Returns an error if `fragment` is not well-formed content.
pub fn merge_fragment(
    document: &mut Document,
    target: NodeId,
    fragment: &str,
) -> Result<MergeOutcome, XmlError> {
    let parsed = XmlParser::new().parse_fragment(fragment)?;
    let mut outcome = MergeOutcome::default();

    for &candidate in parsed.children(parsed.root()) {
        if is_formatting(parsed.kind(candidate)) {
            continue;
        }
        if is_node_existing(document, target, &parsed, candidate) {
            tracing::debug!(node = parsed.node_name(candidate), "Skipping existing node");
            outcome.skipped += 1;
            continue;
        }
        let imported = document.import(&parsed, candidate);
        document.append_child(target, imported);
        outcome.inserted += 1;
    }

    Ok(outcome)
}

/// Whether `target` already has a child structurally equal to `candidate`.
///
/// Children are compared by node name first, then by attribute set.
pub fn is_node_existing(
    document: &Document,
    target: NodeId,
    source: &Document,
    candidate: NodeId,
) -> bool {
    let name = source.node_name(candidate);
    let attributes = source.attributes(candidate);

    document
        .children(target)
        .iter()
        .filter(|&&child| document.node_name(child) == name)
        .any(|&child| attributes_equal(attributes, document.attributes(child)))
}

/// Attribute sets are equal when they have the same size and every attribute
/// of `a` appears in `b` with the same value. Order is irrelevant.
pub fn attributes_equal(a: &[Attribute], b: &[Attribute]) -> bool {
    a.len() == b.len()
        && a.iter().all(|attr| {
            b.iter()
                .any(|other| other.name == attr.name && other.value == attr.value)
        })
}

fn is_formatting(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Text(text) if text.trim().is_empty())
}
