//! XML transformer.
//!
//! Each instruction key is an XPath expression; the first node it selects
//! is the target. The instruction then does one of three things to it:
//!
//! - `add`: merge the value, parsed as a content fragment, into the element's
//!   children, skipping children that already exist (see [`merge_fragment`]);
//! - `remove`: detach the node from its parent, or drop the attribute;
//! - neither: replace the text content with the value. For an attribute this
//!   sets its value.
//!
//! `add` and `remove` cannot be combined in one instruction. `add` only
//! accepts element targets.

mod locator;
mod merge;
mod parser;
mod serializer;
mod tree;

use std::io::{BufReader, Read, Write};

pub use locator::{Locator, PathLocator, Target};
pub use merge::{MergeOutcome, attributes_equal, is_node_existing, merge_fragment};
pub use parser::{FRAGMENT_WRAPPER, XmlParser};
pub use serializer::XmlSerializer;
pub use tree::{Attribute, Declaration, Document, Element, NodeId, NodeKind};

use crate::directive::{ADD, DirectiveSet, REMOVE};
use crate::error::{DirectiveError, TransformError};
use crate::instruction::{Instruction, Instructions};
use crate::transformer::Transformer;

/// Transformer for XML documents.
///
/// The locator is pluggable; [`PathLocator`] is used by default.
#[derive(Debug)]
pub struct XmlTransformer<L = PathLocator> {
    directives: DirectiveSet,
    document: Option<Document>,
    locator: L,
}

impl XmlTransformer {
    /// Create a transformer supporting `add` and `remove`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_directives([ADD, REMOVE].into_iter().collect())
    }

    /// Create a transformer supporting only the given directives.
    #[must_use]
    pub fn with_directives(directives: DirectiveSet) -> Self {
        Self::with_locator(directives, PathLocator)
    }
}

impl Default for XmlTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Locator> XmlTransformer<L> {
    /// Create a transformer with a custom locator.
    #[must_use]
    pub fn with_locator(directives: DirectiveSet, locator: L) -> Self {
        Self {
            directives,
            document: None,
            locator,
        }
    }

    /// Currently loaded document.
    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    fn apply_one(
        document: &mut Document,
        target: Target,
        key: &str,
        instruction: &Instruction,
        directives: &DirectiveSet,
    ) -> Result<(), TransformError> {
        if instruction.requests(ADD) && directives.contains(ADD) {
            let Target::Node(node) = target else {
                return Err(unsupported_target(key, ADD, "an attribute"));
            };
            if document.element(node).is_none() {
                return Err(unsupported_target(key, ADD, document.node_name(node)));
            }
            let outcome = merge_fragment(document, node, &instruction.value).map_err(|source| {
                TransformError::Merge {
                    key: key.to_owned(),
                    source,
                }
            })?;
            tracing::debug!(
                key,
                inserted = outcome.inserted,
                skipped = outcome.skipped,
                "Merged value"
            );
        } else if instruction.requests(REMOVE) && directives.contains(REMOVE) {
            match target {
                Target::Node(node) => {
                    if document.detach(node).is_none() {
                        return Err(TransformError::RemoveRoot {
                            key: key.to_owned(),
                        });
                    }
                }
                Target::Attribute { element, name } => {
                    document.remove_attribute(element, &name);
                }
            }
            tracing::debug!(key, "Removed node");
        } else {
            match target {
                Target::Node(node) => document.set_text_content(node, &instruction.value),
                Target::Attribute { element, name } => {
                    document.set_attribute(element, &name, &instruction.value);
                }
            }
            tracing::debug!(key, "Replaced text content");
        }
        Ok(())
    }
}

fn unsupported_target(key: &str, directive: &'static str, target: &str) -> TransformError {
    TransformError::UnsupportedTarget {
        key: key.to_owned(),
        directive,
        target: target.to_owned(),
    }
}

impl<L: Locator> Transformer for XmlTransformer<L> {
    fn directives(&self) -> &DirectiveSet {
        &self.directives
    }

    fn load(&mut self, input: &mut dyn Read) -> Result<(), TransformError> {
        let document = XmlParser::new()
            .parse(BufReader::new(input))
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to parse document");
                TransformError::MalformedDocument(e)
            })?;
        tracing::debug!(root = document.node_name(document.root()), "Loaded document");
        self.document = Some(document);
        Ok(())
    }

    fn save(&self, output: &mut dyn Write) -> Result<(), TransformError> {
        let document = self.document.as_ref().ok_or(TransformError::NotLoaded)?;
        XmlSerializer::new()
            .serialize(document, output)
            .map_err(TransformError::Serialize)
    }

    fn validate_directives_internal(&self, instruction: &Instruction) -> Vec<DirectiveError> {
        if instruction.requests(ADD) && instruction.requests(REMOVE) {
            vec![DirectiveError::Conflicting {
                first: ADD.to_owned(),
                second: REMOVE.to_owned(),
            }]
        } else {
            Vec::new()
        }
    }

    fn apply_all(&mut self, instructions: &Instructions) -> Result<(), TransformError> {
        let Self {
            directives,
            document,
            locator,
        } = self;
        let document = document.as_mut().ok_or(TransformError::NotLoaded)?;

        for (key, instruction) in instructions {
            let Some(target) = locator.find_first(document, key)? else {
                tracing::error!(key = %key, "No node matches locator");
                return Err(TransformError::TargetNotFound { key: key.clone() });
            };
            tracing::trace!(key = %key, target = ?target, "Located node");
            Self::apply_one(document, target, key, instruction, directives)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ValidationErrors;

    const SERVER: &str = r#"<server><connector port="8080"/><name>old</name><log level="info"/></server>"#;

    fn loaded(xml: &str) -> XmlTransformer {
        let mut transformer = XmlTransformer::new();
        transformer.load(&mut xml.as_bytes()).unwrap();
        transformer
    }

    fn saved<L: Locator>(transformer: &XmlTransformer<L>) -> String {
        let mut out = Vec::new();
        transformer.save(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn single(key: &str, instruction: Instruction) -> Instructions {
        Instructions::from([(key.to_owned(), instruction)])
    }

    fn validation_errors(err: TransformError) -> ValidationErrors {
        match err {
            TransformError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_directives() {
        let transformer = XmlTransformer::new();
        assert!(transformer.supports("add"));
        assert!(transformer.supports("REMOVE"));
        assert!(!transformer.supports("rename"));
    }

    #[test]
    fn test_replace_sets_text_content() {
        let mut transformer = loaded(SERVER);

        transformer
            .transform(&single("/server/name", Instruction::new("new")))
            .unwrap();

        assert_eq!(
            saved(&transformer),
            "<server><connector port=\"8080\"/><name>new</name><log level=\"info\"/></server>\n"
        );
    }

    #[test]
    fn test_replace_drops_element_children() {
        let mut transformer = loaded("<a><b><c/></b></a>");

        transformer
            .transform(&single("/a/b", Instruction::new("text")))
            .unwrap();

        assert_eq!(saved(&transformer), "<a><b>text</b></a>\n");
    }

    #[test]
    fn test_add_merges_fragment() {
        let mut transformer = loaded(SERVER);
        let batch = single(
            "/server",
            Instruction::new(r#"<connector port="8443"/><connector port="8080"/>"#)
                .with_directive("add"),
        );

        transformer.transform(&batch).unwrap();

        assert_eq!(
            saved(&transformer),
            "<server><connector port=\"8080\"/><name>old</name><log level=\"info\"/><connector port=\"8443\"/></server>\n"
        );
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut transformer = loaded(SERVER);
        let batch = single(
            "/server",
            Instruction::new(r#"<connector port="8443"><ssl/></connector>"#).with_directive("ADD"),
        );

        transformer.transform(&batch).unwrap();
        let once = saved(&transformer);
        transformer.transform(&batch).unwrap();

        assert_eq!(saved(&transformer), once);
    }

    #[test]
    fn test_add_malformed_value_is_merge_error() {
        let mut transformer = loaded(SERVER);
        let batch = single("/server", Instruction::new("<open>").with_directive("add"));

        let err = transformer.transform(&batch).unwrap_err();

        assert!(matches!(err, TransformError::Merge { ref key, .. } if key == "/server"));
    }

    #[test]
    fn test_remove_detaches_node() {
        let mut transformer = loaded(SERVER);

        transformer
            .transform(&single("/server/log", Instruction::new("").with_directive("remove")))
            .unwrap();

        assert_eq!(
            saved(&transformer),
            "<server><connector port=\"8080\"/><name>old</name></server>\n"
        );
    }

    #[test]
    fn test_remove_then_locate_misses() {
        let mut transformer = loaded(SERVER);
        let remove = single("/server/log", Instruction::new("").with_directive("remove"));
        transformer.transform(&remove).unwrap();

        let err = transformer
            .transform(&single("/server/log", Instruction::new("debug")))
            .unwrap_err();

        assert!(matches!(err, TransformError::TargetNotFound { ref key } if key == "/server/log"));
    }

    #[test]
    fn test_remove_root_is_rejected() {
        let mut transformer = loaded(SERVER);

        let err = transformer
            .transform(&single("/server", Instruction::new("").with_directive("remove")))
            .unwrap_err();

        assert!(matches!(err, TransformError::RemoveRoot { .. }));
        assert_eq!(saved(&transformer), format!("{SERVER}\n"));
    }

    #[test]
    fn test_replace_attribute_value() {
        let mut transformer = loaded(r#"<server port="80"><name>a</name></server>"#);

        transformer
            .transform(&single("/server/@port", Instruction::new("8080")))
            .unwrap();

        assert_eq!(
            saved(&transformer),
            "<server port=\"8080\"><name>a</name></server>\n"
        );
    }

    #[test]
    fn test_remove_attribute() {
        let mut transformer = loaded(SERVER);

        transformer
            .transform(&single(
                "/server/connector/@port",
                Instruction::new("").with_directive("remove"),
            ))
            .unwrap();

        assert_eq!(
            saved(&transformer),
            "<server><connector/><name>old</name><log level=\"info\"/></server>\n"
        );
    }

    #[test]
    fn test_replace_text_node() {
        let mut transformer = loaded(r#"<server port="80"><name>a<b/></name></server>"#);

        transformer
            .transform(&single("/server/name/text()", Instruction::new("z")))
            .unwrap();

        assert_eq!(
            saved(&transformer),
            "<server port=\"80\"><name>z<b/></name></server>\n"
        );
    }

    #[test]
    fn test_replace_through_function_predicate_and_axis() {
        let mut transformer = loaded(r#"<server><name>a</name><name>b</name></server>"#);
        let batch = Instructions::from([
            ("/server/name[text()='a']".to_owned(), Instruction::new("first")),
            ("//name[last()]".to_owned(), Instruction::new("last")),
        ]);

        transformer.transform(&batch).unwrap();
        transformer
            .transform(&single("/server/child::name[1]", Instruction::new("again")))
            .unwrap();

        assert_eq!(
            saved(&transformer),
            "<server><name>again</name><name>last</name></server>\n"
        );
    }

    #[test]
    fn test_add_to_attribute_is_rejected() {
        let mut transformer = loaded(SERVER);
        let batch = single(
            "/server/log/@level",
            Instruction::new("<x/>").with_directive("add"),
        );

        let err = transformer.transform(&batch).unwrap_err();

        assert!(matches!(
            err,
            TransformError::UnsupportedTarget { directive: "add", .. }
        ));
        assert_eq!(saved(&transformer), format!("{SERVER}\n"));
    }

    #[test]
    fn test_non_node_key_is_invalid_locator() {
        let mut transformer = loaded(SERVER);

        let err = transformer
            .transform(&single("count(//name)", Instruction::new("x")))
            .unwrap_err();

        assert!(matches!(err, TransformError::InvalidLocator(_)));
    }

    #[test]
    fn test_locator_miss_is_not_implemented_error() {
        let mut transformer = loaded(SERVER);

        let err = transformer
            .transform(&single("/server/missing", Instruction::new("x")))
            .unwrap_err();

        assert!(matches!(err, TransformError::TargetNotFound { .. }));
        assert!(err.to_string().contains("not implemented"));
    }

    #[test]
    fn test_locator_miss_fails_alongside_valid_instructions() {
        let mut transformer = loaded(SERVER);
        let batch = Instructions::from([
            ("/server/name".to_owned(), Instruction::new("applied")),
            ("/server/timeout".to_owned(), Instruction::new("30")),
        ]);

        let err = transformer.transform(&batch).unwrap_err();

        assert!(matches!(err, TransformError::TargetNotFound { ref key } if key == "/server/timeout"));
        // Earlier instructions stay applied.
        let document = transformer.document().unwrap();
        let Some(Target::Node(name)) = PathLocator.find_first(document, "/server/name").unwrap()
        else {
            panic!("expected an element");
        };
        assert_eq!(document.text_content(name), "applied");
    }

    #[test]
    fn test_invalid_locator() {
        let mut transformer = loaded(SERVER);

        let err = transformer
            .transform(&single("/server[", Instruction::new("x")))
            .unwrap_err();

        assert!(matches!(err, TransformError::InvalidLocator(_)));
    }

    #[test]
    fn test_add_and_remove_conflict_leaves_document_unchanged() {
        let mut transformer = loaded(SERVER);
        let batch = single(
            "/server/name",
            Instruction::new("x")
                .with_directive("add")
                .with_directive("remove"),
        );

        let errors = validation_errors(transformer.transform(&batch).unwrap_err());

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.to_string(),
            "[/server/name]: add and remove directives together are not supported"
        );
        assert_eq!(saved(&transformer), format!("{SERVER}\n"));
    }

    #[test]
    fn test_conflict_detected_regardless_of_case() {
        let transformer = XmlTransformer::new();
        let instruction = Instruction::new("x")
            .with_directive("Remove")
            .with_directive("ADD");

        let errors = transformer.validate_directives(&instruction).unwrap_err();

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], DirectiveError::Conflicting { .. }));
    }

    #[test]
    fn test_aggregates_every_failure_before_applying() {
        let mut transformer = loaded(SERVER);
        let batch = Instructions::from([
            ("/server/name".to_owned(), Instruction::new("valid")),
            (
                "/server/log".to_owned(),
                Instruction::new("x").with_directive("rename"),
            ),
            (
                "/server/connector".to_owned(),
                Instruction::new("x")
                    .with_directive("add")
                    .with_directive("remove"),
            ),
        ]);

        let errors = validation_errors(transformer.transform(&batch).unwrap_err());

        assert!(errors.is_aggregate());
        assert_eq!(errors.len(), 2);
        assert_eq!(saved(&transformer), format!("{SERVER}\n"));
    }

    #[test]
    fn test_unsupported_directive_when_set_is_restricted() {
        let mut transformer = XmlTransformer::with_directives(["add"].into_iter().collect());
        transformer.load(&mut SERVER.as_bytes()).unwrap();

        let errors = validation_errors(
            transformer
                .transform(&single(
                    "/server/log",
                    Instruction::new("").with_directive("remove"),
                ))
                .unwrap_err(),
        );

        assert_eq!(
            errors.failures()[0].error,
            DirectiveError::Unsupported("remove".to_owned())
        );
    }

    #[test]
    fn test_empty_instructions_leave_document_unchanged() {
        let mut transformer = loaded(SERVER);
        transformer.transform(&Instructions::new()).unwrap();
        assert_eq!(saved(&transformer), format!("{SERVER}\n"));
    }

    #[test]
    fn test_transform_before_load() {
        let mut transformer = XmlTransformer::new();
        let err = transformer
            .transform(&single("/a", Instruction::new("x")))
            .unwrap_err();
        assert!(matches!(err, TransformError::NotLoaded));
    }

    #[test]
    fn test_save_before_load() {
        let transformer = XmlTransformer::new();
        let mut out = Vec::new();
        assert!(matches!(
            transformer.save(&mut out),
            Err(TransformError::NotLoaded)
        ));
    }

    #[test]
    fn test_load_malformed() {
        let mut transformer = XmlTransformer::new();
        let err = transformer.load(&mut "<a><b></a>".as_bytes()).unwrap_err();
        assert!(matches!(err, TransformError::MalformedDocument(_)));
        assert!(transformer.document().is_none());
    }

    #[test]
    fn test_load_replaces_previous_document() {
        let mut transformer = loaded(SERVER);

        transformer.load(&mut "<other><x/></other>".as_bytes()).unwrap();

        assert_eq!(saved(&transformer), "<other><x/></other>\n");
        let err = transformer
            .transform(&single("/server/name", Instruction::new("x")))
            .unwrap_err();
        assert!(matches!(err, TransformError::TargetNotFound { .. }));
    }

    #[test]
    fn test_failed_load_keeps_previous_document() {
        let mut transformer = loaded(SERVER);
        transformer
            .transform(&single("/server/name", Instruction::new("edited")))
            .unwrap();
        let before = saved(&transformer);

        let err = transformer.load(&mut "<broken><a></broken>".as_bytes()).unwrap_err();

        assert!(matches!(err, TransformError::MalformedDocument(_)));
        assert_eq!(saved(&transformer), before);
    }

    #[test]
    fn test_load_expands_internal_entity() {
        let mut transformer = XmlTransformer::new();
        transformer
            .load(&mut r#"<!DOCTYPE a [<!ENTITY x "hi">]><a>&x;</a>"#.as_bytes())
            .unwrap();

        let document = transformer.document().unwrap();
        assert_eq!(document.text_content(document.root()), "hi");
    }

    #[test]
    fn test_load_rejects_external_entity() {
        let xml = r#"<!DOCTYPE a [<!ENTITY x SYSTEM "file:///etc/passwd">]><a>&x;</a>"#;
        let mut transformer = XmlTransformer::new();
        let err = transformer.load(&mut xml.as_bytes()).unwrap_err();
        assert!(matches!(err, TransformError::MalformedDocument(_)));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("server.xml");
        let output = dir.path().join("out.xml");
        std::fs::write(&input, SERVER).unwrap();

        let mut transformer = XmlTransformer::new();
        transformer.load_file(&input).unwrap();
        transformer
            .transform(&single("//log", Instruction::new("").with_directive("remove")))
            .unwrap();
        transformer.save_file(&output).unwrap();

        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "<server><connector port=\"8080\"/><name>old</name></server>\n"
        );
    }

    /// Locator that always resolves to the document root.
    struct RootLocator;

    impl Locator for RootLocator {
        fn find_first(
            &self,
            document: &Document,
            _key: &str,
        ) -> Result<Option<Target>, crate::error::LocatorError> {
            Ok(Some(Target::Node(document.root())))
        }
    }

    #[test]
    fn test_custom_locator() {
        let mut transformer =
            XmlTransformer::with_locator([ADD, REMOVE].into_iter().collect(), RootLocator);
        transformer.load(&mut "<a>old</a>".as_bytes()).unwrap();

        transformer
            .transform(&single("anything", Instruction::new("new")))
            .unwrap();

        assert_eq!(saved(&transformer), "<a>new</a>\n");
    }
}
