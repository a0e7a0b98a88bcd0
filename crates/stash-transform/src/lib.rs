//! Directive-driven document transformation for Stash.
//!
//! A transformer loads a document, applies a batch of keyed
//! [`Instruction`]s to it and saves the result:
//! - [`Transformer`]: shared protocol with directive validation
//! - [`XmlTransformer`](xml::XmlTransformer): XML implementation with
//!   `add` (structural merge), `remove` and text replacement
//!
//! # Example
//!
//! ```ignore
//! use stash_transform::xml::XmlTransformer;
//! use stash_transform::{Instruction, Instructions, Transformer};
//!
//! let mut transformer = XmlTransformer::new();
//! transformer.load(&mut r#"<server><port>80</port></server>"#.as_bytes())?;
//!
//! let mut instructions = Instructions::new();
//! instructions.insert("/server/port".to_owned(), Instruction::new("8080"));
//! transformer.transform(&instructions)?;
//!
//! transformer.save(&mut std::io::stdout())?;
//! ```
//!
//! Validation runs over every instruction before anything is applied, so a
//! rejected batch reports all of its problems at once and leaves the document
//! untouched.

// Directives and instructions
mod directive;
pub use directive::{ADD, Directive, DirectiveSet, REMOVE};
mod instruction;
pub use instruction::{Instruction, Instructions};

// Transformer protocol
mod transformer;
pub use transformer::Transformer;

// XML implementation
pub mod xml;

// Errors
pub mod error;
pub use error::{
    DirectiveError, LocatorError, TransformError, ValidationErrors, ValidationFailure, XmlError,
};
