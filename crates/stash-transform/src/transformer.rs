//! Transformer protocol shared by every document format.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::directive::DirectiveSet;
use crate::error::{DirectiveError, TransformError, ValidationErrors, ValidationFailure};
use crate::instruction::{Instruction, Instructions};

/// Loads a document, applies keyed instructions to it, and saves it.
///
/// Implementors provide the format-specific pieces (`load`, `save`,
/// `apply_all` and optionally `validate_directives_internal`); validation and
/// the `transform` entry point are shared.
///
/// Validation always runs to completion: every unsupported or conflicting
/// directive of every instruction is reported together, and nothing is
/// applied unless all instructions are valid.
pub trait Transformer {
    /// Directives this transformer supports. Fixed at construction.
    fn directives(&self) -> &DirectiveSet;

    /// Parse a document from `input`, replacing any previously loaded one.
    ///
    /// The previous document is only dropped once the new one has parsed; a
    /// failed load leaves it loaded and unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::MalformedDocument`] if the input cannot be
    /// parsed, or an I/O error if reading fails.
    fn load(&mut self, input: &mut dyn Read) -> Result<(), TransformError>;

    /// Serialize the current document to `output`.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::NotLoaded`] before `load`, or an error if
    /// writing fails.
    fn save(&self, output: &mut dyn Write) -> Result<(), TransformError>;

    /// Format-specific directive checks for one instruction.
    ///
    /// Runs after the unsupported-directive check; every failure returned here
    /// is reported alongside those.
    fn validate_directives_internal(&self, _instruction: &Instruction) -> Vec<DirectiveError> {
        Vec::new()
    }

    /// Apply already-validated instructions to the loaded document.
    ///
    /// # Errors
    ///
    /// Stops at the first instruction that cannot be applied. Earlier
    /// instructions stay applied.
    fn apply_all(&mut self, instructions: &Instructions) -> Result<(), TransformError>;

    /// Whether the directive is supported (case-insensitive).
    fn supports(&self, name: &str) -> bool {
        self.directives().contains(name)
    }

    /// Check one instruction's directives.
    ///
    /// # Errors
    ///
    /// Returns every failure found: one per unsupported directive, followed
    /// by the format-specific ones.
    fn validate_directives(&self, instruction: &Instruction) -> Result<(), Vec<DirectiveError>> {
        let mut errors: Vec<DirectiveError> = instruction
            .directives
            .iter()
            .filter(|name| !self.supports(name))
            .map(|name| DirectiveError::Unsupported(name.clone()))
            .collect();
        errors.extend(self.validate_directives_internal(instruction));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Check every instruction, collecting all failures tagged with their key.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] holding every failure of every instruction.
    fn validate(&self, instructions: &Instructions) -> Result<(), ValidationErrors> {
        let mut failures = Vec::new();
        for (key, instruction) in instructions {
            if let Err(errors) = self.validate_directives(instruction) {
                failures.extend(errors.into_iter().map(|error| ValidationFailure {
                    key: key.clone(),
                    error,
                }));
            }
        }

        match ValidationErrors::from_failures(failures) {
            None => Ok(()),
            Some(errors) => Err(errors),
        }
    }

    /// Validate all instructions, then apply them.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Validation`] without touching the document
    /// if any instruction is invalid; otherwise returns the first apply
    /// failure.
    fn transform(&mut self, instructions: &Instructions) -> Result<(), TransformError> {
        if let Err(errors) = self.validate(instructions) {
            tracing::error!(
                failures = errors.len(),
                "Directive validation failed, document left unchanged"
            );
            for failure in &errors {
                tracing::debug!(key = %failure.key, error = %failure.error, "Invalid instruction");
            }
            return Err(errors.into());
        }

        tracing::debug!(count = instructions.len(), "Applying instructions");
        self.apply_all(instructions)
    }

    /// Load a document from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsed.
    fn load_file(&mut self, path: &Path) -> Result<(), TransformError> {
        let mut input = BufReader::new(File::open(path)?);
        self.load(&mut input)
    }

    /// Save the document to a file, creating or truncating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    fn save_file(&self, path: &Path) -> Result<(), TransformError> {
        let mut output = BufWriter::new(File::create(path)?);
        self.save(&mut output)?;
        output.flush()?;
        Ok(())
    }
}
