//! `stash check` command implementation.

use std::path::PathBuf;

use clap::Args;
use stash_config::{CliSettings, Config, PatchFile};
use stash_transform::xml::XmlTransformer;
use stash_transform::{DirectiveSet, Instructions, TransformError, Transformer, ValidationErrors};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the check command.
#[derive(Args)]
pub(crate) struct CheckArgs {
    /// Path to the patch file (TOML).
    patch: PathBuf,

    /// Path to configuration file (default: auto-discover stash.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Supported directive (repeatable, overrides config).
    #[arg(long = "directive", value_name = "NAME")]
    directives: Vec<String>,
}

impl CheckArgs {
    /// Execute the check command.
    ///
    /// Values are not expanded: only directives are checked.
    ///
    /// # Errors
    ///
    /// Returns an error if the patch cannot be loaded or any instruction is
    /// invalid.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            directives: (!self.directives.is_empty()).then(|| self.directives.clone()),
            ..Default::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let patch = PatchFile::load(&self.patch, false)?;

        if let Err(errors) = check_patch(&patch.instructions, config.directive_set()) {
            output.failures(&errors);
            return Err(TransformError::from(errors).into());
        }

        output.success(&format!(
            "{}: {} instruction(s) OK",
            self.patch.display(),
            patch.instructions.len()
        ));
        Ok(())
    }
}

/// Validate every instruction against `directives` without loading a document.
fn check_patch(
    instructions: &Instructions,
    directives: DirectiveSet,
) -> Result<(), ValidationErrors> {
    XmlTransformer::with_directives(directives).validate(instructions)
}
