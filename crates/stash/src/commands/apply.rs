//! `stash apply` command implementation.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use stash_config::{CliSettings, Config, PatchFile};
use stash_transform::xml::XmlTransformer;
use stash_transform::{DirectiveSet, Instructions, TransformError, Transformer};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the apply command.
#[derive(Args)]
pub(crate) struct ApplyArgs {
    /// Path to the XML document.
    document: PathBuf,

    /// Path to the patch file (TOML).
    patch: PathBuf,

    /// Write the result here instead of overwriting the document.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover stash.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Supported directive (repeatable, overrides config).
    #[arg(long = "directive", value_name = "NAME")]
    directives: Vec<String>,

    /// Expand ${VAR} references in patch values.
    #[arg(long, env = "STASH_EXPAND_ENV")]
    expand_env: bool,

    /// Print the patched document to stdout instead of saving it.
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl ApplyArgs {
    /// Execute the apply command.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, validation, transformation or saving fails.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            directives: (!self.directives.is_empty()).then(|| self.directives.clone()),
            expand_env: self.expand_env.then_some(true),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let patch = PatchFile::load(&self.patch, config.patch.expand_env)?;

        output.info(&format!(
            "Applying {} instruction(s) to {}...",
            patch.instructions.len(),
            self.document.display()
        ));
        let transformer =
            apply_patch(&self.document, &patch.instructions, config.directive_set())
                .inspect_err(|err| {
                    if let CliError::Transform(TransformError::Validation(errors)) = err {
                        output.failures(errors);
                    }
                })?;

        if self.dry_run {
            output.highlight("\n[DRY RUN] Document not saved.");
            let mut stdout = std::io::stdout().lock();
            transformer.save(&mut stdout)?;
            stdout.flush()?;
            return Ok(());
        }

        let destination = self.output.as_deref().unwrap_or(&self.document);
        transformer.save_file(destination)?;
        output.success(&format!("Saved {}", destination.display()));
        Ok(())
    }
}

/// Load `document` and apply `instructions` to it.
fn apply_patch(
    document: &Path,
    instructions: &Instructions,
    directives: DirectiveSet,
) -> Result<XmlTransformer, CliError> {
    let mut transformer = XmlTransformer::with_directives(directives);
    transformer.load_file(document)?;
    transformer.transform(instructions)?;
    tracing::info!(
        document = %document.display(),
        count = instructions.len(),
        "Applied patch"
    );
    Ok(transformer)
}
