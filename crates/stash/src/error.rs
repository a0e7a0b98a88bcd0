//! CLI error types.

use stash_config::ConfigError;
use stash_transform::TransformError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Transform(#[from] TransformError),
}
