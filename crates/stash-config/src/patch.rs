//! Patch files: TOML tables mapping locator keys to instructions.
//!
//! ```toml
//! "/server/port" = "8080"                 # replace text content
//!
//! ["/server"]
//! value = '<connector port="8443"/>'
//! directives = ["add"]
//!
//! ["/server/log"]
//! directives = ["remove"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use stash_transform::{Instruction, Instructions};

use crate::{ConfigError, expand};

/// Instruction as written in a patch file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawInstruction {
    /// Bare string: replace the target's text content.
    Replace(String),
    /// Table with an optional value and directive list.
    Full {
        #[serde(default)]
        value: String,
        #[serde(default)]
        directives: Vec<String>,
    },
}

impl RawInstruction {
    fn into_instruction(self) -> Instruction {
        match self {
            Self::Replace(value) => Instruction::new(value),
            Self::Full { value, directives } => Instruction { value, directives },
        }
    }
}

/// Loaded patch file.
#[derive(Debug)]
pub struct PatchFile {
    /// Where the patch was read from.
    pub path: PathBuf,
    /// Instructions keyed by locator expression.
    pub instructions: Instructions,
}

impl PatchFile {
    /// Load a patch file.
    ///
    /// When `expand_env` is set, `${VAR}` references in instruction values are
    /// expanded; failures name the instruction key.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, if a key is
    /// empty, or if expansion references an unset variable.
    pub fn load(path: &Path, expand_env: bool) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let instructions = Self::parse(&content, expand_env)?;
        tracing::debug!(
            path = %path.display(),
            count = instructions.len(),
            "Loaded patch file"
        );
        Ok(Self {
            path: path.to_path_buf(),
            instructions,
        })
    }

    /// Parse patch file content.
    ///
    /// # Errors
    ///
    /// Same as [`PatchFile::load`], minus I/O.
    pub fn parse(content: &str, expand_env: bool) -> Result<Instructions, ConfigError> {
        let raw: BTreeMap<String, RawInstruction> = toml::from_str(content)?;

        raw.into_iter()
            .map(|(key, raw)| {
                if key.trim().is_empty() {
                    return Err(ConfigError::Validation(
                        "patch keys cannot be empty".to_owned(),
                    ));
                }
                let mut instruction = raw.into_instruction();
                if expand_env {
                    instruction.value = expand::expand_env(&instruction.value, &key)?;
                }
                Ok((key, instruction))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_replace_shorthand() {
        let instructions = PatchFile::parse(r#""/server/port" = "8080""#, false).unwrap();

        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions["/server/port"], Instruction::new("8080"));
    }

    #[test]
    fn test_parse_tables() {
        let toml = r#"
["/server"]
value = '<connector port="8443"/>'
directives = ["add"]

["/server/log"]
directives = ["remove"]
"#;
        let instructions = PatchFile::parse(toml, false).unwrap();

        assert_eq!(
            instructions["/server"],
            Instruction::new(r#"<connector port="8443"/>"#).with_directive("add")
        );
        assert_eq!(
            instructions["/server/log"],
            Instruction::new("").with_directive("remove")
        );
    }

    #[test]
    fn test_parse_keeps_unknown_directives() {
        let toml = r#"
["/a"]
value = "x"
directives = ["rename", "add"]
"#;
        let instructions = PatchFile::parse(toml, false).unwrap();
        assert_eq!(instructions["/a"].directives, vec!["rename", "add"]);
    }

    #[test]
    fn test_parse_orders_by_key() {
        let toml = r#"
"/b" = "2"
"/a" = "1"
"/c" = "3"
"#;
        let instructions = PatchFile::parse(toml, false).unwrap();
        let keys: Vec<&str> = instructions.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn test_parse_rejects_empty_key() {
        let err = PatchFile::parse(r#""" = "x""#, false).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        let err = PatchFile::parse(r#""/a" = 42"#, false).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_parse_without_expansion_keeps_references() {
        let instructions = PatchFile::parse(r#""/a" = "${STASH_PATCH_UNSET}""#, false).unwrap();
        assert_eq!(instructions["/a"].value, "${STASH_PATCH_UNSET}");
    }

    #[test]
    fn test_parse_expands_values() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("STASH_PATCH_PORT", "9443");
        }
        let toml = r#"
["/server"]
value = '<connector port="${STASH_PATCH_PORT}"/>'
directives = ["add"]
"#;
        let instructions = PatchFile::parse(toml, true).unwrap();

        assert_eq!(instructions["/server"].value, r#"<connector port="9443"/>"#);
        unsafe {
            std::env::remove_var("STASH_PATCH_PORT");
        }
    }

    #[test]
    fn test_parse_expansion_error_names_key() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("STASH_PATCH_MISSING");
        }
        let err = PatchFile::parse(r#""/server/name" = "${STASH_PATCH_MISSING}""#, true)
            .unwrap_err();

        assert!(
            matches!(err, ConfigError::EnvVar { ref field, .. } if field == "/server/name"),
            "Expected EnvVar error, got {err:?}"
        );
    }

    #[test]
    fn test_parse_expansion_keeps_bare_dollar() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("STASH_PATCH_PRICE_PORT", "8080");
        }
        let instructions =
            PatchFile::parse(r#""/server" = 'port ${STASH_PATCH_PRICE_PORT} costs $5'"#, true)
                .unwrap();

        assert_eq!(instructions["/server"].value, "port 8080 costs $5");
        unsafe {
            std::env::remove_var("STASH_PATCH_PRICE_PORT");
        }
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.toml");
        std::fs::write(&path, "\"/a/b\" = \"value\"\n").unwrap();

        let patch = PatchFile::load(&path, false).unwrap();

        assert_eq!(patch.path, path);
        assert_eq!(patch.instructions["/a/b"].value, "value");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PatchFile::load(&dir.path().join("missing.toml"), false).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
