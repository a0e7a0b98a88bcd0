//! Environment variable expansion for configuration and patch strings.
//!
//! Only braced references are recognized:
//! - `${VAR}` expands to the value of VAR and fails if it is unset
//! - `${VAR:-default}` falls back to `default` when VAR is unset
//!
//! Patch values are arbitrary markup, so a bare `$` is always literal.

use crate::ConfigError;

/// Expand `${...}` references in a string, leaving every other `$` alone.
///
/// Each braced reference is handed to shellexpand on its own, so a bare
/// `$VAR` or `$5` next to a `${VAR}` stays literal. An unterminated `${`
/// is copied through as text.
///
/// `field` names the config field or patch key in error messages.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        expanded.push_str(&rest[..start]);
        let reference = &rest[start..=start + len];
        expanded.push_str(&expand_reference(reference, field)?);
        rest = &rest[start + len + 1..];
    }
    expanded.push_str(rest);

    Ok(expanded)
}

/// Expand a single `${VAR}` or `${VAR:-default}` token.
fn expand_reference(reference: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::env_with_context(reference, |var| -> Result<Option<String>, LookupError> {
        std::env::var(var).map(Some).map_err(|_| LookupError {
            var_name: var.to_owned(),
        })
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.cause.var_name),
    })
}

/// Variable named by a reference that has no value and no default.
struct LookupError {
    var_name: String,
}
