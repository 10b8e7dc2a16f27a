//! Common utilities and helper functions.

use std::path::{Path, PathBuf};

use regex::{Captures, Regex};

/// Replaces environment variable placeholders in a string.
///
/// Placeholders use the format `${env:VAR_NAME}`. If the variable is not
/// set, the placeholder is replaced with an empty string. Anything else
/// inside `${...}` is left as is.
///
/// # Example
///
/// ```rust
/// use formc::utils::replace_env_placeholders;
///
/// unsafe { std::env::set_var("FORMC_DOC_VAR", "hello"); }
/// let result = replace_env_placeholders("Value: ${env:FORMC_DOC_VAR}").unwrap();
/// assert_eq!(result, "Value: hello");
/// ```
pub fn replace_env_placeholders(input: &str) -> anyhow::Result<String> {
    let re = Regex::new(r"\$\{env:([^{}]*)\}")?;

    let out = re.replace_all(input, |caps: &Captures| {
        let name = &caps[1];
        match std::env::var(name) {
            Ok(value) => {
                debug!("using {name} from the environment");
                value
            }
            Err(_) => {
                warn!("environment variable {name} is not set");
                String::new()
            }
        }
    });
    Ok(out.into_owned())
}

/// Resolve `path` against `base` unless it is absolute.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// File extension as a `&str`, empty when absent.
pub fn extension(path: &Path) -> &str {
    path.extension().and_then(|s| s.to_str()).unwrap_or("")
}
