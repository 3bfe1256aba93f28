use std::fs;
use std::path::Path;

use crate::loader::EnvMap;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("{0:?} cannot be used as a key")]
    InvalidKey(String),

    #[error("Value of {0} contains a line break")]
    MultilineValue(String),

    #[error("Value of {0} has leading or trailing whitespace")]
    PaddedValue(String),

    #[error("Unable to write {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Merges the sources in increasing precedence: sample defaults, then the
/// existing file, then freshly computed values.
pub fn merge(sample: &EnvMap, existing: &EnvMap, updates: &EnvMap) -> EnvMap {
    let init = sample.clone();
    return [existing, updates]
        .into_iter()
        .flatten()
        .fold(init, |mut acc, (key, value)| {
            acc.insert(key.clone(), value.clone());
            return acc;
        });
}

pub fn render(values: &EnvMap) -> Result<String, Error> {
    let mut contents = String::new();
    for (key, value) in values {
        if !is_valid_key(key) {
            return Err(Error::InvalidKey(key.clone()));
        }
        if value.contains('\n') || value.contains('\r') {
            return Err(Error::MultilineValue(key.clone()));
        }
        // The loader trims values, so padding would not survive a reload.
        if value.trim() != value {
            return Err(Error::PaddedValue(key.clone()));
        }

        contents.push_str(&format!("{}={}\n", key, value));
    }

    return Ok(contents);
}

fn is_valid_key(key: &str) -> bool {
    return !key.is_empty()
        && !key.starts_with('#')
        && key.trim() == key
        && !key.contains(|c: char| c == '=' || c == '\n' || c == '\r');
}

/// Replaces the file at `path` with one sorted `KEY=VALUE` line per entry.
pub fn write(path: &Path, values: &EnvMap) -> Result<(), Error> {
    let file_contents = render(values)?;
    fs::write(path, file_contents).map_err(|error| Error::Io {
        path: path.display().to_string(),
        reason: error.to_string(),
    })?;

    tracing::info!(path = %path.display(), keys = values.len(), "wrote environment file");
    return Ok(());
}
