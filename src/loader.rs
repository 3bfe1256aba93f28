use std::collections::BTreeMap;
use std::path::Path;
use std::{fs, io};

/// Key/value pairs of an environment file. Iteration order is key order.
pub type EnvMap = BTreeMap<String, String>;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("File {0} not found")]
    FileNotFound(String),

    #[error("Malformed line {line} in {path}: {reason}")]
    Malformed {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Unable to read {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// The sample file and, when present, the environment file it seeds. Loading
/// fails only on the sample; a missing environment file reads as empty.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Sources {
    pub sample: EnvMap,
    pub existing: EnvMap,
}

impl Sources {
    pub fn load(sample: &Path, existing: Option<&Path>) -> Result<Self, Error> {
        let sample = read(sample)?;
        let existing = match existing {
            Some(path) => read_optional(path)?,
            None => EnvMap::new(),
        };

        return Ok(Self { sample, existing });
    }

    /// Sample values overlaid with the existing ones.
    pub fn merged(&self) -> EnvMap {
        let mut merged = self.sample.clone();
        merged.extend(self.existing.clone());
        return merged;
    }
}

pub fn read(path: &Path) -> Result<EnvMap, Error> {
    let contents = match fs::read_to_string(path) {
        Ok(raw_contents) => Ok(raw_contents),
        Err(error) => match error.kind() {
            io::ErrorKind::NotFound => Err(Error::FileNotFound(path.display().to_string())),
            _ => Err(Error::Unreadable {
                path: path.display().to_string(),
                reason: error.to_string(),
            }),
        },
    }?;

    return parse(&contents).map_err(|(line, reason)| Error::Malformed {
        path: path.display().to_string(),
        line,
        reason,
    });
}

/// Same as [`read`], except that a missing file is an empty mapping.
pub fn read_optional(path: &Path) -> Result<EnvMap, Error> {
    return match read(path) {
        Err(Error::FileNotFound(_)) => Ok(EnvMap::new()),
        other => other,
    };
}

fn parse(contents: &str) -> Result<EnvMap, (usize, String)> {
    let mut values = EnvMap::new();

    for (index, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| (index + 1, String::from("expected KEY=VALUE")))?;
        let key = key.trim();
        if key.is_empty() {
            return Err((index + 1, String::from("empty key")));
        }

        values.insert(key.to_string(), value.trim().to_string());
    }

    return Ok(values);
}
