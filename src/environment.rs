use crate::config::{Naming, Stage};
use crate::loader::EnvMap;
use crate::resources::ResourceNames;

pub const REQUIRED_VARIABLES: [&str; 5] = [
    "APP_NAME",
    "STAGE",
    "DYNAMO_DB_ENDPOINT",
    "S3_ENDPOINT",
    "REGION",
];

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),
}

/// Looks every name up and reports all of the missing ones at once. Empty
/// values count as missing.
pub fn require<F>(names: &[&str], lookup: F) -> Result<EnvMap, Error>
where
    F: Fn(&str) -> Option<String>,
{
    let mut found = EnvMap::new();
    let mut missing = vec![];

    for name in names {
        match lookup(name).filter(|value| !value.is_empty()) {
            Some(value) => {
                found.insert(name.to_string(), value);
            }
            None => missing.push(name.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(Error::Missing(missing));
    }
    return Ok(found);
}

/// Resolved configuration of a `bootstrap-local` run.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSettings {
    pub app_name: String,
    pub stage: Stage,
    pub dynamo_endpoint: String,
    pub s3_endpoint: String,
    pub region: String,
    pub resources: ResourceNames,
}

impl LocalSettings {
    /// The process environment wins over the values read from the env file.
    pub fn resolve(env_file: &EnvMap) -> Result<Self, Error> {
        return Self::from_lookup(|name| {
            std::env::var(name)
                .ok()
                .filter(|value| !value.is_empty())
                .or_else(|| env_file.get(name).cloned())
        });
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let values = require(&REQUIRED_VARIABLES, &lookup)?;
        let get = |name: &str| values.get(name).cloned().unwrap_or_default();

        let app_name = get("APP_NAME");
        let stage = Stage::parse(&get("STAGE"));
        let resources = ResourceNames::resolve(&Naming::new(&app_name, stage.name()), &lookup);

        return Ok(Self {
            app_name,
            stage,
            dynamo_endpoint: get("DYNAMO_DB_ENDPOINT"),
            s3_endpoint: get("S3_ENDPOINT"),
            region: get("REGION"),
            resources,
        });
    }

    /// Names of the deployed resources mirrored from the cloud.
    pub fn cloud_naming(&self) -> Naming {
        return Naming::new(&self.app_name, self.stage.cloud_name());
    }
}
