//! `sync`: folds stack outputs and stage settings into the environment file.

use crate::config::{Settings, Stage};
use crate::deploy::Deployer;
use crate::error::Error;
use crate::loader::{EnvMap, Sources};
use crate::outputs::{self, StackBackend};
use crate::resources::ResourceNames;
use crate::writer;

pub const LOCAL_DYNAMO_DB_ENDPOINT: &str = "http://localhost:8000";
pub const LOCAL_S3_ENDPOINT: &str = "http://localhost:9090";
pub const LOCAL_PORT_KEY: &str = "LOCAL_EXPRESS_PORT";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum LocalPortError {
    #[error("LOCAL_EXPRESS_PORT is required for the local stage")]
    Missing,

    #[error("LOCAL_EXPRESS_PORT={0} is not a port number")]
    Invalid(String),
}

pub async fn run(
    settings: &Settings,
    stacks: &dyn StackBackend,
    deployer: &dyn Deployer,
) -> Result<EnvMap, Error> {
    let sources = Sources::load(&settings.sample_path, Some(&settings.env_path))?;

    let stack_values = collect_stack_outputs(settings, stacks, deployer).await?;
    let updates = compute_updates(settings, &sources.merged(), stack_values)?;

    let merged = writer::merge(&sources.sample, &sources.existing, &updates);
    writer::write(&settings.env_path, &merged)?;

    return Ok(merged);
}

async fn collect_stack_outputs(
    settings: &Settings,
    stacks: &dyn StackBackend,
    deployer: &dyn Deployer,
) -> Result<EnvMap, Error> {
    let naming = settings.naming();
    let mut values = EnvMap::new();

    for entry in &settings.manifest.stacks {
        let stack_name = naming.resource(&entry.name);
        if entry.deploy {
            deployer.deploy(&stack_name).await?;
        }

        match outputs::get_outputs(stacks, &stack_name, entry.region.clone()).await {
            Ok(outputs) => values.extend(outputs.as_env()),
            Err(outputs::Error::NotFoundError(_)) if entry.optional => {
                tracing::warn!(stack = %stack_name, "optional stack not found, skipping");
            }
            Err(error) => return Err(error.into()),
        }
    }

    return Ok(values);
}

/// Values owned by this tool. Stack outputs rank below the fixed settings.
pub fn compute_updates(
    settings: &Settings,
    loaded: &EnvMap,
    stack_values: EnvMap,
) -> Result<EnvMap, LocalPortError> {
    let naming = settings.naming();
    let mut updates = stack_values;

    let (dynamo_endpoint, s3_endpoint) = match settings.stage {
        Stage::Local => (LOCAL_DYNAMO_DB_ENDPOINT, LOCAL_S3_ENDPOINT),
        Stage::Deployed(_) => ("", ""),
    };

    let fixed = [
        ("APP_NAME", settings.app_name.clone()),
        ("STAGE", settings.stage.name().to_string()),
        ("REGION", settings.region.clone()),
        ("AWS_REGION", settings.region.clone()),
        ("ECR_REGISTRY", settings.ecr.clone()),
        ("DYNAMO_DB_ENDPOINT", dynamo_endpoint.to_string()),
        ("S3_ENDPOINT", s3_endpoint.to_string()),
    ];
    let names = ResourceNames::from_naming(&naming).as_env();
    for (key, value) in fixed.into_iter().chain(names) {
        updates.insert(key.to_string(), value);
    }

    if settings.stage.is_local() {
        updates.insert(String::from("API_URL"), local_api_url(loaded)?);
    }

    return Ok(updates);
}

fn local_api_url(loaded: &EnvMap) -> Result<String, LocalPortError> {
    let raw = loaded.get(LOCAL_PORT_KEY).ok_or(LocalPortError::Missing)?;
    let port: u16 = raw
        .parse()
        .map_err(|_| LocalPortError::Invalid(raw.clone()))?;

    return Ok(format!("http://localhost:{}", port));
}
