use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path, path::PathBuf};
use validator::{Validate, ValidationError};

use crate::cli::SyncArgs;
use crate::resources::STORAGE_STACK;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("File {0} not found")]
    FileNotFound(String),

    #[error("Parsing error: {0}")]
    ParsingError(String),

    #[error("Validation errors: {0}")]
    ValidationError(String),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

/// Stacks whose outputs are folded into the environment file.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Manifest {
    #[serde(default = "default_deploy_command")]
    #[validate(length(min = 1, message = "The deploy command cannot be empty"))]
    pub deploy_command: Vec<String>,

    #[serde(default = "default_stacks")]
    #[validate]
    pub stacks: Vec<StackEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StackEntry {
    /// Suffix appended to `{app}-{stage}-`.
    #[validate(custom = "validate_stack_name")]
    pub name: String,

    pub region: Option<String>,

    #[serde(default)]
    pub deploy: bool,

    #[serde(default)]
    pub optional: bool,
}

impl Default for Manifest {
    fn default() -> Self {
        return Self {
            deploy_command: default_deploy_command(),
            stacks: default_stacks(),
        };
    }
}

fn default_deploy_command() -> Vec<String> {
    return ["npx", "cdk", "deploy", "--require-approval", "never"]
        .iter()
        .map(|part| part.to_string())
        .collect();
}

fn default_stacks() -> Vec<StackEntry> {
    return vec![StackEntry {
        name: STORAGE_STACK.to_string(),
        region: None,
        deploy: false,
        optional: false,
    }];
}

pub fn parse(path: &Path) -> Result<Manifest, Error> {
    let contents = match fs::read_to_string(path) {
        Ok(raw_contents) => Ok(raw_contents),
        Err(error) => match error.kind() {
            io::ErrorKind::NotFound => Err(Error::FileNotFound(path.display().to_string())),
            _ => Err(Error::Unknown(error.to_string())),
        },
    }?;

    let manifest: Manifest = match serde_yaml::from_str(&contents) {
        Ok(data) => Ok(data),
        Err(error) => Err(Error::ParsingError(error.to_string())),
    }?;

    match manifest.validate() {
        Ok(_) => (),
        Err(error) => return Err(Error::ValidationError(error.to_string())),
    }

    return Ok(manifest);
}

fn validate_stack_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::new("The stack name cannot be empty"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::new(
            "The stack name may only contain alphanumerics and `-`",
        ));
    }

    return Ok(());
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Local,
    Deployed(String),
}

impl Stage {
    pub fn parse(stage: &str) -> Self {
        return match stage {
            "local" => Stage::Local,
            other => Stage::Deployed(other.to_string()),
        };
    }

    pub fn name(&self) -> &str {
        return match self {
            Stage::Local => "local",
            Stage::Deployed(name) => name,
        };
    }

    /// The stage whose cloud resources back this one. Local runs against `dev`.
    pub fn cloud_name(&self) -> &str {
        return match self {
            Stage::Local => "dev",
            Stage::Deployed(name) => name,
        };
    }

    pub fn is_local(&self) -> bool {
        return matches!(self, Stage::Local);
    }
}

/// `{app}-{stage}-{resource}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    prefix: String,
}

impl Naming {
    pub fn new(app_name: &str, stage: &str) -> Self {
        return Self {
            prefix: format!("{}-{}", app_name, stage),
        };
    }

    pub fn resource(&self, name: &str) -> String {
        return format!("{}-{}", self.prefix, name);
    }
}

/// Everything `sync` needs, resolved once from the command line.
#[derive(Debug)]
pub struct Settings {
    pub app_name: String,
    pub region: String,
    pub stage: Stage,
    pub ecr: String,
    pub sample_path: PathBuf,
    pub env_path: PathBuf,
    pub manifest: Manifest,
}

impl Settings {
    pub fn from_args(args: SyncArgs) -> Result<Self, Error> {
        let manifest = match &args.manifest {
            Some(path) => parse(path)?,
            None => Manifest::default(),
        };

        return Ok(Self {
            app_name: args.app_name,
            region: args.region,
            stage: Stage::parse(&args.stage),
            ecr: args.ecr,
            sample_path: args.sample,
            env_path: args.env_file,
            manifest,
        });
    }

    /// Naming convention of the cloud resources this stage reads from.
    pub fn naming(&self) -> Naming {
        return Naming::new(&self.app_name, self.stage.cloud_name());
    }
}
