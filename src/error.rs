use aws_sdk_dynamodb::error::BuildError;

use crate::sync::LocalPortError;
use crate::{bootstrap, config, deploy, environment, loader, outputs, writer};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Unable to read configuration: {0}")]
    ConfigRead(#[from] loader::Error),

    #[error("Invalid manifest: {0}")]
    Manifest(#[from] config::Error),

    #[error(transparent)]
    MissingEnvironment(#[from] environment::Error),

    #[error(transparent)]
    LocalPort(#[from] LocalPortError),

    #[error(transparent)]
    Stack(#[from] outputs::Error),

    #[error(transparent)]
    Deploy(#[from] deploy::Error),

    #[error(transparent)]
    Provision(#[from] bootstrap::Error),

    #[error("Invalid built-in table schema: {0}")]
    Schema(#[from] BuildError),

    #[error("Unable to write the environment file: {0}")]
    Write(#[from] writer::Error),
}
