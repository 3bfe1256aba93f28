use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bootstrap::{Plan, TableSource};
use crate::cli::{BootstrapLocalArgs, Cli, Command, ResourceSource};
use crate::config::Settings;
use crate::deploy::CommandDeployer;
use crate::dynamo::DynamoTables;
use crate::environment::LocalSettings;
use crate::error::Error;
use crate::outputs::CloudFormation;
use crate::resources::{STORAGE_STACK, USERS_TABLE};
use crate::s3::S3Buckets;

pub mod aws;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod deploy;
pub mod dynamo;
pub mod environment;
pub mod error;
pub mod loader;
pub mod outputs;
pub mod resources;
pub mod s3;
pub mod sync;
pub mod writer;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("STACK_ENV_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Sync(args) => sync(args).await,
        Command::BootstrapLocal(args) => bootstrap_local(args).await,
    };

    return match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{}", error);
            ExitCode::FAILURE
        }
    };
}

async fn sync(args: cli::SyncArgs) -> Result<(), Error> {
    let settings = Settings::from_args(args)?;
    tracing::info!(
        app = %settings.app_name,
        stage = settings.stage.name(),
        "syncing environment file"
    );

    let sdk_config = aws::cloud_config(&settings.region).await;
    let stacks = CloudFormation::new(&sdk_config);
    let deployer = CommandDeployer {
        command: settings.manifest.deploy_command.clone(),
        envs: vec![
            (String::from("STAGE"), settings.stage.cloud_name().to_string()),
            (String::from("AWS_REGION"), settings.region.clone()),
        ],
    };

    sync::run(&settings, &stacks, &deployer).await?;
    return Ok(());
}

async fn bootstrap_local(args: BootstrapLocalArgs) -> Result<(), Error> {
    let env_file = loader::read_optional(&args.env_file)?;
    let settings = LocalSettings::resolve(&env_file)?;
    tracing::info!(
        app = %settings.app_name,
        stage = settings.stage.name(),
        "starting local resource creation"
    );

    let local_tables = DynamoTables::new(
        &aws::local_config(&settings.region, &settings.dynamo_endpoint).await,
    );
    let local_buckets =
        S3Buckets::new(&aws::local_config(&settings.region, &settings.s3_endpoint).await);

    match args.source {
        ResourceSource::Cloud => {
            let naming = settings.cloud_naming();
            let sdk_config = aws::cloud_config(&settings.region).await;
            let outputs = outputs::get_outputs(
                &CloudFormation::new(&sdk_config),
                &naming.resource(STORAGE_STACK),
                None,
            )
            .await?;
            let cloud_tables = DynamoTables::new(&sdk_config);

            let plan = Plan {
                tables: TableSource::Mirror {
                    cloud: &cloud_tables,
                    table_names: outputs.resource_list("tables")?,
                },
                users_table: naming.resource(USERS_TABLE),
                buckets: outputs.resource_list("buckets")?,
            };
            bootstrap::run(&local_tables, &local_buckets, plan).await?;
        }
        ResourceSource::Builtin => {
            let plan = Plan::builtin(&settings.resources)?;
            bootstrap::run(&local_tables, &local_buckets, plan).await?;
        }
    }

    tracing::info!("local resources ready");
    return Ok(());
}
