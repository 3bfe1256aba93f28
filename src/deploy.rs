use async_trait::async_trait;
use tokio::process::Command;

#[cfg(test)]
use mockall::automock;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Deploy command is empty")]
    EmptyCommand,

    #[error("Unable to start `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Deploying {stack_name} failed with exit code {code:?}")]
    Failed {
        stack_name: String,
        code: Option<i32>,
    },
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, stack_name: &str) -> Result<(), Error>;
}

/// Runs the infrastructure-as-code CLI with the stack name appended.
pub struct CommandDeployer {
    pub command: Vec<String>,
    pub envs: Vec<(String, String)>,
}

#[async_trait]
impl Deployer for CommandDeployer {
    async fn deploy(&self, stack_name: &str) -> Result<(), Error> {
        let (program, args) = self.command.split_first().ok_or(Error::EmptyCommand)?;

        tracing::info!(stack = stack_name, command = ?self.command, "deploying stack");
        let status = Command::new(program)
            .args(args)
            .arg(stack_name)
            .envs(self.envs.iter().map(|(key, value)| (key, value)))
            .status()
            .await
            .map_err(|error| Error::Spawn {
                program: program.clone(),
                reason: error.to_string(),
            })?;

        if !status.success() {
            return Err(Error::Failed {
                stack_name: stack_name.to_string(),
                code: status.code(),
            });
        }

        return Ok(());
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::{CommandDeployer, Deployer, Error};

    fn deployer(command: &[&str]) -> CommandDeployer {
        CommandDeployer {
            command: command.iter().map(|part| part.to_string()).collect(),
            envs: vec![(String::from("STAGE"), String::from("dev"))],
        }
    }

    #[tokio::test]
    async fn succeeds_when_the_command_succeeds() {
        assert_eq!(Ok(()), deployer(&["true"]).deploy("shop-dev-ecr-stack").await);
    }

    #[tokio::test]
    async fn propagates_the_exit_code() {
        let result = deployer(&["false"]).deploy("shop-dev-ecr-stack").await;

        assert_eq!(
            Err(Error::Failed {
                stack_name: String::from("shop-dev-ecr-stack"),
                code: Some(1),
            }),
            result
        );
    }

    #[tokio::test]
    async fn passes_the_stack_name_and_environment() {
        let result = deployer(&["sh", "-c", "test \"$0\" = shop-dev-ecr-stack && test \"$STAGE\" = dev"])
            .deploy("shop-dev-ecr-stack")
            .await;

        assert_eq!(Ok(()), result);
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let result = deployer(&["definitely-not-a-real-deploy-tool"])
            .deploy("shop-dev-ecr-stack")
            .await;

        assert!(matches!(result, Err(Error::Spawn { .. })));
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        assert_eq!(Err(Error::EmptyCommand), deployer(&[]).deploy("stack").await);
    }
}
