use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_types::SdkConfig;

#[cfg(test)]
use mockall::automock;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Service error ocurred: {0}.")]
    ServiceError(String),

    #[error("Stack {0} not found")]
    NotFoundError(String),

    #[error("Output {key} of stack {stack_name} is not a JSON list of names: {reason}")]
    MalformedOutput {
        stack_name: String,
        key: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutput {
    pub key: Option<String>,
    pub value: Option<String>,
}

/// Read side of CloudFormation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StackBackend: Send + Sync {
    /// `Ok(None)` when no stack with that name exists.
    async fn describe_outputs(
        &self,
        stack_name: &str,
        region: Option<String>,
    ) -> Result<Option<Vec<StackOutput>>, Error>;
}

pub struct CloudFormation {
    sdk_config: SdkConfig,
    client: aws_sdk_cloudformation::Client,
}

impl CloudFormation {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        let client = aws_sdk_cloudformation::Client::new(sdk_config);
        return Self {
            sdk_config: sdk_config.clone(),
            client,
        };
    }

    fn client_for(&self, region: Option<String>) -> aws_sdk_cloudformation::Client {
        return match region {
            Some(region) => {
                let config = aws_sdk_cloudformation::config::Builder::from(&self.sdk_config)
                    .region(aws_sdk_cloudformation::config::Region::new(region))
                    .build();
                aws_sdk_cloudformation::Client::from_conf(config)
            }
            None => self.client.clone(),
        };
    }
}

#[async_trait]
impl StackBackend for CloudFormation {
    async fn describe_outputs(
        &self,
        stack_name: &str,
        region: Option<String>,
    ) -> Result<Option<Vec<StackOutput>>, Error> {
        let result = self
            .client_for(region)
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await;

        let result = match result {
            Ok(data) => data,
            Err(err) => {
                let context = DisplayErrorContext(&err).to_string();
                let service_error = err.into_service_error();
                // CFN reports unknown stacks as a generic validation failure.
                let missing = service_error.code() == Some("ValidationError")
                    && service_error
                        .message()
                        .map_or(false, |message| message.contains("does not exist"));
                if missing {
                    return Ok(None);
                }
                return Err(Error::ServiceError(context));
            }
        };

        let stack = match result.stacks().first() {
            Some(stack) => stack,
            None => return Ok(None),
        };

        let outputs = stack
            .outputs()
            .iter()
            .map(|output| StackOutput {
                key: output.output_key().map(str::to_string),
                value: output.output_value().map(str::to_string),
            })
            .collect();

        return Ok(Some(outputs));
    }
}

/// Output key to output value of a single stack.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackOutputs {
    pub stack_name: String,
    pub values: BTreeMap<String, String>,
}

impl StackOutputs {
    /// Decodes an output holding a JSON array of resource names. A missing
    /// output is an empty list.
    pub fn resource_list(&self, key: &str) -> Result<Vec<String>, Error> {
        let raw = match self.values.get(key) {
            Some(raw) => raw,
            None => return Ok(vec![]),
        };

        return serde_json::from_str(raw).map_err(|error| Error::MalformedOutput {
            stack_name: self.stack_name.clone(),
            key: key.to_string(),
            reason: error.to_string(),
        });
    }

    /// Output keys as environment variable names: `userPoolId` -> `USER_POOL_ID`.
    pub fn as_env(&self) -> BTreeMap<String, String> {
        return self
            .values
            .iter()
            .map(|(key, value)| (env_key(key), value.clone()))
            .collect();
    }
}

pub async fn get_outputs(
    backend: &dyn StackBackend,
    stack_name: &str,
    region: Option<String>,
) -> Result<StackOutputs, Error> {
    let outputs = match backend.describe_outputs(stack_name, region).await? {
        Some(outputs) => outputs,
        None => return Err(Error::NotFoundError(stack_name.to_string())),
    };

    if outputs.is_empty() {
        tracing::warn!(stack = stack_name, "stack has no published outputs");
    }

    let values = outputs
        .into_iter()
        .filter_map(|output| Some((output.key?, output.value?)))
        .collect();

    return Ok(StackOutputs {
        stack_name: stack_name.to_string(),
        values,
    });
}

fn env_key(output_key: &str) -> String {
    let mut key = String::with_capacity(output_key.len() + 4);
    let mut previous: Option<char> = None;

    for c in output_key.chars() {
        if !c.is_ascii_alphanumeric() {
            if !key.is_empty() && !key.ends_with('_') {
                key.push('_');
            }
            previous = None;
            continue;
        }

        let boundary = match previous {
            Some(p) => c.is_ascii_uppercase() && (p.is_ascii_lowercase() || p.is_ascii_digit()),
            None => false,
        };
        if boundary && !key.ends_with('_') {
            key.push('_');
        }

        key.push(c.to_ascii_uppercase());
        previous = Some(c);
    }

    return key.trim_end_matches('_').to_string();
}
