use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_types::SdkConfig;

use crate::bootstrap::{BucketBackend, Error, Provisioned};

/// [`BucketBackend`] over an S3-compatible endpoint.
pub struct S3Buckets {
    client: aws_sdk_s3::Client,
}

impl S3Buckets {
    /// Emulators serve every bucket from one host, hence path-style addressing.
    pub fn new(sdk_config: &SdkConfig) -> Self {
        let config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(true)
            .build();
        return Self {
            client: aws_sdk_s3::Client::from_conf(config),
        };
    }
}

fn create_outcome<T>(
    bucket_name: &str,
    result: Result<T, SdkError<CreateBucketError, HttpResponse>>,
) -> Result<Provisioned, Error> {
    return match result {
        Ok(_) => Ok(Provisioned::Created),
        Err(SdkError::ServiceError(context))
            if matches!(
                context.err(),
                CreateBucketError::BucketAlreadyOwnedByYou(_)
                    | CreateBucketError::BucketAlreadyExists(_)
            ) =>
        {
            Ok(Provisioned::AlreadyExists)
        }
        Err(err) => Err(Error::ServiceError {
            resource: bucket_name.to_string(),
            reason: DisplayErrorContext(&err).to_string(),
        }),
    };
}

#[async_trait]
impl BucketBackend for S3Buckets {
    async fn create_bucket(&self, bucket_name: &str) -> Result<Provisioned, Error> {
        let result = self.client.create_bucket().bucket(bucket_name).send().await;
        return create_outcome(bucket_name, result);
    }
}
