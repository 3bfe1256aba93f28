use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::Credentials;
use aws_types::{region::Region, SdkConfig};

/// Shared SDK configuration for the real AWS endpoints of `region`.
pub async fn cloud_config(region: &str) -> SdkConfig {
    return aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await;
}

/// Shared SDK configuration for an emulated endpoint. Emulators accept any
/// credentials, so a static placeholder pair is used.
pub async fn local_config(region: &str, endpoint_url: &str) -> SdkConfig {
    return aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .endpoint_url(endpoint_url)
        .credentials_provider(Credentials::new("local", "local", None, None, "local"))
        .load()
        .await;
}
