//! AWS Client
//!
//! Loads the shared SDK configuration once and builds one client per service.

use super::cloudwatch::AwsCloudWatch;
use super::ecs::AwsEcs;
use super::logs::AwsLogs;
use super::scaling::AwsScaling;
use super::{CloudWatchApi, EcsApi, LogsApi, ScalingApi};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use std::sync::Arc;

/// Handles to every AWS service the reconcilers talk to
#[derive(Clone)]
pub struct Cloud {
    pub ecs: Arc<dyn EcsApi>,
    pub scaling: Arc<dyn ScalingApi>,
    pub cloudwatch: Arc<dyn CloudWatchApi>,
    pub logs: Arc<dyn LogsApi>,
}

impl Cloud {
    /// Load credentials and region from the default chain.
    ///
    /// `region` and `profile` override the environment when set.
    pub async fn connect(region: Option<&str>, profile: Option<&str>) -> Self {
        let sdk_config = load_sdk_config(region, profile).await;
        Self::from_sdk_config(&sdk_config)
    }

    pub fn from_sdk_config(sdk_config: &SdkConfig) -> Self {
        Self {
            ecs: Arc::new(AwsEcs::new(sdk_config)),
            scaling: Arc::new(AwsScaling::new(sdk_config)),
            cloudwatch: Arc::new(AwsCloudWatch::new(sdk_config)),
            logs: Arc::new(AwsLogs::new(sdk_config)),
        }
    }

    /// Build from explicit implementations (fakes in tests)
    pub fn new(
        ecs: Arc<dyn EcsApi>,
        scaling: Arc<dyn ScalingApi>,
        cloudwatch: Arc<dyn CloudWatchApi>,
        logs: Arc<dyn LogsApi>,
    ) -> Self {
        Self {
            ecs,
            scaling,
            cloudwatch,
            logs,
        }
    }
}

/// Shared SDK configuration
pub async fn load_sdk_config(region: Option<&str>, profile: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }

    let sdk_config = loader.load().await;
    tracing::info!(
        "Using AWS region: {}",
        sdk_config
            .region()
            .map(|r| r.as_ref())
            .unwrap_or("<unset>")
    );
    sdk_config
}
