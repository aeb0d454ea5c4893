//! AWS API interaction module
//!
//! One trait per remote service. Reconcilers only see these traits, so tests can
//! swap in an in-memory fake. The production implementations live on the
//! official SDK clients.
//!
//! # Module Structure
//!
//! - [`client`] - Shared SDK configuration and the [`Cloud`] handle
//! - [`ecs`] - Clusters, services, task definitions, container instances
//! - [`scaling`] - Application Auto Scaling targets and policies
//! - [`cloudwatch`] - Metrics and alarms
//! - [`logs`] - Log groups and log streams
//! - [`ecr`] - Registry authorization for image pushes
//! - [`error`] - SDK error conversion and user-facing formatting
//!
//! # Example
//!
//! ```ignore
//! use ecspress::aws::client::Cloud;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let cloud = Cloud::connect(Some("eu-west-1"), None).await;
//!     let arns = cloud.ecs.list_clusters(None).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod cloudwatch;
pub mod ecr;
pub mod ecs;
pub mod error;
pub mod logs;
pub mod scaling;

pub use client::Cloud;

use crate::config::{AlarmDefinition, MetricStat, ScalingPolicy, Service, TaskDefinition};
use crate::error::ApiResult;
use crate::resource::Page;
use async_trait::async_trait;

/// A running service as reported by `DescribeServices`
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSummary {
    pub name: String,
    pub task_definition: String,
}

/// Cluster as reported by `DescribeClusters`
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary {
    pub name: String,
    pub status: String,
}

/// Scaling policy as reported by `DescribeScalingPolicies`
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySummary {
    pub name: String,
    pub resource_id: String,
    pub arn: String,
}

/// Log stream as reported by `DescribeLogStreams`. Timestamps are epoch millis.
#[derive(Debug, Clone, PartialEq)]
pub struct LogStreamSummary {
    pub name: String,
    pub creation_time: Option<i64>,
    pub last_event_timestamp: Option<i64>,
}

impl LogStreamSummary {
    /// Last event time, falling back to creation time
    pub fn last_activity(&self) -> Option<i64> {
        self.last_event_timestamp.or(self.creation_time)
    }
}

/// Fully resolved `PutMetricAlarm` input
#[derive(Debug, Clone)]
pub struct AlarmRequest<'a> {
    pub alarm: &'a AlarmDefinition,
    pub metric: &'a MetricStat,
    pub ok_actions: Vec<String>,
    pub alarm_actions: Vec<String>,
}

/// ECR login material
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    /// base64 of `AWS:<password>`
    pub token: String,
    /// e.g. `https://0000.dkr.ecr.eu-west-1.amazonaws.com`
    pub endpoint: String,
}

#[async_trait]
pub trait EcsApi: Send + Sync {
    /// Cluster ARNs
    async fn list_clusters(&self, next_token: Option<String>) -> ApiResult<Page<String>>;
    async fn describe_clusters(&self, names: &[String]) -> ApiResult<Vec<ClusterSummary>>;
    async fn create_cluster(&self, name: &str) -> ApiResult<()>;

    /// Service ARNs of one cluster
    async fn list_services(&self, cluster: &str, next_token: Option<String>) -> ApiResult<Page<String>>;
    /// At most 10 services per call
    async fn describe_services(&self, cluster: &str, services: &[String]) -> ApiResult<Vec<ServiceSummary>>;
    async fn create_service(&self, service: &Service) -> ApiResult<()>;
    /// Update with `forceNewDeployment`
    async fn update_service(&self, service: &Service) -> ApiResult<()>;

    /// Returns the ARN of the new revision
    async fn register_task_definition(&self, task: &TaskDefinition) -> ApiResult<String>;
    /// ACTIVE task definition ARNs
    async fn list_task_definitions(&self, next_token: Option<String>) -> ApiResult<Page<String>>;
    async fn deregister_task_definition(&self, arn: &str) -> ApiResult<()>;

    /// ARNs reported under `failures`. At most 100 ids per call.
    async fn container_instance_failures(&self, cluster: &str, ids: &[String]) -> ApiResult<Vec<String>>;
}

#[async_trait]
pub trait ScalingApi: Send + Sync {
    async fn register_scalable_target(&self, resource_id: &str, min: i32, max: i32) -> ApiResult<()>;
    async fn deregister_scalable_target(&self, resource_id: &str) -> ApiResult<()>;
    async fn describe_scaling_policies(&self, next_token: Option<String>) -> ApiResult<Page<PolicySummary>>;
    /// Create or update; returns the policy ARN
    async fn put_scaling_policy(&self, resource_id: &str, policy: &ScalingPolicy) -> ApiResult<String>;
    async fn delete_scaling_policy(&self, name: &str, resource_id: &str) -> ApiResult<()>;
}

#[async_trait]
pub trait CloudWatchApi: Send + Sync {
    /// Metric names in `namespace`
    async fn list_metrics(&self, namespace: &str, next_token: Option<String>) -> ApiResult<Page<String>>;
    /// Publish one data point for `metric` at the current time
    async fn put_metric_data(&self, metric: &MetricStat, value: f64) -> ApiResult<()>;
    /// Names of metric alarms starting with `prefix`
    async fn describe_alarms(&self, prefix: &str, next_token: Option<String>) -> ApiResult<Page<String>>;
    async fn put_metric_alarm(&self, request: &AlarmRequest<'_>) -> ApiResult<()>;
    /// At most 100 names per call
    async fn delete_alarms(&self, names: &[String]) -> ApiResult<()>;
}

#[async_trait]
pub trait LogsApi: Send + Sync {
    /// Log group names starting with `prefix`
    async fn describe_log_groups(&self, prefix: &str, next_token: Option<String>) -> ApiResult<Page<String>>;
    async fn create_log_group(&self, name: &str) -> ApiResult<()>;
    async fn put_retention_policy(&self, name: &str, days: i32) -> ApiResult<()>;
    async fn delete_log_group(&self, name: &str) -> ApiResult<()>;
    async fn describe_log_streams(
        &self,
        group: &str,
        prefix: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<LogStreamSummary>>;
    async fn delete_log_stream(&self, group: &str, stream: &str) -> ApiResult<()>;
}

#[async_trait]
pub trait RegistryApi: Send + Sync {
    async fn authorization(&self) -> ApiResult<RegistryAuth>;
}
