//! Application Auto Scaling for ECS services

use super::error::{from_build, from_sdk};
use super::{PolicySummary, ScalingApi};
use crate::config::ScalingPolicy;
use crate::error::ApiResult;
use crate::naming;
use crate::resource::Page;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_applicationautoscaling::error::BuildError;
use aws_sdk_applicationautoscaling::types::{
    AdjustmentType, MetricAggregationType, PolicyType, ScalableDimension, ServiceNamespace,
    StepAdjustment, StepScalingPolicyConfiguration,
};
use aws_sdk_applicationautoscaling::Client;

const POLICY_PAGE_SIZE: i32 = 50;

#[derive(Clone)]
pub struct AwsScaling {
    client: Client,
}

impl AwsScaling {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

fn namespace() -> ServiceNamespace {
    ServiceNamespace::from(naming::SERVICE_NAMESPACE)
}

fn desired_count() -> ScalableDimension {
    ScalableDimension::from(naming::SCALABLE_DIMENSION)
}

#[async_trait]
impl ScalingApi for AwsScaling {
    async fn register_scalable_target(&self, resource_id: &str, min: i32, max: i32) -> ApiResult<()> {
        self.client
            .register_scalable_target()
            .service_namespace(namespace())
            .resource_id(resource_id)
            .scalable_dimension(desired_count())
            .min_capacity(min)
            .max_capacity(max)
            .send()
            .await
            .map_err(|e| from_sdk("RegisterScalableTarget", e))?;
        Ok(())
    }

    async fn deregister_scalable_target(&self, resource_id: &str) -> ApiResult<()> {
        self.client
            .deregister_scalable_target()
            .service_namespace(namespace())
            .resource_id(resource_id)
            .scalable_dimension(desired_count())
            .send()
            .await
            .map_err(|e| from_sdk("DeregisterScalableTarget", e))?;
        Ok(())
    }

    async fn describe_scaling_policies(&self, next_token: Option<String>) -> ApiResult<Page<PolicySummary>> {
        let resp = self
            .client
            .describe_scaling_policies()
            .service_namespace(namespace())
            .max_results(POLICY_PAGE_SIZE)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| from_sdk("DescribeScalingPolicies", e))?;

        let policies = resp
            .scaling_policies()
            .iter()
            .map(|p| PolicySummary {
                name: p.policy_name().to_string(),
                resource_id: p.resource_id().to_string(),
                arn: p.policy_arn().to_string(),
            })
            .collect();
        Ok(Page::new(policies, resp.next_token().map(str::to_string)))
    }

    async fn put_scaling_policy(&self, resource_id: &str, policy: &ScalingPolicy) -> ApiResult<String> {
        let configuration =
            step_configuration(policy).map_err(|e| from_build("PutScalingPolicy", e))?;

        let resp = self
            .client
            .put_scaling_policy()
            .policy_name(&policy.policy_name)
            .service_namespace(namespace())
            .resource_id(resource_id)
            .scalable_dimension(ScalableDimension::from(policy.scalable_dimension.as_str()))
            .policy_type(PolicyType::from(policy.policy_type.as_str()))
            .step_scaling_policy_configuration(configuration)
            .send()
            .await
            .map_err(|e| from_sdk("PutScalingPolicy", e))?;

        Ok(resp.policy_arn().to_string())
    }

    async fn delete_scaling_policy(&self, name: &str, resource_id: &str) -> ApiResult<()> {
        self.client
            .delete_scaling_policy()
            .policy_name(name)
            .service_namespace(namespace())
            .resource_id(resource_id)
            .scalable_dimension(desired_count())
            .send()
            .await
            .map_err(|e| from_sdk("DeleteScalingPolicy", e))?;
        Ok(())
    }
}

fn step_configuration(policy: &ScalingPolicy) -> Result<StepScalingPolicyConfiguration, BuildError> {
    let config = &policy.step_scaling_policy_configuration;

    let adjustments = config
        .step_adjustments
        .iter()
        .map(|step| {
            StepAdjustment::builder()
                .set_metric_interval_lower_bound(step.metric_interval_lower_bound)
                .set_metric_interval_upper_bound(step.metric_interval_upper_bound)
                .scaling_adjustment(step.scaling_adjustment)
                .build()
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StepScalingPolicyConfiguration::builder()
        .adjustment_type(AdjustmentType::from(config.adjustment_type.as_str()))
        .set_step_adjustments(Some(adjustments))
        .set_cooldown(config.cooldown)
        .set_metric_aggregation_type(
            config
                .metric_aggregation_type
                .as_deref()
                .map(MetricAggregationType::from),
        )
        .set_min_adjustment_magnitude(config.min_adjustment_magnitude)
        .build())
}
