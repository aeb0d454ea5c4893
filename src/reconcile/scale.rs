//! Application Auto Scaling targets and step-scaling policies

use super::Plan;
use crate::aws::{Cloud, PolicySummary};
use crate::config::Service;
use crate::resource::{collect_all, Diff};
use anyhow::{Context, Result};
use std::collections::BTreeSet;

/// Register a scalable target for services with a `scale` block and
/// deregister it for services without one.
pub async fn register_targets(cloud: &Cloud, services: &[&Service]) -> Result<()> {
    for service in services {
        let resource_id = service.resource_id();

        let Some(scale) = &service.scale else {
            match cloud.scaling.deregister_scalable_target(&resource_id).await {
                Ok(()) => tracing::info!("Deregistered service as a scalable target: {}", resource_id),
                Err(e) if e.is_not_found() => tracing::debug!("No need to deregister {}", resource_id),
                Err(e) => return Err(e.into()),
            }
            continue;
        };

        tracing::info!("Registering service as a scalable target: {}", resource_id);
        cloud
            .scaling
            .register_scalable_target(&resource_id, scale.min_capacity, scale.max_capacity)
            .await
            .with_context(|| format!("Failed to register scalable target {}", resource_id))?;
    }
    Ok(())
}

/// Every live ECS scaling policy
pub async fn existing_policies(cloud: &Cloud) -> Result<Vec<PolicySummary>> {
    let scaling = &*cloud.scaling;
    Ok(collect_all(|token| scaling.describe_scaling_policies(token)).await?)
}

/// `(resource_id, policy_name)` of every declared policy
pub fn policy_keys<'a>(services: impl IntoIterator<Item = &'a Service>) -> BTreeSet<(String, String)> {
    services
        .into_iter()
        .flat_map(|service| {
            let resource_id = service.resource_id();
            service
                .policies()
                .iter()
                .map(move |p| (resource_id.clone(), p.policy_name.clone()))
        })
        .collect()
}

/// Put every policy of the selected services. With clean-up, live policies
/// matching no declared `(resource_id, name)` pair are deleted first.
pub async fn reconcile_policies(cloud: &Cloud, plan: &Plan<'_>) -> Result<()> {
    if plan.clean_stale {
        let defined = policy_keys(&plan.config.services);
        let live: BTreeSet<(String, String)> = existing_policies(cloud)
            .await?
            .into_iter()
            .map(|p| (p.resource_id, p.name))
            .collect();

        for (resource_id, name) in &Diff::between(&defined, &live).stale {
            tracing::info!("Removing stale policy: {} of {}", name, resource_id);
            cloud.scaling.delete_scaling_policy(name, resource_id).await?;
        }
    }

    for service in &plan.services {
        let resource_id = service.resource_id();
        for policy in service.policies() {
            tracing::info!("Creating scaling policy: {} for {}", policy.policy_name, resource_id);
            let arn = cloud
                .scaling
                .put_scaling_policy(&resource_id, policy)
                .await
                .with_context(|| format!("Failed to put scaling policy {}", policy.policy_name))?;
            tracing::debug!("Scaling policy ARN: {}", arn);
        }
    }
    Ok(())
}
