//! Task definitions: registration and stale revision cleanup

use super::{log, Plan};
use crate::aws::{Cloud, EcsApi};
use crate::config::validate;
use crate::error::ApiError;
use crate::naming;
use crate::resource::{collect_all, Diff};
use crate::retry::{RetryError, RetryPolicy};
use anyhow::{Context, Result};
use std::collections::BTreeSet;

/// `DescribeServices` accepts at most 10 services per call
pub const DESCRIBE_SERVICES_BATCH: usize = 10;

/// Validate, reconcile log groups, then register every selected task definition.
///
/// Returns the ARNs of the new revisions.
pub async fn register(cloud: &Cloud, plan: &Plan<'_>) -> Result<Vec<String>> {
    validate::log_configuration(plan.tasks.iter().copied())?;
    validate::images(plan.tasks.iter().copied())?;

    log::reconcile_groups(cloud, plan).await?;

    let mut arns = Vec::with_capacity(plan.tasks.len());
    for task in &plan.tasks {
        tracing::info!("Registering task definition {}...", task.family);
        let arn = cloud
            .ecs
            .register_task_definition(task)
            .await
            .with_context(|| format!("Failed to register task definition {}", task.family))?;
        tracing::info!("Registered task definition {}", arn);
        arns.push(arn);
    }
    Ok(arns)
}

/// Deregister every ACTIVE task definition that no service on any cluster uses.
///
/// Throttled deregistrations are retried under `retry`; a revision that is still
/// throttled when the policy gives up is skipped with a warning. Returns the
/// number of deregistered revisions.
pub async fn clean_stale(cloud: &Cloud, retry: &RetryPolicy) -> Result<usize> {
    let ecs = &*cloud.ecs;

    let in_use = task_definitions_in_use(ecs).await?;
    let active: BTreeSet<String> = collect_all(|token| ecs.list_task_definitions(token))
        .await?
        .into_iter()
        .collect();

    let stale = Diff::between(&in_use, &active).stale;
    tracing::info!(
        "{} task definitions in use, {} active, {} stale",
        in_use.len(),
        active.len(),
        stale.len()
    );

    let mut deregistered = 0;
    for arn in &stale {
        tracing::info!("Deregistering stale task: {}", arn);
        match retry
            .run(|| ecs.deregister_task_definition(arn), ApiError::is_throttling)
            .await
        {
            Ok(()) => deregistered += 1,
            Err(RetryError::Exhausted { attempts, waited, .. }) => {
                tracing::warn!(
                    "Giving up on {} after {} attempts ({:?} waited)",
                    arn,
                    attempts,
                    waited
                );
            }
            Err(RetryError::Permanent(err)) => {
                return Err(err).with_context(|| format!("Failed to deregister {}", arn));
            }
        }
    }

    tracing::info!("Deregistered {} stale task definitions", deregistered);
    Ok(deregistered)
}

/// Task definition ARNs referenced by the services of every cluster
async fn task_definitions_in_use(ecs: &dyn EcsApi) -> Result<BTreeSet<String>> {
    let clusters = collect_all(|token| ecs.list_clusters(token)).await?;

    let mut in_use = BTreeSet::new();
    for cluster_arn in &clusters {
        let cluster = naming::arn_suffix(cluster_arn);
        let services = collect_all(|token| ecs.list_services(cluster, token)).await?;
        tracing::debug!("Cluster {} has {} services", cluster, services.len());

        for batch in services.chunks(DESCRIBE_SERVICES_BATCH) {
            for service in ecs.describe_services(cluster, batch).await? {
                in_use.insert(service.task_definition);
            }
        }
    }
    Ok(in_use)
}
