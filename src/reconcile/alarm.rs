//! CloudWatch alarms driving the scaling policies

use super::{scale, Plan};
use crate::aws::{AlarmRequest, Cloud, PolicySummary};
use crate::config::{validate, Config, Service};
use crate::error::ConfigError;
use crate::naming::{self, ALARM_PREFIX};
use crate::resource::{collect_all, Diff};
use anyhow::{Context, Result};
use std::collections::BTreeSet;

/// `DeleteAlarms` accepts at most 100 names per call
pub const DELETE_ALARMS_BATCH: usize = 100;

/// Put the alarm of every selected service, resolving its actions to policy ARNs.
///
/// With clean-up, managed alarms not defined anywhere in the configuration are
/// deleted first.
pub async fn reconcile(cloud: &Cloud, plan: &Plan<'_>) -> Result<()> {
    let services: Vec<&Service> = plan
        .services
        .iter()
        .copied()
        .filter(|s| s.alarm.is_some())
        .collect();
    validate::alarms(services.iter().copied())?;

    if plan.clean_stale {
        clean_stale(cloud, plan.config).await?;
    }

    if services.is_empty() {
        return Ok(());
    }

    let policies = scale::existing_policies(cloud).await?;
    for service in services {
        let (Some(alarm), Some(metric)) = (&service.alarm, &service.metric) else {
            continue;
        };
        let resource_id = service.resource_id();

        let request = AlarmRequest {
            alarm,
            metric: &metric.metric_stat,
            ok_actions: resolve_actions(&alarm.ok_actions, &resource_id, &policies)?,
            alarm_actions: resolve_actions(&alarm.alarm_actions, &resource_id, &policies)?,
        };

        tracing::info!("Creating alarm: {} for {}", alarm.alarm_name, resource_id);
        cloud
            .cloudwatch
            .put_metric_alarm(&request)
            .await
            .with_context(|| format!("Failed to put alarm {}", alarm.alarm_name))?;
    }
    Ok(())
}

async fn clean_stale(cloud: &Cloud, config: &Config) -> Result<()> {
    let cloudwatch = &*cloud.cloudwatch;

    let defined: BTreeSet<String> = config
        .services
        .iter()
        .filter_map(|s| s.alarm.as_ref())
        .map(|a| a.alarm_name.clone())
        .collect();
    let existing: BTreeSet<String> = collect_all(|token| cloudwatch.describe_alarms(ALARM_PREFIX, token))
        .await?
        .into_iter()
        .filter(|name| naming::is_managed_alarm(name))
        .collect();

    let stale: Vec<String> = Diff::between(&defined, &existing).stale.into_iter().collect();
    for batch in stale.chunks(DELETE_ALARMS_BATCH) {
        tracing::info!("Deleting stale alarms: {:?}", batch);
        cloudwatch.delete_alarms(batch).await?;
    }
    Ok(())
}

/// Map policy names to the ARNs of the live policies on `resource_id`
pub fn resolve_actions(
    names: &[String],
    resource_id: &str,
    policies: &[PolicySummary],
) -> Result<Vec<String>, ConfigError> {
    names
        .iter()
        .map(|name| {
            policies
                .iter()
                .find(|p| &p.name == name && p.resource_id == resource_id)
                .map(|p| p.arn.clone())
                .ok_or_else(|| ConfigError::UnresolvedPolicy {
                    policy: name.clone(),
                    resource_id: resource_id.to_string(),
                })
        })
        .collect()
}
