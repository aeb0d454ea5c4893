//! Log groups and stale log streams

use super::Plan;
use crate::aws::{Cloud, LogStreamSummary};
use crate::config::Config;
use crate::naming::{self, LOG_GROUP_PREFIX, LOG_RETENTION_DAYS, LOG_STREAM_PREFIX};
use crate::resource::{collect_all, Diff};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

/// `DescribeContainerInstances` accepts at most 100 ids per call
pub const DESCRIBE_CONTAINER_INSTANCES_BATCH: usize = 100;

/// Create missing log groups of the selected tasks and force their retention.
///
/// With clean-up, managed groups that no task in the whole configuration
/// declares are deleted.
pub async fn reconcile_groups(cloud: &Cloud, plan: &Plan<'_>) -> Result<()> {
    let logs = &*cloud.logs;

    let defined: BTreeSet<String> = plan
        .tasks
        .iter()
        .flat_map(|t| t.log_groups())
        .map(str::to_string)
        .collect();
    let existing: BTreeSet<String> =
        collect_all(|token| logs.describe_log_groups(LOG_GROUP_PREFIX, token))
            .await?
            .into_iter()
            .collect();

    for group in &Diff::between(&defined, &existing).missing {
        tracing::info!("Creating log group: {}", group);
        logs.create_log_group(group)
            .await
            .with_context(|| format!("Failed to create log group {}", group))?;
    }

    for group in &defined {
        tracing::debug!("Setting retention of {} to {} days", group, LOG_RETENTION_DAYS);
        logs.put_retention_policy(group, LOG_RETENTION_DAYS).await?;
    }

    if plan.clean_stale {
        let all_defined: BTreeSet<String> = plan
            .config
            .tasks
            .iter()
            .flat_map(|t| t.log_groups())
            .map(str::to_string)
            .collect();
        let managed: BTreeSet<String> = existing
            .into_iter()
            .filter(|name| naming::is_managed_log_group(name))
            .collect();

        for group in &Diff::between(&all_defined, &managed).stale {
            tracing::info!("Cleaning stale log group: {}", group);
            logs.delete_log_group(group).await?;
        }
    }
    Ok(())
}

/// Delete `ecs` log streams whose container instance is gone and whose last
/// activity is at least `days_ago` days before `now`.
///
/// Returns the number of deleted streams.
pub async fn clean_stale_streams(
    cloud: &Cloud,
    config: &Config,
    days_ago: u32,
    now: DateTime<Utc>,
) -> Result<usize> {
    let logs = &*cloud.logs;
    // Ages beyond chrono's range keep every stream
    let cutoff = now
        .checked_sub_signed(Duration::days(i64::from(days_ago)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let clusters: BTreeSet<&str> = config.services.iter().map(|s| s.cluster.as_str()).collect();

    let mut deleted = 0;
    for cluster in clusters {
        let groups: BTreeSet<&str> = config
            .services
            .iter()
            .filter(|s| s.cluster == cluster)
            .filter_map(|s| config.task(s.task_family()))
            .flat_map(|t| t.log_groups())
            .collect();

        let mut streams: Vec<(&str, LogStreamSummary)> = Vec::new();
        for group in groups {
            let found =
                collect_all(|token| logs.describe_log_streams(group, LOG_STREAM_PREFIX, token))
                    .await?;
            streams.extend(found.into_iter().map(|stream| (group, stream)));
        }

        let failed = failed_container_ids(cloud, cluster, &streams).await?;
        tracing::info!("Failed container count in {}: {}", cluster, failed.len());

        for (group, stream) in &streams {
            if !failed.contains(naming::arn_suffix(&stream.name)) {
                continue;
            }

            let Some(millis) = stream.last_activity() else {
                tracing::warn!(
                    "Neither creation time nor last event time is known for {}",
                    stream.name
                );
                continue;
            };
            let Some(last_event) = DateTime::<Utc>::from_timestamp_millis(millis) else {
                tracing::warn!("Invalid timestamp {} on log stream {}", millis, stream.name);
                continue;
            };
            if last_event > cutoff {
                continue;
            }

            tracing::info!(
                "Deleting log stream: {} of log group {}. Last event time: {}",
                stream.name,
                group,
                last_event
            );
            logs.delete_log_stream(group, &stream.name).await?;
            deleted += 1;
        }
    }

    tracing::info!("Deleted {} stale log streams", deleted);
    Ok(deleted)
}

/// Container ids (last segment of `ecs/<container>/<id>`) that ECS reports as failures
async fn failed_container_ids(
    cloud: &Cloud,
    cluster: &str,
    streams: &[(&str, LogStreamSummary)],
) -> Result<BTreeSet<String>> {
    let ids: Vec<String> = streams
        .iter()
        .map(|(_, s)| naming::arn_suffix(&s.name).to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut failed = BTreeSet::new();
    for batch in ids.chunks(DESCRIBE_CONTAINER_INSTANCES_BATCH) {
        let failures = cloud.ecs.container_instance_failures(cluster, batch).await?;
        failed.extend(failures.iter().map(|arn| naming::arn_suffix(arn).to_string()));
    }
    Ok(failed)
}
