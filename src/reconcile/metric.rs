//! CloudWatch metrics
//!
//! CloudWatch has no delete for metrics, so missing ones are seeded with a
//! single zero data point and nothing is ever removed.

use crate::aws::Cloud;
use crate::config::{MetricStat, Service};
use crate::resource::{collect_all, Diff};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Returns the number of seeded metrics
pub async fn create_missing(cloud: &Cloud, services: &[&Service]) -> Result<usize> {
    let cloudwatch = &*cloud.cloudwatch;

    let mut by_namespace: BTreeMap<&str, Vec<&MetricStat>> = BTreeMap::new();
    for metric in services.iter().filter_map(|s| s.metric.as_ref()) {
        let stat = &metric.metric_stat;
        by_namespace
            .entry(stat.metric.namespace.as_str())
            .or_default()
            .push(stat);
    }

    let mut created = 0;
    for (namespace, metrics) in by_namespace {
        let existing: BTreeSet<String> = collect_all(|token| cloudwatch.list_metrics(namespace, token))
            .await?
            .into_iter()
            .collect();
        let defined: BTreeSet<String> = metrics.iter().map(|m| m.metric.metric_name.clone()).collect();

        let mut missing = Diff::between(&defined, &existing).missing;
        for metric in metrics {
            if !missing.remove(&metric.metric.metric_name) {
                continue;
            }
            tracing::info!("Creating metric: {} in {}", metric.metric.metric_name, namespace);
            cloudwatch
                .put_metric_data(metric, 0.0)
                .await
                .with_context(|| format!("Failed to create metric {}", metric.metric.metric_name))?;
            created += 1;
        }
    }
    Ok(created)
}
