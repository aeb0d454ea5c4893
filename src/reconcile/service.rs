//! ECS services

use crate::aws::Cloud;
use crate::config::Service;
use crate::naming;
use crate::resource::{collect_all, Diff};
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Create every selected service that does not exist in its cluster yet.
///
/// Returns the names of the created services.
pub async fn create_missing(cloud: &Cloud, services: &[&Service]) -> Result<Vec<String>> {
    let ecs = &*cloud.ecs;

    let mut by_cluster: BTreeMap<&str, Vec<&Service>> = BTreeMap::new();
    for service in services.iter().copied() {
        by_cluster.entry(service.cluster.as_str()).or_default().push(service);
    }

    let mut created = Vec::new();
    for (cluster, services) in by_cluster {
        let existing: BTreeSet<String> = collect_all(|token| ecs.list_services(cluster, token))
            .await?
            .iter()
            .map(|arn| naming::arn_suffix(arn).to_string())
            .collect();
        let defined: BTreeSet<String> = services.iter().map(|s| s.service_name.clone()).collect();

        let missing = Diff::between(&defined, &existing).missing;
        for service in services.iter().filter(|s| missing.contains(&s.service_name)) {
            tracing::info!("Creating service: {} on cluster {}", service.service_name, cluster);
            ecs.create_service(service)
                .await
                .with_context(|| format!("Failed to create service {}", service.service_name))?;
            created.push(service.service_name.clone());
        }
    }
    Ok(created)
}

/// Force a new deployment of every selected service
pub async fn update_all(cloud: &Cloud, services: &[&Service]) -> Result<()> {
    for service in services {
        tracing::info!("Updating service: {}", service.service_name);
        cloud
            .ecs
            .update_service(service)
            .await
            .with_context(|| format!("Failed to update service {}", service.service_name))?;
    }
    Ok(())
}
