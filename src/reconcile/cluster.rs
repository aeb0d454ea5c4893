//! ECS clusters declared by `cluster` documents

use crate::aws::Cloud;
use crate::config::Config;
use anyhow::{Context, Result};
use std::collections::BTreeSet;

/// `DescribeClusters` accepts at most 100 names per call
const DESCRIBE_CLUSTERS_BATCH: usize = 100;

/// Create every declared cluster that is not ACTIVE
pub async fn ensure(cloud: &Cloud, config: &Config) -> Result<()> {
    let names: Vec<String> = config.clusters.iter().map(|c| c.name.clone()).collect();
    if names.is_empty() {
        return Ok(());
    }

    let mut active = BTreeSet::new();
    for batch in names.chunks(DESCRIBE_CLUSTERS_BATCH) {
        for cluster in cloud.ecs.describe_clusters(batch).await? {
            if cluster.status == "ACTIVE" {
                active.insert(cluster.name);
            }
        }
    }

    for name in names.iter().filter(|n| !active.contains(*n)) {
        tracing::info!("Creating cluster: {}", name);
        cloud
            .ecs
            .create_cluster(name)
            .await
            .with_context(|| format!("Failed to create cluster {}", name))?;
    }
    Ok(())
}
