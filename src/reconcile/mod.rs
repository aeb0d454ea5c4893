//! Reconcilers
//!
//! Each submodule drives one resource type from its definitions to the live
//! AWS state: create what is missing, put/update what exists, and delete stale
//! resources when clean-up is enabled.
//!
//! # Deploy order
//!
//! 1. [`task::register`] (log groups first)
//! 2. [`cluster::ensure`]
//! 3. [`service::create_missing`]
//! 4. [`scale::register_targets`]
//! 5. [`scale::reconcile_policies`]
//! 6. [`metric::create_missing`]
//! 7. [`alarm::reconcile`]
//! 8. [`service::update_all`]
//!
//! Services are created before their scalable targets because Application Auto
//! Scaling rejects targets for services that do not exist yet.

pub mod alarm;
pub mod cluster;
pub mod log;
pub mod metric;
pub mod scale;
pub mod service;
pub mod task;

use crate::aws::Cloud;
use crate::config::{validate, Config, Service, TaskDefinition};
use crate::error::{ApiError, ConfigError};
use crate::retry::{RetryError, RetryPolicy};
use anyhow::Result;

/// Subset of the configuration a command acts on.
///
/// Stale computations always look at `config` as a whole so that acting on a
/// subset never deletes resources that belong to definitions outside it.
#[derive(Debug, Clone)]
pub struct Plan<'a> {
    pub config: &'a Config,
    pub services: Vec<&'a Service>,
    pub tasks: Vec<&'a TaskDefinition>,
    pub clean_stale: bool,
}

impl<'a> Plan<'a> {
    /// Select services by name, with the task definitions they use.
    ///
    /// A name selects every cluster's service of that name; repeated names are
    /// ignored. No names selects every service and every task.
    pub fn for_services(config: &'a Config, names: &[String], clean_stale: bool) -> Result<Self, ConfigError> {
        if names.is_empty() {
            return Ok(Self {
                config,
                services: config.services.iter().collect(),
                tasks: config.tasks.iter().collect(),
                clean_stale,
            });
        }

        let mut services: Vec<&Service> = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                continue;
            }

            let before = services.len();
            services.extend(config.services_named(name));
            if services.len() == before {
                tracing::error!("Service {} is not found!", name);
                return Err(ConfigError::ServiceNotFound(name.clone()));
            }
        }

        let mut tasks: Vec<&TaskDefinition> = Vec::new();
        for service in &services {
            let Some(task) = config.task(service.task_family()) else {
                return Err(ConfigError::MissingTaskDefinition {
                    service: service.service_name.clone(),
                    task: service.task_definition.clone(),
                });
            };
            if !tasks.iter().any(|t| t.family == task.family) {
                tasks.push(task);
            }
        }

        Ok(Self {
            config,
            services,
            tasks,
            clean_stale,
        })
    }

    /// A single task definition, no services
    pub fn for_task(config: &'a Config, family: &str) -> Result<Self, ConfigError> {
        let Some(task) = config.task(family) else {
            tracing::error!("Could not find task definition {}", family);
            return Err(ConfigError::TaskNotFound(family.to_string()));
        };

        Ok(Self {
            config,
            services: Vec::new(),
            tasks: vec![task],
            clean_stale: false,
        })
    }
}

/// Run the full deploy pipeline.
///
/// Every step is idempotent, so a run that fails with "Rate exceeded" is
/// started over from the beginning with exponential backoff.
pub async fn deploy(cloud: &Cloud, plan: &Plan<'_>) -> Result<()> {
    deploy_with(cloud, plan, &RetryPolicy::deploy()).await
}

pub async fn deploy_with(cloud: &Cloud, plan: &Plan<'_>, retry: &RetryPolicy) -> Result<()> {
    validate::validate(plan.config)?;

    let result = retry
        .run(|| deploy_once(cloud, plan), is_rate_exceeded)
        .await;

    match result {
        Ok(()) => {
            tracing::info!("Deploy completed for {} service(s)", plan.services.len());
            Ok(())
        }
        Err(RetryError::Exhausted { last, attempts, .. }) => {
            tracing::error!("Deploy is still rate limited after {} attempts", attempts);
            Err(last)
        }
        Err(RetryError::Permanent(err)) => Err(err),
    }
}

async fn deploy_once(cloud: &Cloud, plan: &Plan<'_>) -> Result<()> {
    task::register(cloud, plan).await?;
    cluster::ensure(cloud, plan.config).await?;
    service::create_missing(cloud, &plan.services).await?;
    scale::register_targets(cloud, &plan.services).await?;
    scale::reconcile_policies(cloud, plan).await?;
    metric::create_missing(cloud, &plan.services).await?;
    alarm::reconcile(cloud, plan).await?;
    service::update_all(cloud, &plan.services).await?;
    Ok(())
}

fn is_rate_exceeded(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_rate_exceeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const CONFIG: &str = r#"
task:
  family: api
  containerDefinitions:
    - name: api
      image: repo/api:1
service:
  serviceName: api
  cluster: main
  taskDefinition: api
  desiredCount: 1
"#;

    const WORKER: &str = r#"
task:
  family: worker
  containerDefinitions:
    - name: worker
      image: repo/worker:1
service:
  serviceName: worker
  cluster: main
  taskDefinition: worker:3
  desiredCount: 1
"#;

    fn config() -> Config {
        let mut config = Config::default();
        config.merge_document(Path::new("api.yml"), CONFIG).unwrap();
        config.merge_document(Path::new("worker.yml"), WORKER).unwrap();
        config
    }

    #[test]
    fn test_plan_selects_all_by_default() {
        let config = config();
        let plan = Plan::for_services(&config, &[], true).unwrap();
        assert_eq!(plan.services.len(), 2);
        assert_eq!(plan.tasks.len(), 2);
        assert!(plan.clean_stale);
    }

    #[test]
    fn test_plan_selects_named_services_and_their_tasks() {
        let config = config();
        let plan = Plan::for_services(&config, &["worker".to_string()], false).unwrap();
        assert_eq!(plan.services[0].service_name, "worker");
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].family, "worker");
    }

    #[test]
    fn test_plan_unknown_service() {
        let config = config();
        let err = Plan::for_services(&config, &["nope".to_string()], false).unwrap_err();
        assert!(matches!(err, ConfigError::ServiceNotFound(name) if name == "nope"));
    }

    #[test]
    fn test_plan_ignores_repeated_names() {
        let config = config();
        let names = ["api".to_string(), "worker".to_string(), "api".to_string()];
        let plan = Plan::for_services(&config, &names, false).unwrap();

        let selected: Vec<&str> = plan.services.iter().map(|s| s.service_name.as_str()).collect();
        assert_eq!(selected, vec!["api", "worker"]);
        assert_eq!(plan.tasks.len(), 2);
    }

    #[test]
    fn test_plan_selects_same_name_in_every_cluster() {
        let mut config = config();
        config
            .merge_document(
                Path::new("edge.yml"),
                "service:\n  serviceName: api\n  cluster: edge\n  taskDefinition: api\n  desiredCount: 1\n",
            )
            .unwrap();

        let plan = Plan::for_services(&config, &["api".to_string()], false).unwrap();

        let clusters: Vec<&str> = plan.services.iter().map(|s| s.cluster.as_str()).collect();
        assert_eq!(clusters, vec!["main", "edge"]);
        assert_eq!(plan.tasks.len(), 1);
    }

    #[test]
    fn test_plan_for_task() {
        let config = config();
        let plan = Plan::for_task(&config, "api").unwrap();
        assert!(plan.services.is_empty());
        assert_eq!(plan.tasks[0].family, "api");
        assert!(matches!(
            Plan::for_task(&config, "missing"),
            Err(ConfigError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_rate_exceeded_classification() {
        let throttled: anyhow::Error =
            ApiError::new("UpdateService", Some("ThrottlingException"), "Rate exceeded").into();
        let plain: anyhow::Error = ApiError::new("UpdateService", Some("InvalidParameterException"), "bad").into();
        assert!(is_rate_exceeded(&throttled));
        assert!(is_rate_exceeded(&throttled.context("Failed to update service api")));
        assert!(!is_rate_exceeded(&plain));
        assert!(!is_rate_exceeded(&anyhow::anyhow!("Rate exceeded")));
    }
}
