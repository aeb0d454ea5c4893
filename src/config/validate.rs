//! Definition checks
//!
//! Every check here runs before any remote call. The first violation aborts the run.

use super::model::{Service, TaskDefinition};
use super::Config;
use crate::error::ConfigError;
use crate::naming::{ALARM_PREFIX, LOG_GROUP_PREFIX, LOG_STREAM_PREFIX};
use std::collections::BTreeSet;

/// Validate a whole loaded configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    unique_names(config)?;
    task_references(config)?;
    log_configuration(config.tasks.iter())?;
    alarms(config.services.iter())?;
    Ok(())
}

fn unique_names(config: &Config) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for task in &config.tasks {
        if !seen.insert(task.family.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "task",
                name: task.family.clone(),
            });
        }
    }

    let mut seen = BTreeSet::new();
    for service in &config.services {
        if !seen.insert((service.cluster.as_str(), service.service_name.as_str())) {
            return Err(ConfigError::Duplicate {
                kind: "service",
                name: service.service_name.clone(),
            });
        }
    }
    Ok(())
}

fn task_references(config: &Config) -> Result<(), ConfigError> {
    for service in &config.services {
        if config.task(service.task_family()).is_none() {
            tracing::error!(
                "Task definition is not found for service {}!",
                service.service_name
            );
            return Err(ConfigError::MissingTaskDefinition {
                service: service.service_name.clone(),
                task: service.task_definition.clone(),
            });
        }
    }
    Ok(())
}

/// `awslogs-group` must start with `/ecs/` and the stream prefix must be `ecs`
pub fn log_configuration<'a>(
    tasks: impl IntoIterator<Item = &'a TaskDefinition>,
) -> Result<(), ConfigError> {
    for task in tasks {
        for container in &task.container_definitions {
            let Some(log_config) = &container.log_configuration else {
                continue;
            };
            if log_config.options.is_empty() {
                continue;
            }

            let Some(group) = log_config.group() else {
                return Err(ConfigError::LogGroupMissing {
                    task: task.family.clone(),
                    container: container.name.clone(),
                });
            };
            if !group.starts_with(LOG_GROUP_PREFIX) {
                tracing::error!("log groups must start with '{}' prefix: {}", LOG_GROUP_PREFIX, group);
                return Err(ConfigError::LogGroupPrefix {
                    task: task.family.clone(),
                    group: group.to_string(),
                    prefix: LOG_GROUP_PREFIX,
                });
            }

            let prefix = log_config.stream_prefix().unwrap_or_default();
            if prefix != LOG_STREAM_PREFIX {
                tracing::error!("logstream prefixes must be '{}': {}", LOG_STREAM_PREFIX, prefix);
                return Err(ConfigError::LogStreamPrefix {
                    task: task.family.clone(),
                    found: prefix.to_string(),
                    expected: LOG_STREAM_PREFIX,
                });
            }
        }
    }
    Ok(())
}

/// Alarm names carry the `ecs:` prefix, have a metric, and only reference
/// policies declared on the same service
pub fn alarms<'a>(services: impl IntoIterator<Item = &'a Service>) -> Result<(), ConfigError> {
    for service in services {
        let Some(alarm) = &service.alarm else {
            continue;
        };

        if !alarm.alarm_name.starts_with(ALARM_PREFIX) {
            tracing::error!(
                "Alarm names must start with '{}' prefix: {}",
                ALARM_PREFIX,
                alarm.alarm_name
            );
            return Err(ConfigError::AlarmPrefix {
                service: service.service_name.clone(),
                alarm: alarm.alarm_name.clone(),
                prefix: ALARM_PREFIX,
            });
        }

        if service.metric.is_none() {
            return Err(ConfigError::AlarmWithoutMetric {
                service: service.service_name.clone(),
                alarm: alarm.alarm_name.clone(),
            });
        }

        let declared: BTreeSet<&str> = service
            .policies()
            .iter()
            .map(|p| p.policy_name.as_str())
            .collect();
        for policy in alarm.ok_actions.iter().chain(&alarm.alarm_actions) {
            if !declared.contains(policy.as_str()) {
                return Err(ConfigError::UnknownPolicyReference {
                    service: service.service_name.clone(),
                    alarm: alarm.alarm_name.clone(),
                    policy: policy.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Every container must end up with an image
pub fn images<'a>(tasks: impl IntoIterator<Item = &'a TaskDefinition>) -> Result<(), ConfigError> {
    for task in tasks {
        for container in &task.container_definitions {
            if container.image.as_deref().unwrap_or_default().is_empty() {
                return Err(ConfigError::MissingImage {
                    task: task.family.clone(),
                    container: container.name.clone(),
                });
            }
        }
    }
    Ok(())
}
