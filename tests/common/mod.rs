//! In-memory AWS used by the integration tests
//!
//! Implements every service trait over one shared state, paginates with a small
//! configurable page size, records every call, and tracks the largest batch
//! each batched API received.

#![allow(dead_code)]

use async_trait::async_trait;
use ecspress::aws::{
    AlarmRequest, Cloud, CloudWatchApi, ClusterSummary, EcsApi, LogStreamSummary, LogsApi,
    PolicySummary, ScalingApi, ServiceSummary,
};
use ecspress::config::{
    self, validate, Config, MetricStat, ScalingPolicy, TaskDefinition,
};
use ecspress::error::{ApiError, ApiResult};
use ecspress::resource::Page;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub const ACCOUNT: &str = "arn:aws:ecs:eu-west-1:000000000000";

pub fn task_arn(family: &str, revision: u32) -> String {
    format!("{}:task-definition/{}:{}", ACCOUNT, family, revision)
}

pub fn container_instance_arn(cluster: &str, id: &str) -> String {
    format!("{}:container-instance/{}/{}", ACCOUNT, cluster, id)
}

pub fn throttled(operation: &'static str) -> ApiError {
    ApiError::new(operation, Some("ThrottlingException"), "Rate exceeded")
}

#[derive(Debug, Default)]
pub struct State {
    /// name -> status
    pub clusters: BTreeMap<String, String>,
    /// (cluster, service) -> task definition ARN
    pub services: BTreeMap<(String, String), String>,
    /// family -> latest revision
    pub revisions: BTreeMap<String, u32>,
    pub active_task_definitions: BTreeSet<String>,
    /// group -> retention days
    pub log_groups: BTreeMap<String, Option<i32>>,
    /// group -> streams
    pub log_streams: BTreeMap<String, Vec<LogStreamSummary>>,
    /// container instance ids ECS no longer knows
    pub failed_instances: BTreeSet<String>,
    /// resource id -> (min, max)
    pub scalable_targets: BTreeMap<String, (i32, i32)>,
    /// (resource id, policy name) -> ARN
    pub policies: BTreeMap<(String, String), String>,
    /// namespace -> metric names
    pub metrics: BTreeMap<String, BTreeSet<String>>,
    /// alarm name -> (ok actions, alarm actions)
    pub alarms: BTreeMap<String, (Vec<String>, Vec<String>)>,

    /// Every call, as `Operation target`
    pub calls: Vec<String>,
    pub page_size: usize,
    pub max_describe_services: usize,
    pub max_describe_clusters: usize,
    pub max_container_instances: usize,
    pub max_delete_alarms: usize,

    /// Deregistrations that are always throttled
    pub throttle_deregister: BTreeSet<String>,
    /// Deregistrations that fail with a non-throttling error
    pub reject_deregister: BTreeSet<String>,
    /// Number of upcoming UpdateService calls that fail with "Rate exceeded"
    pub rate_exceeded_updates: u32,
}

#[derive(Debug)]
pub struct FakeAws {
    state: Mutex<State>,
}

impl FakeAws {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                page_size: 3,
                ..State::default()
            }),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn cloud(self: &Arc<Self>) -> Cloud {
        Cloud::new(self.clone(), self.clone(), self.clone(), self.clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Calls whose operation name starts with `prefix`
    pub fn calls_of(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn add_service(&self, cluster: &str, name: &str, task_definition: &str) {
        self.state().services.insert(
            (cluster.to_string(), name.to_string()),
            task_definition.to_string(),
        );
    }

    pub fn add_task_definition(&self, family: &str, revision: u32) -> String {
        let mut state = self.state();
        let latest = state.revisions.entry(family.to_string()).or_insert(0);
        *latest = (*latest).max(revision);
        let arn = task_arn(family, revision);
        state.active_task_definitions.insert(arn.clone());
        arn
    }

    fn record(&self, call: String) {
        self.state().calls.push(call);
    }
}

fn paginate<T: Clone>(items: &[T], token: Option<String>, size: usize) -> Page<T> {
    let start = token.map(|t| t.parse::<usize>().unwrap()).unwrap_or(0);
    let end = (start + size).min(items.len());
    let next = (end < items.len()).then(|| end.to_string());
    Page::new(items[start..end].to_vec(), next)
}

fn latest_arn(state: &State, reference: &str) -> String {
    let family = ecspress::naming::task_family(reference);
    let revision = state.revisions.get(family).copied().unwrap_or(1);
    task_arn(family, revision)
}

#[async_trait]
impl EcsApi for FakeAws {
    async fn list_clusters(&self, next_token: Option<String>) -> ApiResult<Page<String>> {
        self.record("ListClusters".to_string());
        let state = self.state();
        let mut names: BTreeSet<&String> = state.clusters.keys().collect();
        names.extend(state.services.keys().map(|(cluster, _)| cluster));
        let arns: Vec<String> = names
            .into_iter()
            .map(|n| format!("{}:cluster/{}", ACCOUNT, n))
            .collect();
        Ok(paginate(&arns, next_token, state.page_size))
    }

    async fn describe_clusters(&self, names: &[String]) -> ApiResult<Vec<ClusterSummary>> {
        self.record(format!("DescribeClusters {}", names.len()));
        let mut state = self.state();
        state.max_describe_clusters = state.max_describe_clusters.max(names.len());
        Ok(names
            .iter()
            .filter_map(|n| {
                state.clusters.get(n).map(|status| ClusterSummary {
                    name: n.clone(),
                    status: status.clone(),
                })
            })
            .collect())
    }

    async fn create_cluster(&self, name: &str) -> ApiResult<()> {
        self.record(format!("CreateCluster {}", name));
        self.state()
            .clusters
            .insert(name.to_string(), "ACTIVE".to_string());
        Ok(())
    }

    async fn list_services(&self, cluster: &str, next_token: Option<String>) -> ApiResult<Page<String>> {
        self.record(format!("ListServices {}", cluster));
        let state = self.state();
        let arns: Vec<String> = state
            .services
            .keys()
            .filter(|(c, _)| c == cluster)
            .map(|(c, s)| format!("{}:service/{}/{}", ACCOUNT, c, s))
            .collect();
        Ok(paginate(&arns, next_token, state.page_size))
    }

    async fn describe_services(&self, cluster: &str, services: &[String]) -> ApiResult<Vec<ServiceSummary>> {
        self.record(format!("DescribeServices {} {}", cluster, services.len()));
        let mut state = self.state();
        state.max_describe_services = state.max_describe_services.max(services.len());
        if services.len() > 10 {
            return Err(ApiError::new(
                "DescribeServices",
                Some("InvalidParameterException"),
                "services can have at most 10 items",
            ));
        }

        Ok(services
            .iter()
            .filter_map(|arn| {
                let name = ecspress::naming::arn_suffix(arn);
                state
                    .services
                    .get(&(cluster.to_string(), name.to_string()))
                    .map(|td| ServiceSummary {
                        name: name.to_string(),
                        task_definition: td.clone(),
                    })
            })
            .collect())
    }

    async fn create_service(&self, service: &config::Service) -> ApiResult<()> {
        self.record(format!("CreateService {}/{}", service.cluster, service.service_name));
        let mut state = self.state();
        let arn = latest_arn(&state, &service.task_definition);
        state
            .services
            .insert((service.cluster.clone(), service.service_name.clone()), arn);
        Ok(())
    }

    async fn update_service(&self, service: &config::Service) -> ApiResult<()> {
        self.record(format!("UpdateService {}/{}", service.cluster, service.service_name));
        let mut state = self.state();
        if state.rate_exceeded_updates > 0 {
            state.rate_exceeded_updates -= 1;
            return Err(throttled("UpdateService"));
        }

        let key = (service.cluster.clone(), service.service_name.clone());
        if !state.services.contains_key(&key) {
            return Err(ApiError::new(
                "UpdateService",
                Some("ServiceNotFoundException"),
                "Service not found.",
            ));
        }
        let arn = latest_arn(&state, &service.task_definition);
        state.services.insert(key, arn);
        Ok(())
    }

    async fn register_task_definition(&self, task: &TaskDefinition) -> ApiResult<String> {
        self.record(format!("RegisterTaskDefinition {}", task.family));
        let mut state = self.state();
        let revision = state.revisions.entry(task.family.clone()).or_insert(0);
        *revision += 1;
        let arn = task_arn(&task.family, *revision);
        state.active_task_definitions.insert(arn.clone());
        Ok(arn)
    }

    async fn list_task_definitions(&self, next_token: Option<String>) -> ApiResult<Page<String>> {
        self.record("ListTaskDefinitions".to_string());
        let state = self.state();
        let arns: Vec<String> = state.active_task_definitions.iter().cloned().collect();
        Ok(paginate(&arns, next_token, state.page_size))
    }

    async fn deregister_task_definition(&self, arn: &str) -> ApiResult<()> {
        self.record(format!("DeregisterTaskDefinition {}", arn));
        let mut state = self.state();
        if state.throttle_deregister.contains(arn) {
            return Err(throttled("DeregisterTaskDefinition"));
        }
        if state.reject_deregister.contains(arn) {
            return Err(ApiError::new(
                "DeregisterTaskDefinition",
                Some("ClientException"),
                "The specified task definition does not exist.",
            ));
        }
        state.active_task_definitions.remove(arn);
        Ok(())
    }

    async fn container_instance_failures(&self, cluster: &str, ids: &[String]) -> ApiResult<Vec<String>> {
        self.record(format!("DescribeContainerInstances {} {}", cluster, ids.len()));
        let mut state = self.state();
        state.max_container_instances = state.max_container_instances.max(ids.len());
        if ids.len() > 100 {
            return Err(ApiError::new(
                "DescribeContainerInstances",
                Some("InvalidParameterException"),
                "containerInstances can have at most 100 items",
            ));
        }

        Ok(ids
            .iter()
            .filter(|id| state.failed_instances.contains(*id))
            .map(|id| container_instance_arn(cluster, id))
            .collect())
    }
}

#[async_trait]
impl ScalingApi for FakeAws {
    async fn register_scalable_target(&self, resource_id: &str, min: i32, max: i32) -> ApiResult<()> {
        self.record(format!("RegisterScalableTarget {}", resource_id));
        self.state()
            .scalable_targets
            .insert(resource_id.to_string(), (min, max));
        Ok(())
    }

    async fn deregister_scalable_target(&self, resource_id: &str) -> ApiResult<()> {
        self.record(format!("DeregisterScalableTarget {}", resource_id));
        let mut state = self.state();
        if state.scalable_targets.remove(resource_id).is_none() {
            return Err(ApiError::new(
                "DeregisterScalableTarget",
                Some("ObjectNotFoundException"),
                "No scalable target registered",
            ));
        }
        state.policies.retain(|(rid, _), _| rid != resource_id);
        Ok(())
    }

    async fn describe_scaling_policies(&self, next_token: Option<String>) -> ApiResult<Page<PolicySummary>> {
        self.record("DescribeScalingPolicies".to_string());
        let state = self.state();
        let policies: Vec<PolicySummary> = state
            .policies
            .iter()
            .map(|((resource_id, name), arn)| PolicySummary {
                name: name.clone(),
                resource_id: resource_id.clone(),
                arn: arn.clone(),
            })
            .collect();
        Ok(paginate(&policies, next_token, state.page_size))
    }

    async fn put_scaling_policy(&self, resource_id: &str, policy: &ScalingPolicy) -> ApiResult<String> {
        self.record(format!("PutScalingPolicy {} {}", resource_id, policy.policy_name));
        let arn = format!(
            "arn:aws:autoscaling:eu-west-1:000000000000:scalingPolicy:{}:policyName/{}",
            resource_id, policy.policy_name
        );
        self.state().policies.insert(
            (resource_id.to_string(), policy.policy_name.clone()),
            arn.clone(),
        );
        Ok(arn)
    }

    async fn delete_scaling_policy(&self, name: &str, resource_id: &str) -> ApiResult<()> {
        self.record(format!("DeleteScalingPolicy {} {}", resource_id, name));
        self.state()
            .policies
            .remove(&(resource_id.to_string(), name.to_string()));
        Ok(())
    }
}

#[async_trait]
impl CloudWatchApi for FakeAws {
    async fn list_metrics(&self, namespace: &str, next_token: Option<String>) -> ApiResult<Page<String>> {
        self.record(format!("ListMetrics {}", namespace));
        let state = self.state();
        let names: Vec<String> = state
            .metrics
            .get(namespace)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        Ok(paginate(&names, next_token, state.page_size))
    }

    async fn put_metric_data(&self, metric: &MetricStat, value: f64) -> ApiResult<()> {
        self.record(format!(
            "PutMetricData {} {} {}",
            metric.metric.namespace, metric.metric.metric_name, value
        ));
        self.state()
            .metrics
            .entry(metric.metric.namespace.clone())
            .or_default()
            .insert(metric.metric.metric_name.clone());
        Ok(())
    }

    async fn describe_alarms(&self, prefix: &str, next_token: Option<String>) -> ApiResult<Page<String>> {
        self.record("DescribeAlarms".to_string());
        let state = self.state();
        let names: Vec<String> = state
            .alarms
            .keys()
            .filter(|n| n.starts_with(prefix))
            .cloned()
            .collect();
        Ok(paginate(&names, next_token, state.page_size))
    }

    async fn put_metric_alarm(&self, request: &AlarmRequest<'_>) -> ApiResult<()> {
        self.record(format!("PutMetricAlarm {}", request.alarm.alarm_name));
        self.state().alarms.insert(
            request.alarm.alarm_name.clone(),
            (request.ok_actions.clone(), request.alarm_actions.clone()),
        );
        Ok(())
    }

    async fn delete_alarms(&self, names: &[String]) -> ApiResult<()> {
        self.record(format!("DeleteAlarms {}", names.join(",")));
        let mut state = self.state();
        state.max_delete_alarms = state.max_delete_alarms.max(names.len());
        for name in names {
            state.alarms.remove(name);
        }
        Ok(())
    }
}

#[async_trait]
impl LogsApi for FakeAws {
    async fn describe_log_groups(&self, prefix: &str, next_token: Option<String>) -> ApiResult<Page<String>> {
        self.record("DescribeLogGroups".to_string());
        let state = self.state();
        let names: Vec<String> = state
            .log_groups
            .keys()
            .filter(|n| n.starts_with(prefix))
            .cloned()
            .collect();
        Ok(paginate(&names, next_token, state.page_size))
    }

    async fn create_log_group(&self, name: &str) -> ApiResult<()> {
        self.record(format!("CreateLogGroup {}", name));
        let mut state = self.state();
        if state.log_groups.contains_key(name) {
            return Err(ApiError::new(
                "CreateLogGroup",
                Some("ResourceAlreadyExistsException"),
                "The specified log group already exists",
            ));
        }
        state.log_groups.insert(name.to_string(), None);
        Ok(())
    }

    async fn put_retention_policy(&self, name: &str, days: i32) -> ApiResult<()> {
        self.record(format!("PutRetentionPolicy {} {}", name, days));
        match self.state().log_groups.get_mut(name) {
            Some(retention) => {
                *retention = Some(days);
                Ok(())
            }
            None => Err(ApiError::new(
                "PutRetentionPolicy",
                Some("ResourceNotFoundException"),
                "The specified log group does not exist.",
            )),
        }
    }

    async fn delete_log_group(&self, name: &str) -> ApiResult<()> {
        self.record(format!("DeleteLogGroup {}", name));
        let mut state = self.state();
        state.log_groups.remove(name);
        state.log_streams.remove(name);
        Ok(())
    }

    async fn describe_log_streams(
        &self,
        group: &str,
        prefix: &str,
        next_token: Option<String>,
    ) -> ApiResult<Page<LogStreamSummary>> {
        self.record(format!("DescribeLogStreams {}", group));
        let state = self.state();
        let streams: Vec<LogStreamSummary> = state
            .log_streams
            .get(group)
            .map(|s| s.iter().filter(|s| s.name.starts_with(prefix)).cloned().collect())
            .unwrap_or_default();
        Ok(paginate(&streams, next_token, state.page_size))
    }

    async fn delete_log_stream(&self, group: &str, stream: &str) -> ApiResult<()> {
        self.record(format!("DeleteLogStream {} {}", group, stream));
        if let Some(streams) = self.state().log_streams.get_mut(group) {
            streams.retain(|s| s.name != stream);
        }
        Ok(())
    }
}

/// Merge YAML documents into a validated config
pub fn load_config(documents: &[&str]) -> Config {
    let config = unvalidated_config(documents);
    validate::validate(&config).unwrap();
    config
}

pub fn unvalidated_config(documents: &[&str]) -> Config {
    let mut config = Config::default();
    for (i, document) in documents.iter().enumerate() {
        config
            .merge_document(Path::new(&format!("doc-{}.yml", i)), document)
            .unwrap();
    }
    config
}

/// A service with an inline task, one container logging to `/ecs/<name>`
pub fn service_doc(cluster: &str, name: &str) -> String {
    format!(
        r#"
service:
  serviceName: {name}
  cluster: {cluster}
  taskDefinition: {name}
  desiredCount: 1
  task:
    family: {name}
    containerDefinitions:
      - name: {name}
        image: repo/{name}:1
        memoryReservation: 128
        logConfiguration:
          logDriver: awslogs
          options:
            awslogs-group: /ecs/{name}
            awslogs-stream-prefix: ecs
"#
    )
}

/// Like [`service_doc`], plus a scale block, a metric and an alarm acting on
/// the `<name>-scale-out` policy
pub fn scaled_service_doc(cluster: &str, name: &str) -> String {
    format!(
        r#"{base}
  scale:
    MinCapacity: 1
    MaxCapacity: 4
    policies:
      - PolicyName: {name}-scale-out
        StepScalingPolicyConfiguration:
          AdjustmentType: ChangeInCapacity
          Cooldown: 60
          StepAdjustments:
            - MetricIntervalLowerBound: 0
              ScalingAdjustment: 1
  metric:
    MetricStat:
      Metric:
        Namespace: Custom/{name}
        MetricName: {name}-queue-depth
      Period: 60
      Stat: Average
      Unit: Count
  alarm:
    AlarmName: "ecs:{name}-queue-high"
    AlarmActions: [{name}-scale-out]
    EvaluationPeriods: 1
    Threshold: 10
    ComparisonOperator: GreaterThanThreshold
"#,
        base = service_doc(cluster, name).trim_end(),
    )
}
