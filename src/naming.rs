//! Naming conventions
//!
//! Only resources following these conventions are ever considered for cleanup.

/// Log groups managed by ecspress live under this path
pub const LOG_GROUP_PREFIX: &str = "/ecs/";

/// Required `awslogs-stream-prefix`
pub const LOG_STREAM_PREFIX: &str = "ecs";

/// Alarms managed by ecspress start with this prefix
pub const ALARM_PREFIX: &str = "ecs:";

/// Retention applied to every defined log group
pub const LOG_RETENTION_DAYS: i32 = 7;

/// Application Auto Scaling namespace and dimension for ECS services
pub const SERVICE_NAMESPACE: &str = "ecs";
pub const SCALABLE_DIMENSION: &str = "ecs:service:DesiredCount";

/// Autoscaling resource id of a service
pub fn resource_id(cluster: &str, service: &str) -> String {
    format!("service/{}/{}", cluster, service)
}

/// Last `/` segment of an ARN or path.
///
/// Handles both ARN styles:
/// `arn:aws:ecs:eu-west-1:0000:service/foo` and
/// `arn:aws:ecs:eu-west-1:0000:service/<cluster>/foo`
pub fn arn_suffix(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

/// Family name of a task definition reference (`family`, `family:3` or a full ARN)
pub fn task_family(reference: &str) -> &str {
    let name = arn_suffix(reference);
    name.split(':').next().unwrap_or(name)
}

/// `/ecs/<name>`: exactly three segments with `ecs` in the middle
pub fn is_managed_log_group(name: &str) -> bool {
    let parts: Vec<&str> = name.split('/').collect();
    parts.len() == 3 && parts[0].is_empty() && parts[1] == "ecs"
}

pub fn is_managed_alarm(name: &str) -> bool {
    name.starts_with(ALARM_PREFIX)
}
