//! ecspress: deployment helper for AWS ECS
//!
//! Reads task, service and cluster definitions from a tree of YAML documents
//! and reconciles them against ECS, Application Auto Scaling, CloudWatch and
//! CloudWatch Logs.

pub mod aws;
pub mod config;
pub mod docker;
pub mod error;
pub mod naming;
pub mod reconcile;
pub mod resource;
pub mod retry;
pub mod settings;

/// Version injected at compile time via ECSPRESS_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("ECSPRESS_VERSION") {
    Some(v) => v,
    None => "dev",
};
