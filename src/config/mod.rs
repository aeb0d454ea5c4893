//! Configuration Loader
//!
//! Reads a directory tree of YAML documents into typed collections.
//!
//! Each document is a mapping whose top-level keys name the kind of definition:
//!
//! ```yaml
//! service:
//!   serviceName: web
//!   cluster: main
//!   taskDefinition: web
//!   desiredCount: 2
//!   task:            # optional, same as a separate `task:` document
//!     family: web
//!     containerDefinitions: [...]
//! ```

pub mod model;
pub mod validate;

pub use model::*;

use crate::error::ConfigError;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

/// All definitions found under a config path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub tasks: Vec<TaskDefinition>,
    pub services: Vec<Service>,
    pub clusters: Vec<Cluster>,
}

/// Runtime values injected into every container definition
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub image: Option<String>,
    pub entry_point: Vec<String>,
    pub command: Vec<String>,
    pub environment: Option<Vec<KeyValue>>,
}

impl Overrides {
    pub fn image(image: Option<String>) -> Self {
        Self {
            image,
            ..Self::default()
        }
    }

    /// Parse `--environment`, a JSON list of `{"name": ..., "value": ...}`
    pub fn with_environment_json(mut self, json: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(json) = json {
            let environment = serde_json::from_str(json).map_err(ConfigError::Environment)?;
            self.environment = Some(environment);
        }
        Ok(self)
    }

    fn apply(&self, container: &mut ContainerDefinition) {
        if let Some(image) = &self.image {
            container.image = Some(image.clone());
        }
        if !self.entry_point.is_empty() {
            container.entry_point = self.entry_point.clone();
        }
        if !self.command.is_empty() {
            container.command = self.command.clone();
        }
        if let Some(environment) = &self.environment {
            container.environment = environment.clone();
        }
    }
}

impl Config {
    /// Load and validate every `.yml`/`.yaml` file under `root`
    pub fn load(root: &Path, overrides: &Overrides) -> Result<Self, ConfigError> {
        tracing::info!("Reading yaml config files from {}", root.display());

        let mut config = Config::default();
        let files = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable path: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_yaml(entry.path()));

        for entry in files {
            let path = entry.path();
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            config.merge_document(path, &content)?;
        }

        if config.tasks.is_empty() && config.services.is_empty() {
            tracing::error!("No service definition is found!");
            return Err(ConfigError::Empty(root.to_path_buf()));
        }

        for task in &mut config.tasks {
            for container in &mut task.container_definitions {
                overrides.apply(container);
            }
        }

        if let Err(e) = validate::validate(&config) {
            tracing::error!("Config is not valid!");
            return Err(e);
        }

        tracing::debug!(
            "Loaded {} tasks, {} services, {} clusters",
            config.tasks.len(),
            config.services.len(),
            config.clusters.len()
        );
        Ok(config)
    }

    /// Parse one YAML document and add its definitions
    pub fn merge_document(&mut self, path: &Path, content: &str) -> Result<(), ConfigError> {
        let parse_err = |source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        };

        let document: Option<BTreeMap<String, Value>> =
            serde_yaml::from_str(content).map_err(parse_err)?;
        let Some(document) = document else {
            tracing::debug!("Empty document: {}", path.display());
            return Ok(());
        };

        for (kind, value) in document {
            match kind.as_str() {
                "task" => self.tasks.push(serde_yaml::from_value(value).map_err(parse_err)?),
                "service" => {
                    let mut service: Service = serde_yaml::from_value(value).map_err(parse_err)?;
                    if let Some(task) = service.task.take() {
                        self.tasks.push(task);
                    }
                    self.services.push(service);
                }
                "cluster" => self
                    .clusters
                    .push(serde_yaml::from_value(value).map_err(parse_err)?),
                _ => {
                    return Err(ConfigError::UnknownKind {
                        path: path.to_path_buf(),
                        kind,
                    })
                }
            }
        }
        Ok(())
    }

    pub fn task(&self, family: &str) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|t| t.family == family)
    }

    /// Services called `name`, one per cluster at most
    pub fn services_named(&self, name: &str) -> Vec<&Service> {
        self.services
            .iter()
            .filter(|s| s.service_name == name)
            .collect()
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml" | "yaml")
    )
}
