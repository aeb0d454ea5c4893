//! ECS: clusters, services, task definitions

use super::error::{from_build, from_sdk};
use super::{ClusterSummary, EcsApi, ServiceSummary};
use crate::config;
use crate::error::{ApiError, ApiResult};
use crate::resource::Page;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ecs::error::BuildError;
use aws_sdk_ecs::types as ecs;
use aws_sdk_ecs::Client;

/// ECS list calls accept at most 100 results per page
const LIST_PAGE_SIZE: i32 = 100;

#[derive(Clone)]
pub struct AwsEcs {
    client: Client,
}

impl AwsEcs {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self::from_client(Client::new(sdk_config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EcsApi for AwsEcs {
    async fn list_clusters(&self, next_token: Option<String>) -> ApiResult<Page<String>> {
        let resp = self
            .client
            .list_clusters()
            .max_results(LIST_PAGE_SIZE)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| from_sdk("ListClusters", e))?;

        Ok(Page::new(
            resp.cluster_arns().to_vec(),
            resp.next_token().map(str::to_string),
        ))
    }

    async fn describe_clusters(&self, names: &[String]) -> ApiResult<Vec<ClusterSummary>> {
        let resp = self
            .client
            .describe_clusters()
            .set_clusters(Some(names.to_vec()))
            .send()
            .await
            .map_err(|e| from_sdk("DescribeClusters", e))?;

        Ok(resp
            .clusters()
            .iter()
            .map(|c| ClusterSummary {
                name: c.cluster_name().unwrap_or_default().to_string(),
                status: c.status().unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn create_cluster(&self, name: &str) -> ApiResult<()> {
        let resp = self
            .client
            .create_cluster()
            .cluster_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("CreateCluster", e))?;
        tracing::debug!("Created cluster details: {:?}", resp.cluster());
        Ok(())
    }

    async fn list_services(&self, cluster: &str, next_token: Option<String>) -> ApiResult<Page<String>> {
        let resp = self
            .client
            .list_services()
            .cluster(cluster)
            .max_results(LIST_PAGE_SIZE)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| from_sdk("ListServices", e))?;

        Ok(Page::new(
            resp.service_arns().to_vec(),
            resp.next_token().map(str::to_string),
        ))
    }

    async fn describe_services(&self, cluster: &str, services: &[String]) -> ApiResult<Vec<ServiceSummary>> {
        let resp = self
            .client
            .describe_services()
            .cluster(cluster)
            .set_services(Some(services.to_vec()))
            .send()
            .await
            .map_err(|e| from_sdk("DescribeServices", e))?;

        Ok(resp
            .services()
            .iter()
            .map(|s| ServiceSummary {
                name: s.service_name().unwrap_or_default().to_string(),
                task_definition: s.task_definition().unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn create_service(&self, service: &config::Service) -> ApiResult<()> {
        let build = |e| from_build("CreateService", e);

        let resp = self
            .client
            .create_service()
            .cluster(&service.cluster)
            .service_name(&service.service_name)
            .task_definition(&service.task_definition)
            .desired_count(service.desired_count)
            .set_launch_type(service.launch_type.as_deref().map(ecs::LaunchType::from))
            .set_scheduling_strategy(
                service
                    .scheduling_strategy
                    .as_deref()
                    .map(ecs::SchedulingStrategy::from),
            )
            .set_deployment_controller(deployment_controller(service).map_err(build)?)
            .set_load_balancers(Some(load_balancers(service)))
            .set_placement_constraints(Some(placement_constraints(service)))
            .set_placement_strategy(Some(placement_strategy(service)))
            .set_deployment_configuration(deployment_configuration(service))
            .set_network_configuration(network_configuration(service).map_err(build)?)
            .set_health_check_grace_period_seconds(service.health_check_grace_period_seconds)
            .send()
            .await
            .map_err(|e| from_sdk("CreateService", e))?;

        tracing::debug!("Created service details: {:?}", resp.service());
        Ok(())
    }

    async fn update_service(&self, service: &config::Service) -> ApiResult<()> {
        let strategy = placement_strategy(service);

        // If a task revision is not specified, the latest ACTIVE revision is used.
        let resp = self
            .client
            .update_service()
            .cluster(&service.cluster)
            .service(&service.service_name)
            .desired_count(service.desired_count)
            .task_definition(&service.task_definition)
            .force_new_deployment(true)
            .set_deployment_configuration(deployment_configuration(service))
            .set_placement_strategy((!strategy.is_empty()).then_some(strategy))
            .set_network_configuration(
                network_configuration(service).map_err(|e| from_build("UpdateService", e))?,
            )
            .send()
            .await
            .map_err(|e| from_sdk("UpdateService", e))?;

        tracing::debug!("Updated service details: {:?}", resp.service());
        Ok(())
    }

    async fn register_task_definition(&self, task: &config::TaskDefinition) -> ApiResult<String> {
        let containers = task
            .container_definitions
            .iter()
            .map(container_definition)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| from_build("RegisterTaskDefinition", e))?;

        let resp = self
            .client
            .register_task_definition()
            .family(&task.family)
            .set_task_role_arn(task.task_role_arn.clone())
            .set_execution_role_arn(task.execution_role_arn.clone())
            .set_network_mode(task.network_mode.as_deref().map(ecs::NetworkMode::from))
            .set_container_definitions(Some(containers))
            .set_requires_compatibilities(Some(
                task.requires_compatibilities
                    .iter()
                    .map(|c| ecs::Compatibility::from(c.as_str()))
                    .collect(),
            ))
            .set_cpu(task.cpu.clone())
            .set_memory(task.memory.clone())
            .set_volumes(Some(task.volumes.iter().map(volume).collect()))
            .send()
            .await
            .map_err(|e| from_sdk("RegisterTaskDefinition", e))?;

        resp.task_definition()
            .and_then(|t| t.task_definition_arn())
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::new(
                    "RegisterTaskDefinition",
                    None,
                    "response did not include a task definition ARN",
                )
            })
    }

    async fn list_task_definitions(&self, next_token: Option<String>) -> ApiResult<Page<String>> {
        let resp = self
            .client
            .list_task_definitions()
            .status(ecs::TaskDefinitionStatus::Active)
            .max_results(LIST_PAGE_SIZE)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| from_sdk("ListTaskDefinitions", e))?;

        Ok(Page::new(
            resp.task_definition_arns().to_vec(),
            resp.next_token().map(str::to_string),
        ))
    }

    async fn deregister_task_definition(&self, arn: &str) -> ApiResult<()> {
        let resp = self
            .client
            .deregister_task_definition()
            .task_definition(arn)
            .send()
            .await
            .map_err(|e| from_sdk("DeregisterTaskDefinition", e))?;
        tracing::debug!("Deregistered stale task: {:?}", resp.task_definition());
        Ok(())
    }

    async fn container_instance_failures(&self, cluster: &str, ids: &[String]) -> ApiResult<Vec<String>> {
        let resp = self
            .client
            .describe_container_instances()
            .cluster(cluster)
            .set_container_instances(Some(ids.to_vec()))
            .send()
            .await
            .map_err(|e| from_sdk("DescribeContainerInstances", e))?;

        Ok(resp
            .failures()
            .iter()
            .filter_map(|f| f.arn())
            .map(str::to_string)
            .collect())
    }
}

// =============================================================================
// Config -> SDK conversions
// =============================================================================

fn deployment_controller(service: &config::Service) -> Result<Option<ecs::DeploymentController>, BuildError> {
    service
        .deployment_controller
        .as_ref()
        .map(|c| {
            ecs::DeploymentController::builder()
                .r#type(ecs::DeploymentControllerType::from(c.kind.as_str()))
                .build()
        })
        .transpose()
}

fn load_balancers(service: &config::Service) -> Vec<ecs::LoadBalancer> {
    service
        .load_balancers
        .iter()
        .map(|lb| {
            ecs::LoadBalancer::builder()
                .set_target_group_arn(lb.target_group_arn.clone())
                .set_load_balancer_name(lb.load_balancer_name.clone())
                .container_name(&lb.container_name)
                .container_port(lb.container_port)
                .build()
        })
        .collect()
}

fn placement_constraints(service: &config::Service) -> Vec<ecs::PlacementConstraint> {
    service
        .placement_constraints
        .iter()
        .map(|p| {
            ecs::PlacementConstraint::builder()
                .r#type(ecs::PlacementConstraintType::from(p.kind.as_str()))
                .set_expression(p.expression.clone())
                .build()
        })
        .collect()
}

fn placement_strategy(service: &config::Service) -> Vec<ecs::PlacementStrategy> {
    service
        .placement_strategy
        .iter()
        .map(|p| {
            ecs::PlacementStrategy::builder()
                .r#type(ecs::PlacementStrategyType::from(p.kind.as_str()))
                .set_field(p.field.clone())
                .build()
        })
        .collect()
}

fn deployment_configuration(service: &config::Service) -> Option<ecs::DeploymentConfiguration> {
    service.deployment_configuration.as_ref().map(|d| {
        ecs::DeploymentConfiguration::builder()
            .set_maximum_percent(d.maximum_percent)
            .set_minimum_healthy_percent(d.minimum_healthy_percent)
            .build()
    })
}

fn network_configuration(service: &config::Service) -> Result<Option<ecs::NetworkConfiguration>, BuildError> {
    let Some(network) = &service.network_configuration else {
        return Ok(None);
    };
    let vpc = &network.awsvpc_configuration;

    let awsvpc = ecs::AwsVpcConfiguration::builder()
        .set_subnets(Some(vpc.subnets.clone()))
        .set_security_groups(Some(vpc.security_groups.clone()))
        .set_assign_public_ip(vpc.assign_public_ip.as_deref().map(ecs::AssignPublicIp::from))
        .build()?;

    Ok(Some(
        ecs::NetworkConfiguration::builder()
            .awsvpc_configuration(awsvpc)
            .build(),
    ))
}

fn container_definition(container: &config::ContainerDefinition) -> Result<ecs::ContainerDefinition, BuildError> {
    let log_configuration = container
        .log_configuration
        .as_ref()
        .map(|l| {
            ecs::LogConfiguration::builder()
                .log_driver(ecs::LogDriver::from(l.log_driver.as_str()))
                .set_options(Some(l.options.clone().into_iter().collect()))
                .build()
        })
        .transpose()?;

    let ulimits = container
        .ulimits
        .iter()
        .map(|u| {
            ecs::Ulimit::builder()
                .name(ecs::UlimitName::from(u.name.as_str()))
                .soft_limit(u.soft_limit)
                .hard_limit(u.hard_limit)
                .build()
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ecs::ContainerDefinition::builder()
        .name(&container.name)
        .set_image(container.image.clone())
        .cpu(container.cpu)
        .set_memory(container.memory)
        .set_memory_reservation(container.memory_reservation)
        .set_essential(container.essential)
        .set_log_configuration(log_configuration)
        .set_entry_point(Some(container.entry_point.clone()))
        .set_command(Some(container.command.clone()))
        .set_environment(Some(
            container
                .environment
                .iter()
                .map(|kv| ecs::KeyValuePair::builder().name(&kv.name).value(&kv.value).build())
                .collect(),
        ))
        .set_port_mappings(Some(
            container
                .port_mappings
                .iter()
                .map(|p| {
                    ecs::PortMapping::builder()
                        .set_container_port(p.container_port)
                        .set_host_port(p.host_port)
                        .set_protocol(p.protocol.as_deref().map(ecs::TransportProtocol::from))
                        .build()
                })
                .collect(),
        ))
        .set_ulimits(Some(ulimits))
        .set_mount_points(Some(
            container
                .mount_points
                .iter()
                .map(|m| {
                    ecs::MountPoint::builder()
                        .set_source_volume(m.source_volume.clone())
                        .set_container_path(m.container_path.clone())
                        .set_read_only(m.read_only)
                        .build()
                })
                .collect(),
        ))
        .set_links(Some(container.links.clone()))
        .build())
}

fn volume(volume: &config::Volume) -> ecs::Volume {
    ecs::Volume::builder()
        .name(&volume.name)
        .set_host(volume.host.as_ref().map(|h| {
            ecs::HostVolumeProperties::builder()
                .set_source_path(h.source_path.clone())
                .build()
        }))
        .build()
}
