//! Container runtime collaborator (spec §1): `create`, `inspect`, `stop`,
//! `remove`, `get_by_name`, backed by the Docker Engine API via `bollard`.
//!
//! No other crate in the corpus this was built from talks to Docker; this
//! is grounded on a different example service's own Docker-backed backend
//! manager, which uses the same "launch an image with GPU access next to a
//! shared network, then poll its health" shape this gateway needs.

use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::models::{DeviceRequest, HostConfig};
use bollard::Docker;
use std::collections::HashMap;

use crate::error::RuntimeError;

/// Opaque handle returned by `create`/`get_by_name`; wraps the Docker
/// container id. Intentionally not `Copy` — callers pass it by reference
/// when all they need is to inspect/stop/remove it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle(pub String);

/// Everything the launcher needs to start an engine instance (spec §4.4,
/// §6 "Container creation parameters").
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub env: Vec<(String, String)>,
    pub network: String,
    pub gpu: bool,
    /// `(host_path, container_path)` pairs, always mounted read-write.
    pub volume_mounts: Vec<(String, String)>,
    pub ipc_mode: Option<String>,
}

/// What `inspect` reports back to the launcher.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub args: Vec<String>,
    pub ip: Option<String>,
}

/// Cheaply `Clone`: `bollard::Docker` wraps its transport in an `Arc`
/// internally, so sharing one `ContainerRuntime` between the launcher and
/// the controller doesn't open a second connection.
#[derive(Clone)]
pub struct ContainerRuntime {
    docker: Docker,
}

impl ContainerRuntime {
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    pub async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle, RuntimeError> {
        let env: Vec<String> = spec
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        let binds: Vec<String> = spec
            .volume_mounts
            .iter()
            .map(|(host, container)| format!("{host}:{container}:rw"))
            .collect();

        let device_requests = spec.gpu.then(|| {
            vec![DeviceRequest {
                driver: Some("nvidia".to_string()),
                count: Some(-1),
                capabilities: Some(vec![vec!["gpu".to_string()]]),
                ..Default::default()
            }]
        });

        let host_config = HostConfig {
            binds: Some(binds),
            ipc_mode: spec.ipc_mode.clone(),
            network_mode: Some(spec.network.clone()),
            device_requests,
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            env: Some(env),
            hostname: Some(spec.name.clone()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let created = self.docker.create_container(Some(options), config).await?;
        self.docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await?;

        Ok(ContainerHandle(created.id))
    }

    pub async fn inspect(
        &self,
        handle: &ContainerHandle,
        network: &str,
    ) -> Result<ContainerInfo, RuntimeError> {
        let inspect = self.docker.inspect_container(&handle.0, None).await?;

        let args = inspect
            .config
            .as_ref()
            .and_then(|c| c.cmd.clone())
            .unwrap_or_default();

        let ip = inspect
            .network_settings
            .as_ref()
            .and_then(|ns| ns.networks.as_ref())
            .and_then(|nets| nets.get(network))
            .and_then(|n| n.ip_address.clone())
            .filter(|ip| !ip.is_empty());

        Ok(ContainerInfo { args, ip })
    }

    /// Stop with a bounded timeout; errors are swallowed by the caller per
    /// spec §4.4 stale-container cleanup ("stop, errors ignored").
    pub async fn stop(&self, handle: &ContainerHandle, timeout_secs: i64) -> Result<(), RuntimeError> {
        self.docker
            .stop_container(&handle.0, Some(StopContainerOptions { t: timeout_secs }))
            .await?;
        Ok(())
    }

    pub async fn remove(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        self.docker
            .remove_container(
                &handle.0,
                Some(RemoveContainerOptions { force: true, ..Default::default() }),
            )
            .await?;
        Ok(())
    }

    /// Look up a container by its deterministic name (`<prefix>_<slot>`).
    pub async fn get_by_name(&self, name: &str) -> Result<Option<ContainerHandle>, RuntimeError> {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![name.to_string()]);

        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            }))
            .await?;

        let wanted = format!("/{name}");
        Ok(containers
            .into_iter()
            .find(|c| {
                c.names
                    .as_ref()
                    .map(|names| names.iter().any(|n| n == &wanted || n == name))
                    .unwrap_or(false)
            })
            .and_then(|c| c.id)
            .map(ContainerHandle))
    }

    /// Resolve the configured network name against the network(s) the
    /// gateway's own container is attached to, per spec §4.1: if the
    /// gateway is attached to a network whose name *ends with* the
    /// configured value, use that exact name (compose/stack deployments
    /// prefix network names with a project name we cannot know ahead of
    /// time). Falls back to the configured value verbatim.
    pub async fn resolve_network_name(&self, configured: &str, self_container_name: &str) -> String {
        let Ok(Some(handle)) = self.get_by_name(self_container_name).await else {
            tracing::warn!(configured, "could not resolve own container; using network name as-is");
            return configured.to_string();
        };

        let Ok(inspect) = self.docker.inspect_container(&handle.0, None).await else {
            return configured.to_string();
        };

        let networks = inspect
            .network_settings
            .and_then(|ns| ns.networks)
            .unwrap_or_default();

        networks
            .keys()
            .find(|name| name.ends_with(configured))
            .cloned()
            .unwrap_or_else(|| configured.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_spec_builds_expected_binds_shape() {
        let spec = ContainerSpec {
            name: "gw_0".into(),
            image: "engine:latest".into(),
            command: vec!["--model".into(), "m".into()],
            env: vec![("HUGGING_FACE_HUB_TOKEN".into(), "tok".into())],
            network: "gw_net".into(),
            gpu: true,
            volume_mounts: vec![("/host/cache".into(), "/root/.cache/huggingface".into())],
            ipc_mode: Some("host".into()),
        };
        assert_eq!(spec.volume_mounts.len(), 1);
        assert_eq!(spec.ipc_mode.as_deref(), Some("host"));
    }
}
