//! C4 — turns `(model_id, slot_index)` into a live `Instance`, or fails
//! (spec §4.4).

use std::time::Duration;

use common::GatewayError;
use metadata::{gguf, ModelMetadataClient, WeightsDownloadClient};
use registry::{Instance, LockTable};
use runtime::{ContainerHandle, ContainerInfo, ContainerRuntime, ContainerSpec};

use crate::config::{AdmissionConfig, EngineKnobs};

const STALE_STOP_TIMEOUT_SECS: i64 = 10;
const STALE_POLL_ATTEMPTS: u32 = 10;
const STALE_POLL_INTERVAL: Duration = Duration::from_millis(500);
const HEALTH_PROBE_INTERVAL: Duration = Duration::from_secs(2);
const HEALTH_PROBE_ATTEMPTS: u32 = 1800;
const HEALTH_PROBE_PROGRESS_EVERY: u32 = 15; // 15 * 2s = 30s

/// What GGUF resolution decided for the `--model`/`--tokenizer`/
/// `--hf-config-path` triple, plus which repo to use for max-length discovery.
struct ResolvedModel {
    model_path: String,
    tokenizer: Option<String>,
    hf_config_path: Option<String>,
    metadata_repo: String,
}

pub struct EngineLauncher {
    runtime: ContainerRuntime,
    download_client: WeightsDownloadClient,
    metadata_client: ModelMetadataClient,
    health_client: reqwest::Client,
    download_locks: LockTable,
}

impl EngineLauncher {
    pub fn new(
        runtime: ContainerRuntime,
        download_client: WeightsDownloadClient,
        metadata_client: ModelMetadataClient,
        download_locks: LockTable,
    ) -> Self {
        let health_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { runtime, download_client, metadata_client, health_client, download_locks }
    }

    /// Launch `model_id` into `slot_index`, returning the registered instance
    /// or a failure (spec §4.4 "Errors surfaced").
    pub async fn launch(&self, model_id: &str, slot_index: u32, config: &AdmissionConfig) -> Result<Instance, GatewayError> {
        let resolved = self.resolve_model(model_id).await?;
        let max_len = self.discover_max_len(&resolved.metadata_repo).await;
        let command = build_command(&resolved, &config.knobs, max_len, model_id);

        let container_name = Instance::container_name(&config.container_prefix, slot_index);
        self.cleanup_stale(&container_name).await?;

        let mut env = vec![("VLLM_ALLOW_LONG_MAX_MODEL_LEN".to_string(), "1".to_string())];
        if let Some(token) = &config.hf_token {
            env.push(("HUGGING_FACE_HUB_TOKEN".to_string(), token.clone()));
        }

        let spec = ContainerSpec {
            name: container_name.clone(),
            image: config.engine_image.clone(),
            command,
            env,
            network: config.network_name.clone(),
            gpu: true,
            volume_mounts: vec![
                (config.host_cache_dir.clone(), "/root/.cache/huggingface".to_string()),
                ("/tmp".to_string(), "/tmp".to_string()),
            ],
            ipc_mode: Some("host".to_string()),
        };

        let handle = self.runtime.create(&spec).await.map_err(|e| {
            tracing::error!(model_id, error = %e, "failed to start model container");
            GatewayError::from(e)
        })?;

        let ip = match self.runtime.inspect(&handle, &config.network_name).await {
            Ok(ContainerInfo { ip: Some(ip), .. }) => ip,
            _ => {
                self.abandon(&handle).await;
                return Err(GatewayError::OrchestrationFailure(format!(
                    "container {container_name} has no address on network {}",
                    config.network_name
                )));
            }
        };
        let endpoint = format!("{ip}:{}", config.engine_port);

        if let Err(err) = self.wait_healthy(&endpoint, model_id).await {
            self.abandon(&handle).await;
            return Err(err);
        }

        tracing::info!(model_id, slot_index, %endpoint, "model container healthy");
        Ok(Instance::new(model_id, slot_index, endpoint, handle))
    }

    async fn resolve_model(&self, model_id: &str) -> Result<ResolvedModel, GatewayError> {
        if gguf::is_gguf_repo(model_id) {
            let guard = self.download_locks.get_or_create(model_id);
            let _guard = guard.lock().await;

            let files = self.download_client.list_repo_files(model_id).await?;
            let filename = gguf::pick_gguf_file(&files, model_id)
                .ok_or_else(|| GatewayError::OrchestrationFailure(format!("no .gguf file found in {model_id}")))?;
            let local_path = self.download_client.download(model_id, &filename).await?;
            let base_repo = gguf::infer_base_repo(model_id);

            Ok(ResolvedModel {
                model_path: local_path.to_string_lossy().into_owned(),
                tokenizer: Some(base_repo.clone()),
                hf_config_path: Some(base_repo.clone()),
                metadata_repo: base_repo,
            })
        } else if gguf::is_gguf_path(model_id) {
            let tokenizer = gguf::tokenizer_source_for_direct_path(model_id);
            Ok(ResolvedModel {
                model_path: model_id.to_string(),
                hf_config_path: tokenizer.clone(),
                metadata_repo: tokenizer.clone().unwrap_or_else(|| model_id.to_string()),
                tokenizer,
            })
        } else {
            Ok(ResolvedModel {
                model_path: model_id.to_string(),
                tokenizer: None,
                hf_config_path: None,
                metadata_repo: model_id.to_string(),
            })
        }
    }

    /// Best-effort; a failure yields "no cap advertised" (spec §4.4).
    async fn discover_max_len(&self, repo: &str) -> u64 {
        match self.metadata_client.fetch_config(repo).await {
            Ok(config) => config.max_len(),
            Err(err) => {
                tracing::warn!(repo, error = %err, "max-length discovery failed, no cap advertised");
                0
            }
        }
    }

    /// Stop, force-remove, and confirm absence of a deterministically-named
    /// leftover container before creating its replacement (spec §4.4).
    async fn cleanup_stale(&self, name: &str) -> Result<(), GatewayError> {
        let Some(handle) = self.runtime.get_by_name(name).await.map_err(GatewayError::from)? else {
            return Ok(());
        };

        tracing::warn!(name, "stale container found, cleaning up before launch");
        let _ = self.runtime.stop(&handle, STALE_STOP_TIMEOUT_SECS).await;
        let _ = self.runtime.remove(&handle).await;

        for _ in 0..STALE_POLL_ATTEMPTS {
            match self.runtime.get_by_name(name).await {
                Ok(None) => return Ok(()),
                _ => tokio::time::sleep(STALE_POLL_INTERVAL).await,
            }
        }

        Err(GatewayError::Inconsistency(format!("stale container {name} could not be removed")))
    }

    async fn wait_healthy(&self, endpoint: &str, model_id: &str) -> Result<(), GatewayError> {
        let url = format!("http://{endpoint}/health");
        let started = tokio::time::Instant::now();

        for attempt in 1..=HEALTH_PROBE_ATTEMPTS {
            let healthy = self
                .health_client
                .get(&url)
                .send()
                .await
                .map(|r| r.status().is_success())
                .unwrap_or(false);
            if healthy {
                return Ok(());
            }
            if attempt % HEALTH_PROBE_PROGRESS_EVERY == 0 {
                tracing::info!(
                    model_id,
                    elapsed_secs = started.elapsed().as_secs(),
                    "waiting for model container health check"
                );
            }
            tokio::time::sleep(HEALTH_PROBE_INTERVAL).await;
        }

        Err(GatewayError::OrchestrationFailure(format!("model {model_id} failed to start in allocated time")))
    }

    async fn abandon(&self, handle: &ContainerHandle) {
        let _ = self.runtime.stop(handle, STALE_STOP_TIMEOUT_SECS).await;
        let _ = self.runtime.remove(handle).await;
    }
}

/// Assemble the engine argv (spec §4.4 "Command construction").
fn build_command(resolved: &ResolvedModel, knobs: &EngineKnobs, model_max_len: u64, model_id: &str) -> Vec<String> {
    let mut args = vec!["--model".to_string(), resolved.model_path.clone()];
    args.push("--gpu-memory-utilization".to_string());
    args.push(knobs.gpu_memory_utilization.clone());

    if knobs.swap_space_gib > 0 {
        args.push("--swap-space".to_string());
        args.push(knobs.swap_space_gib.to_string());
    }

    let global_cap = knobs.global_max_model_len as u64;
    let max_model_len = match (model_max_len, global_cap) {
        (m, g) if m > 0 && g > 0 => m.min(g),
        (m, 0) => m,
        (0, g) => g,
        _ => unreachable!(),
    };
    if max_model_len > 0 {
        args.push("--max-model-len".to_string());
        args.push(max_model_len.to_string());
    }

    if knobs.max_num_seqs > 0 {
        args.push("--max-num-seqs".to_string());
        args.push(knobs.max_num_seqs.to_string());
    }
    if knobs.tensor_parallel_size > 0 {
        args.push("--tensor-parallel-size".to_string());
        args.push(knobs.tensor_parallel_size.to_string());
    }
    if knobs.async_scheduling_prefixes.iter().any(|p| model_id.starts_with(p.as_str())) {
        args.push("--async-scheduling".to_string());
    }

    if let Some(tokenizer) = &resolved.tokenizer {
        args.push("--tokenizer".to_string());
        args.push(tokenizer.clone());
    }
    if let Some(hf_config_path) = &resolved.hf_config_path {
        args.push("--hf-config-path".to_string());
        args.push(hf_config_path.clone());
    }

    args
}
