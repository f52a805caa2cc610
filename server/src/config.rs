//! C1 — parses startup configuration from CLI args, environment, and an
//! optional TOML file into the shapes `admission`/`api` consume (spec §4.1,
//! §6 "Environment variables recognised").
//!
//! Precedence: file < environment < CLI. `clap`'s `env` fallback already
//! folds CLI and environment into a single optional value per field (CLI
//! wins if both are set); this module only has to layer the file underneath
//! that.

use std::collections::HashMap;
use std::path::PathBuf;

use admission::{AdmissionConfig, EngineKnobs};
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

#[derive(Debug, Parser)]
#[command(name = "vram-gateway", about = "Model-aware request router and GPU admission controller")]
pub struct CliArgs {
    /// Lowest-precedence TOML config file.
    #[arg(long, env = "GATEWAY_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    #[arg(long, env = "HUGGING_FACE_HUB_TOKEN")]
    pub hf_token: Option<String>,

    #[arg(long, env = "HOST_CACHE_DIR")]
    pub host_cache_dir: Option<String>,

    #[arg(long, env = "ENGINE_IMAGE")]
    pub engine_image: Option<String>,

    #[arg(long, env = "ENGINE_PORT")]
    pub engine_port: Option<u16>,

    #[arg(long, env = "GPU_MEMORY_UTILIZATION")]
    pub gpu_memory_utilization: Option<String>,

    #[arg(long, env = "SWAP_SPACE_GIB")]
    pub swap_space_gib: Option<u32>,

    #[arg(long, env = "GLOBAL_MAX_MODEL_LEN")]
    pub global_max_model_len: Option<u32>,

    #[arg(long, env = "MAX_NUM_SEQS")]
    pub max_num_seqs: Option<u32>,

    #[arg(long, env = "TENSOR_PARALLEL_SIZE")]
    pub tensor_parallel_size: Option<u32>,

    #[arg(long, env = "ASYNC_SCHEDULING_PREFIXES", value_delimiter = ',')]
    pub async_scheduling_prefixes: Vec<String>,

    #[arg(long, env = "NETWORK_NAME")]
    pub network_name: Option<String>,

    /// This gateway's own container name, used to self-resolve the network
    /// name (spec §4.1).
    #[arg(long, env = "GATEWAY_CONTAINER_NAME")]
    pub gateway_container_name: Option<String>,

    #[arg(long, env = "CONTAINER_PREFIX")]
    pub container_prefix: Option<String>,

    #[arg(long, env = "IDLE_TIMEOUT_SECS")]
    pub idle_timeout_secs: Option<i64>,

    /// JSON object `{alias: canonical_model_id}`.
    #[arg(long, env = "ALLOWED_MODELS_JSON")]
    pub allowed_models_json: Option<String>,

    #[arg(long, env = "BIND_ADDR")]
    pub bind_addr: Option<String>,

    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

/// Mirrors `CliArgs`' optional fields for the lowest-precedence file layer.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    hf_token: Option<String>,
    host_cache_dir: Option<String>,
    engine_image: Option<String>,
    engine_port: Option<u16>,
    gpu_memory_utilization: Option<String>,
    swap_space_gib: Option<u32>,
    global_max_model_len: Option<u32>,
    max_num_seqs: Option<u32>,
    tensor_parallel_size: Option<u32>,
    async_scheduling_prefixes: Vec<String>,
    network_name: Option<String>,
    gateway_container_name: Option<String>,
    container_prefix: Option<String>,
    idle_timeout_secs: Option<i64>,
    allowed_models: HashMap<String, String>,
    bind_addr: Option<String>,
    log_level: Option<String>,
}

/// What `main` needs beyond the `AdmissionConfig` the launcher/controller
/// consume.
pub struct ServerSettings {
    pub bind_addr: String,
    pub log_level: String,
    pub gateway_container_name: String,
}

pub fn load(cli: CliArgs) -> Result<(AdmissionConfig, ServerSettings)> {
    let file = match &cli.config_file {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str(&contents).with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => FileConfig::default(),
    };

    let allowed_models = match cli.allowed_models_json {
        Some(json) => serde_json::from_str(&json).context("parsing ALLOWED_MODELS_JSON")?,
        None => file.allowed_models,
    };

    let async_scheduling_prefixes =
        if cli.async_scheduling_prefixes.is_empty() { file.async_scheduling_prefixes } else { cli.async_scheduling_prefixes };

    let knobs = EngineKnobs {
        gpu_memory_utilization: cli.gpu_memory_utilization.or(file.gpu_memory_utilization).unwrap_or_else(|| "0.9".to_string()),
        swap_space_gib: cli.swap_space_gib.or(file.swap_space_gib).unwrap_or(0),
        global_max_model_len: cli.global_max_model_len.or(file.global_max_model_len).unwrap_or(0),
        max_num_seqs: cli.max_num_seqs.or(file.max_num_seqs).unwrap_or(0),
        tensor_parallel_size: cli.tensor_parallel_size.or(file.tensor_parallel_size).unwrap_or(0),
        async_scheduling_prefixes,
    };

    let gateway_container_name =
        cli.gateway_container_name.or(file.gateway_container_name).unwrap_or_else(|| "vram_gateway".to_string());

    let admission_config = AdmissionConfig {
        allowed_models,
        knobs,
        network_name: cli.network_name.or(file.network_name).context("NETWORK_NAME is required")?,
        idle_timeout_secs: cli.idle_timeout_secs.or(file.idle_timeout_secs).unwrap_or(0),
        container_prefix: cli.container_prefix.or(file.container_prefix).unwrap_or_else(|| "vram_gateway".to_string()),
        engine_image: cli.engine_image.or(file.engine_image).context("ENGINE_IMAGE is required")?,
        host_cache_dir: cli
            .host_cache_dir
            .or(file.host_cache_dir)
            .unwrap_or_else(|| common::platform::default_hf_cache_dir().to_string_lossy().into_owned()),
        hf_token: cli.hf_token.or(file.hf_token),
        engine_port: cli.engine_port.or(file.engine_port).unwrap_or(8000),
    };

    let settings = ServerSettings {
        bind_addr: cli.bind_addr.or(file.bind_addr).unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        log_level: cli.log_level.or(file.log_level).unwrap_or_else(|| "info".to_string()),
        gateway_container_name,
    };

    Ok((admission_config, settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> CliArgs {
        CliArgs {
            config_file: None,
            hf_token: None,
            host_cache_dir: None,
            engine_image: Some("engine:latest".to_string()),
            engine_port: None,
            gpu_memory_utilization: None,
            swap_space_gib: None,
            global_max_model_len: None,
            max_num_seqs: None,
            tensor_parallel_size: None,
            async_scheduling_prefixes: vec![],
            network_name: Some("gw_net".to_string()),
            gateway_container_name: None,
            container_prefix: None,
            idle_timeout_secs: None,
            allowed_models_json: Some(r#"{"m":"repo/M"}"#.to_string()),
            bind_addr: None,
            log_level: None,
        }
    }

    #[test]
    fn fills_defaults_when_only_required_fields_set() {
        let (admission_config, settings) = load(base_cli()).unwrap();
        assert_eq!(admission_config.allowed_models.get("m"), Some(&"repo/M".to_string()));
        assert_eq!(admission_config.knobs.gpu_memory_utilization, "0.9");
        assert_eq!(admission_config.container_prefix, "vram_gateway");
        assert_eq!(settings.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn missing_required_field_errors() {
        let mut cli = base_cli();
        cli.network_name = None;
        assert!(load(cli).is_err());
    }
}
