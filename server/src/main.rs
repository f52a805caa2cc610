use std::sync::Arc;

use admission::{Controller, EngineLauncher};
use clap::Parser;
use metadata::{FootprintStore, ModelMetadataClient, WeightsDownloadClient};
use registry::LockTable;
use runtime::{ContainerRuntime, GpuTelemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = server::CliArgs::parse();
    let (mut admission_config, settings) = server::load(cli)?;

    common::logging::init_tracing(&settings.log_level);

    let runtime = ContainerRuntime::connect()?;
    admission_config.network_name =
        runtime.resolve_network_name(&admission_config.network_name, &settings.gateway_container_name).await;

    let state_dir = common::platform::default_state_dir();
    common::platform::ensure_dir(&state_dir)?;
    let footprints = FootprintStore::load(state_dir.join("memory_footprints.json"));

    let gpu = GpuTelemetry::new();
    let download_client =
        WeightsDownloadClient::new(admission_config.host_cache_dir.clone(), admission_config.hf_token.clone());
    let metadata_client = ModelMetadataClient::new(admission_config.hf_token.clone());
    let launcher = EngineLauncher::new(runtime.clone(), download_client, metadata_client, LockTable::new());

    let controller = Arc::new(Controller::new(admission_config, footprints, gpu, runtime, launcher).await);

    let app_state = Arc::new(api::AppState::new(controller.clone()));
    let router = api::build_router(app_state);
    api::spawn_idle_reaper(controller.clone());

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, "vram gateway listening");
    axum::serve(listener, router).await?;

    Ok(())
}
