//! C5 — the admission controller: resolves "where does this request go?"
//! and owns eviction policy (spec §4.5). Also hosts the idle reaper sweep
//! (spec §4.6), since both act on the same registry/runtime collaborators.

use std::collections::HashMap;
use std::time::Duration;

use common::GatewayError;
use metadata::FootprintStore;
use registry::{Instance, LockTable, Registry};
use tokio::sync::Mutex;

use crate::collaborators::{ContainerLifecycle, Launch, Telemetry};
use crate::config::AdmissionConfig;

const DISCOVERY_SIGNIFICANCE_THRESHOLD_MIB: u64 = 256;
const DISCOVERY_SAMPLE_INTERVAL: Duration = Duration::from_secs(15);
const DISCOVERY_SAMPLE_COUNT: u32 = 3;
const TEARDOWN_STOP_TIMEOUT_SECS: i64 = 10;

/// Owns every piece of mutable gateway state (spec §9: "a single Controller
/// value constructed at startup and passed by reference into handlers").
pub struct Controller {
    config: AdmissionConfig,
    registry: Registry,
    start_locks: LockTable,
    footprints: Mutex<FootprintStore>,
    gpu: Box<dyn Telemetry>,
    runtime: Box<dyn ContainerLifecycle>,
    launcher: Box<dyn Launch>,
    total_vram_mib: u64,
}

impl Controller {
    /// `total_vram_mib` is sampled once here and held for the process
    /// lifetime (spec §3 "Global VRAM budget ... discovered once at startup").
    ///
    /// Takes the runtime/GPU/launcher collaborators as `impl Trait + 'static`
    /// rather than concrete types so tests can pass fakes; production
    /// callers (`server::main`) pass the real `ContainerRuntime`,
    /// `GpuTelemetry`, and `EngineLauncher` unchanged.
    pub async fn new(
        config: AdmissionConfig,
        footprints: FootprintStore,
        gpu: impl Telemetry + 'static,
        runtime: impl ContainerLifecycle + 'static,
        launcher: impl Launch + 'static,
    ) -> Self {
        let total_vram_mib = gpu.total_vram_mib().await;
        Self {
            config,
            registry: Registry::new(),
            start_locks: LockTable::new(),
            footprints: Mutex::new(footprints),
            gpu: Box::new(gpu),
            runtime: Box::new(runtime),
            launcher: Box::new(launcher),
            total_vram_mib,
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn total_vram_mib(&self) -> u64 {
        self.total_vram_mib
    }

    pub async fn known_footprints(&self) -> HashMap<String, u64> {
        self.footprints.lock().await.snapshot()
    }

    /// Admit a request for `alias`, returning the live instance to forward to
    /// (spec §4.5 steps 1-5).
    pub async fn admit(&self, alias: &str) -> Result<Instance, GatewayError> {
        let canonical = self
            .config
            .resolve_alias(alias)
            .ok_or_else(|| GatewayError::ClientError(format!("model {alias} not allowed")))?
            .to_string();

        if let Some(instance) = self.registry.find_by_model(&canonical) {
            return Ok(instance);
        }

        let lock = self.start_locks.get_or_create(&canonical);
        let _guard = lock.lock().await;

        // Re-check: another request may have finished loading it while we
        // waited for the lock (spec §4.5 step 3).
        if let Some(instance) = self.registry.find_by_model(&canonical) {
            return Ok(instance);
        }

        let footprint = self.footprints.lock().await.get(&canonical);

        if self.total_vram_mib == 0 {
            self.admit_accounting_disabled(&canonical).await
        } else if let Some(footprint) = footprint {
            self.admit_known_footprint(&canonical, footprint).await
        } else {
            self.admit_discovery(&canonical).await
        }
    }

    /// Branch A — footprint unknown, VRAM accounted (spec §4.5).
    async fn admit_discovery(&self, model_id: &str) -> Result<Instance, GatewayError> {
        tracing::info!(model_id, "footprint unknown, running cold-cache discovery");
        self.teardown_all().await;

        let vram_before = self.gpu.used_vram_mib().await;
        let mut instance = self.launcher.launch(model_id, 0, &self.config).await?;

        let mut vram_after = 0u64;
        for _ in 0..DISCOVERY_SAMPLE_COUNT {
            tokio::time::sleep(DISCOVERY_SAMPLE_INTERVAL).await;
            vram_after = vram_after.max(self.gpu.used_vram_mib().await);
        }

        let measured = vram_after.saturating_sub(vram_before);
        if measured > DISCOVERY_SIGNIFICANCE_THRESHOLD_MIB {
            self.footprints.lock().await.put(model_id, measured);
            instance.vram_mib = measured;
        } else {
            tracing::warn!(model_id, measured, "discovery measurement not significant, leaving instance unaccounted");
        }

        self.registry.insert(instance.clone()).map_err(GatewayError::Inconsistency)?;
        Ok(instance)
    }

    /// Branch B — footprint known, VRAM accounted (spec §4.5).
    async fn admit_known_footprint(&self, model_id: &str, footprint: u64) -> Result<Instance, GatewayError> {
        let current = self.registry.sum_vram();
        let victims = select_victims(&self.registry.lru_order(), current, footprint, self.total_vram_mib);

        for victim in &victims {
            self.registry.remove(victim.slot_index);
        }
        let slot = self.registry.allocate_slot();

        for victim in &victims {
            tracing::info!(model_id = %victim.model_id, slot = victim.slot_index, "evicting to fit new load");
            self.teardown_instance(victim).await;
        }

        let mut instance = self.launcher.launch(model_id, slot, &self.config).await?;
        instance.vram_mib = footprint;
        self.registry.insert(instance.clone()).map_err(GatewayError::Inconsistency)?;
        Ok(instance)
    }

    /// Branch C — accounting disabled, serialised to one instance (spec §4.5).
    async fn admit_accounting_disabled(&self, model_id: &str) -> Result<Instance, GatewayError> {
        self.teardown_all().await;
        let instance = self.launcher.launch(model_id, 0, &self.config).await?;
        self.registry.insert(instance.clone()).map_err(GatewayError::Inconsistency)?;
        Ok(instance)
    }

    /// One sweep of the idle reaper (spec §4.6): snapshot idle instances
    /// under the registry lock, release, then tear them down outside it.
    pub async fn reap_idle(&self) {
        if self.config.idle_timeout_secs <= 0 {
            return;
        }
        let idle = self.registry.idle_since(self.config.idle_timeout_secs as u64);
        for instance in &idle {
            self.registry.remove(instance.slot_index);
        }
        for instance in &idle {
            tracing::info!(model_id = %instance.model_id, slot = instance.slot_index, "reaping idle instance");
            self.teardown_instance(instance).await;
        }
    }

    async fn teardown_all(&self) {
        let snapshot = self.registry.snapshot();
        for instance in &snapshot {
            self.registry.remove(instance.slot_index);
        }
        for instance in &snapshot {
            self.teardown_instance(instance).await;
        }
    }

    async fn teardown_instance(&self, instance: &Instance) {
        let _ = self.runtime.stop(&instance.handle, TEARDOWN_STOP_TIMEOUT_SECS).await;
        let _ = self.runtime.remove(&instance.handle).await;
    }
}

/// Pick victims from `lru_ordered` (ascending `last_used_at`, slot tiebreak)
/// until `incoming_footprint` fits alongside what remains (spec §4.5 Branch B
/// "collect victims ... subtracting their footprints, stopping as soon as
/// the new load fits").
fn select_victims(lru_ordered: &[Instance], current_vram: u64, incoming_footprint: u64, total_vram: u64) -> Vec<Instance> {
    if current_vram + incoming_footprint <= total_vram {
        return Vec::new();
    }

    let mut remaining = current_vram;
    let mut victims = Vec::new();
    for candidate in lru_ordered {
        if remaining + incoming_footprint <= total_vram {
            break;
        }
        remaining = remaining.saturating_sub(candidate.vram_mib);
        victims.push(candidate.clone());
    }
    victims
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtime::ContainerHandle;

    fn instance(model: &str, slot: u32, vram_mib: u64, last_used_at: u64) -> Instance {
        let mut inst = Instance::new(model, slot, "10.0.0.1:8000", ContainerHandle(format!("h{slot}")));
        inst.vram_mib = vram_mib;
        inst.last_used_at = last_used_at;
        inst
    }

    #[test]
    fn no_victims_when_it_already_fits() {
        let ordered = vec![instance("a", 0, 10000, 100)];
        let victims = select_victims(&ordered, 10000, 4000, 16000);
        assert!(victims.is_empty());
    }

    #[test]
    fn evicts_oldest_until_it_fits() {
        // Scenario C: total=16000, A(10000,T-100), B(4000,T-10), incoming C=8000.
        let ordered = vec![instance("a", 0, 10000, 0), instance("b", 1, 4000, 90)];
        let victims = select_victims(&ordered, 14000, 8000, 16000);
        assert_eq!(victims.len(), 1);
        assert_eq!(victims[0].model_id, "a");
    }

    #[test]
    fn exactly_fits_evicts_nothing() {
        let ordered = vec![instance("a", 0, 8000, 0)];
        let victims = select_victims(&ordered, 8000, 8000, 16000);
        assert!(victims.is_empty());
    }

    #[test]
    fn one_mib_over_evicts_at_least_one() {
        let ordered = vec![instance("a", 0, 8001, 0)];
        let victims = select_victims(&ordered, 8001, 8000, 16000);
        assert_eq!(victims.len(), 1);
    }

    #[test]
    fn evicts_unaccounted_instance_when_in_the_way() {
        let ordered = vec![instance("a", 0, 0, 0)];
        let victims = select_victims(&ordered, 0, 16000, 16000);
        // current(0) + incoming(16000) <= total(16000): fits without eviction
        // even though `a` is unaccounted, demonstrating unaccounted instances
        // don't block admission by themselves.
        assert!(victims.is_empty());
    }

    // --- fakes for Controller integration tests ---

    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    use runtime::RuntimeError;

    #[derive(Default)]
    struct FakeLifecycle {
        stopped: StdMutex<Vec<ContainerHandle>>,
        removed: StdMutex<Vec<ContainerHandle>>,
    }

    #[async_trait::async_trait]
    impl ContainerLifecycle for FakeLifecycle {
        async fn stop(&self, handle: &ContainerHandle, _timeout_secs: i64) -> Result<(), RuntimeError> {
            self.stopped.lock().unwrap().push(handle.clone());
            Ok(())
        }

        async fn remove(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
            self.removed.lock().unwrap().push(handle.clone());
            Ok(())
        }
    }

    struct FakeTelemetry {
        total: u64,
        used_sequence: StdMutex<VecDeque<u64>>,
    }

    impl FakeTelemetry {
        fn new(total: u64, used_sequence: Vec<u64>) -> Self {
            Self { total, used_sequence: StdMutex::new(used_sequence.into()) }
        }
    }

    #[async_trait::async_trait]
    impl Telemetry for FakeTelemetry {
        async fn total_vram_mib(&self) -> u64 {
            self.total
        }

        async fn used_vram_mib(&self) -> u64 {
            let mut queue = self.used_sequence.lock().unwrap();
            queue.pop_front().unwrap_or(0)
        }
    }

    #[derive(Default)]
    struct FakeLauncher {
        calls: StdMutex<Vec<(String, u32)>>,
    }

    #[async_trait::async_trait]
    impl Launch for FakeLauncher {
        async fn launch(&self, model_id: &str, slot_index: u32, _config: &AdmissionConfig) -> Result<Instance, GatewayError> {
            self.calls.lock().unwrap().push((model_id.to_string(), slot_index));
            let endpoint = format!("10.0.1.{slot_index}:8000");
            let handle = ContainerHandle(format!("fake-{model_id}-{slot_index}"));
            Ok(Instance::new(model_id, slot_index, endpoint, handle))
        }
    }

    fn test_config(idle_timeout_secs: i64) -> AdmissionConfig {
        let mut allowed_models = HashMap::new();
        allowed_models.insert("a".to_string(), "repo/A".to_string());
        allowed_models.insert("b".to_string(), "repo/B".to_string());
        allowed_models.insert("c".to_string(), "repo/C".to_string());
        AdmissionConfig {
            allowed_models,
            knobs: crate::config::EngineKnobs {
                gpu_memory_utilization: "0.9".to_string(),
                swap_space_gib: 0,
                global_max_model_len: 0,
                max_num_seqs: 0,
                tensor_parallel_size: 0,
                async_scheduling_prefixes: vec![],
            },
            network_name: "gw_net".to_string(),
            idle_timeout_secs,
            container_prefix: "gw".to_string(),
            engine_image: "engine:latest".to_string(),
            host_cache_dir: "/host/cache".to_string(),
            hf_token: None,
            engine_port: 8000,
        }
    }

    fn empty_footprints() -> FootprintStore {
        let dir = tempfile::tempdir().unwrap();
        // Leaked so the directory survives for the life of the test; these
        // tests never reload from disk, only the in-memory map matters.
        let path = Box::leak(Box::new(dir)).path().join("memory_footprints.json");
        FootprintStore::load(path)
    }

    #[tokio::test]
    async fn accounting_disabled_serialises_to_one_instance() {
        let controller = Controller::new(
            test_config(600),
            empty_footprints(),
            FakeTelemetry::new(0, vec![]),
            FakeLifecycle::default(),
            FakeLauncher::default(),
        )
        .await;

        let first = controller.admit("a").await.unwrap();
        assert_eq!(first.model_id, "repo/A");
        assert_eq!(controller.registry().snapshot().len(), 1);

        // Admitting a different model must tear down the first before
        // launching the second, since accounting is disabled (total=0).
        let second = controller.admit("b").await.unwrap();
        assert_eq!(second.model_id, "repo/B");
        let snapshot = controller.registry().snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].model_id, "repo/B");
    }

    #[tokio::test]
    async fn admit_returns_existing_instance_without_relaunching() {
        let controller = Controller::new(
            test_config(600),
            empty_footprints(),
            FakeTelemetry::new(0, vec![]),
            FakeLifecycle::default(),
            FakeLauncher::default(),
        )
        .await;

        controller.admit("a").await.unwrap();
        controller.admit("a").await.unwrap();
        assert_eq!(controller.registry().snapshot().len(), 1);
    }

    #[tokio::test]
    async fn admit_rejects_alias_outside_allowlist() {
        let controller = Controller::new(
            test_config(600),
            empty_footprints(),
            FakeTelemetry::new(0, vec![]),
            FakeLifecycle::default(),
            FakeLauncher::default(),
        )
        .await;

        let err = controller.admit("not-allowed").await.unwrap_err();
        assert!(matches!(err, GatewayError::ClientError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_persists_footprint_when_measurement_is_significant() {
        // vram_before=1000, three samples settle at 1300: measured=300 > 256.
        let controller = Controller::new(
            test_config(600),
            empty_footprints(),
            FakeTelemetry::new(16000, vec![1000, 1100, 1200, 1300]),
            FakeLifecycle::default(),
            FakeLauncher::default(),
        )
        .await;

        let instance = controller.admit("a").await.unwrap();
        assert_eq!(instance.vram_mib, 300);
        assert_eq!(controller.known_footprints().await.get("repo/A"), Some(&300));
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_leaves_instance_unaccounted_when_measurement_is_not_significant() {
        // vram_before=1000, samples never exceed 1100: measured=100 <= 256.
        let controller = Controller::new(
            test_config(600),
            empty_footprints(),
            FakeTelemetry::new(16000, vec![1000, 1050, 1080, 1100]),
            FakeLifecycle::default(),
            FakeLauncher::default(),
        )
        .await;

        let instance = controller.admit("a").await.unwrap();
        assert_eq!(instance.vram_mib, 0);
        assert!(controller.known_footprints().await.get("repo/A").is_none());
        // the instance still stays registered and serves the request
        assert_eq!(controller.registry().snapshot().len(), 1);
    }

    #[tokio::test]
    async fn known_footprint_evicts_lru_until_the_incoming_model_fits() {
        // Scenario C: total=16000, A(10000,T-100), B(4000,T-10), incoming C=8000.
        let mut footprints = empty_footprints();
        footprints.put("repo/C", 8000);

        let controller = Controller::new(
            test_config(600),
            footprints,
            FakeTelemetry::new(16000, vec![]),
            FakeLifecycle::default(),
            FakeLauncher::default(),
        )
        .await;

        controller
            .registry()
            .insert(instance("repo/A", 0, 10000, 0))
            .unwrap();
        controller
            .registry()
            .insert(instance("repo/B", 1, 4000, 90))
            .unwrap();

        let admitted = controller.admit("c").await.unwrap();
        assert_eq!(admitted.model_id, "repo/C");
        assert_eq!(admitted.vram_mib, 8000);

        let snapshot = controller.registry().snapshot();
        let model_ids: Vec<&str> = snapshot.iter().map(|i| i.model_id.as_str()).collect();
        assert_eq!(model_ids.len(), 2);
        assert!(model_ids.contains(&"repo/B"));
        assert!(model_ids.contains(&"repo/C"));
        assert!(!model_ids.contains(&"repo/A"));
        assert_eq!(controller.registry().sum_vram(), 12000);
    }

    #[tokio::test]
    async fn reap_idle_tears_down_instances_past_the_timeout() {
        let controller = Controller::new(
            test_config(1),
            empty_footprints(),
            FakeTelemetry::new(0, vec![]),
            FakeLifecycle::default(),
            FakeLauncher::default(),
        )
        .await;

        controller
            .registry()
            .insert(instance("repo/A", 0, 0, 0))
            .unwrap();
        assert_eq!(controller.registry().snapshot().len(), 1);

        controller.reap_idle().await;
        assert!(controller.registry().snapshot().is_empty());
    }

    #[tokio::test]
    async fn reap_idle_is_a_no_op_when_disabled() {
        let controller = Controller::new(
            test_config(0),
            empty_footprints(),
            FakeTelemetry::new(0, vec![]),
            FakeLifecycle::default(),
            FakeLauncher::default(),
        )
        .await;

        controller
            .registry()
            .insert(instance("repo/A", 0, 0, 0))
            .unwrap();

        controller.reap_idle().await;
        assert_eq!(controller.registry().snapshot().len(), 1);
    }
}
