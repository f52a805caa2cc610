//! C3 — the in-memory instance registry (spec §4.3).
//!
//! Guarded by a single short-held `parking_lot::Mutex`, chosen deliberately
//! over `tokio::sync::Mutex`: nothing in here performs I/O, and a
//! non-async-aware mutex makes it a compile error to accidentally hold the
//! guard across an `.await`, enforcing spec §5's "never held across a
//! suspension that performs I/O" at the type level rather than by
//! discipline.

use crate::instance::{now, Instance};
use parking_lot::Mutex;

#[derive(Default)]
pub struct Registry {
    instances: Mutex<Vec<Instance>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_by_model(&self, model_id: &str) -> Option<Instance> {
        self.instances.lock().iter().find(|i| i.model_id == model_id).cloned()
    }

    /// Enforces uniqueness per `model_id` and per `slot_index` (spec §3
    /// registry invariants 1 and 2).
    pub fn insert(&self, instance: Instance) -> Result<(), String> {
        let mut guard = self.instances.lock();
        if guard.iter().any(|i| i.model_id == instance.model_id) {
            return Err(format!("model {} already has a live instance", instance.model_id));
        }
        if guard.iter().any(|i| i.slot_index == instance.slot_index) {
            return Err(format!("slot {} already in use", instance.slot_index));
        }
        guard.push(instance);
        Ok(())
    }

    pub fn remove(&self, slot_index: u32) -> Option<Instance> {
        let mut guard = self.instances.lock();
        let pos = guard.iter().position(|i| i.slot_index == slot_index)?;
        Some(guard.remove(pos))
    }

    pub fn remove_by_model(&self, model_id: &str) -> Option<Instance> {
        let mut guard = self.instances.lock();
        let pos = guard.iter().position(|i| i.model_id == model_id)?;
        Some(guard.remove(pos))
    }

    /// Smallest non-negative integer not currently in use (spec §4.3, §4.5
    /// tie-break rule).
    pub fn allocate_slot(&self) -> u32 {
        let guard = self.instances.lock();
        let mut used: Vec<u32> = guard.iter().map(|i| i.slot_index).collect();
        used.sort_unstable();
        let mut candidate = 0u32;
        for slot in used {
            if slot == candidate {
                candidate += 1;
            } else if slot > candidate {
                break;
            }
        }
        candidate
    }

    /// Ascending by `last_used_at`; ties broken by slot index (spec §4.5
    /// eviction policy).
    pub fn lru_order(&self) -> Vec<Instance> {
        let mut snapshot: Vec<Instance> = self.instances.lock().clone();
        snapshot.sort_by(|a, b| a.last_used_at.cmp(&b.last_used_at).then(a.slot_index.cmp(&b.slot_index)));
        snapshot
    }

    pub fn touch(&self, model_id: &str) {
        let mut guard = self.instances.lock();
        if let Some(instance) = guard.iter_mut().find(|i| i.model_id == model_id) {
            instance.last_used_at = now();
        }
    }

    pub fn sum_vram(&self) -> u64 {
        self.instances.lock().iter().map(|i| i.vram_mib).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Instance> {
        self.instances.lock().clone()
    }

    /// Instances idle longer than `idle_timeout_secs` (spec §4.6 Idle Reaper).
    pub fn idle_since(&self, idle_timeout_secs: u64) -> Vec<Instance> {
        let cutoff = now().saturating_sub(idle_timeout_secs);
        self.instances.lock().iter().filter(|i| i.last_used_at < cutoff).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runtime::ContainerHandle;

    fn instance(model: &str, slot: u32) -> Instance {
        Instance::new(model, slot, "10.0.0.1:8000", ContainerHandle(format!("handle-{slot}")))
    }

    #[test]
    fn insert_enforces_unique_model_and_slot() {
        let registry = Registry::new();
        registry.insert(instance("m1", 0)).unwrap();
        assert!(registry.insert(instance("m1", 1)).is_err());
        assert!(registry.insert(instance("m2", 0)).is_err());
        registry.insert(instance("m2", 1)).unwrap();
    }

    #[test]
    fn allocate_slot_picks_smallest_free_index() {
        let registry = Registry::new();
        assert_eq!(registry.allocate_slot(), 0);
        registry.insert(instance("m0", 0)).unwrap();
        registry.insert(instance("m1", 1)).unwrap();
        assert_eq!(registry.allocate_slot(), 2);
        registry.remove(0);
        assert_eq!(registry.allocate_slot(), 0);
    }

    #[test]
    fn lru_order_is_ascending_with_slot_tiebreak() {
        let registry = Registry::new();
        let mut a = instance("a", 1);
        a.last_used_at = 100;
        let mut b = instance("b", 0);
        b.last_used_at = 100;
        let mut c = instance("c", 2);
        c.last_used_at = 50;
        registry.insert(a).unwrap();
        registry.insert(b).unwrap();
        registry.insert(c).unwrap();

        let order: Vec<String> = registry.lru_order().into_iter().map(|i| i.model_id).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn sum_vram_and_touch() {
        let registry = Registry::new();
        let mut a = instance("a", 0);
        a.vram_mib = 1000;
        registry.insert(a).unwrap();
        assert_eq!(registry.sum_vram(), 1000);

        registry.touch("a");
        assert!(registry.find_by_model("a").unwrap().last_used_at > 0);
    }

    #[test]
    fn idle_since_filters_by_last_used() {
        let registry = Registry::new();
        let mut stale = instance("stale", 0);
        stale.last_used_at = 0;
        registry.insert(stale).unwrap();

        let idle = registry.idle_since(1);
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].model_id, "stale");
    }
}
