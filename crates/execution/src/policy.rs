//! GPU/CPU selection policy for search tasks.
//!
//! For each search task against the governed index kind the policy walks a
//! fixed rule chain and stops at the first match:
//!
//! ```text
//! GPU disabled            -> cpu
//! topk   > max_topk       -> cpu
//! nprobe missing / > max  -> cpu
//! nq     < threshold      -> cpu, hybrid
//! otherwise               -> next search device (round robin)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};
use vecsched_config::{ConfigSnapshot, ConfigStore, ConfigSubscription, GPU_SEARCH_THRESHOLD};
use vecsched_core::{DeviceId, ExtraParams, IndexKind, ResourceKey, TaskDescriptor, TaskKind};
use vecsched_resource::ResourceRegistry;

use crate::cursor::RoundRobinCursor;
use crate::error::{Result, SelectError};
use crate::limits::GpuLimits;
use crate::pass::Pass;

/// Search param holding the number of inverted lists to probe.
pub const NPROBE: &str = "nprobe";

/// Why a task was routed where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteReason {
    /// GPU search switched off
    GpuDisabled,
    /// topk above the GPU limit
    TopkAboveGpuLimit,
    /// nprobe missing or not an integer
    NprobeUnavailable,
    /// nprobe above the GPU limit
    NprobeAboveGpuLimit,
    /// Fewer queries than the search threshold
    BelowSearchThreshold,
    /// No device to rotate through
    NoSearchDevices,
    /// Next device in rotation
    RoundRobin,
}

impl fmt::Display for RouteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RouteReason::GpuDisabled => "gpu disabled",
            RouteReason::TopkAboveGpuLimit => "topk > gpu max topk",
            RouteReason::NprobeUnavailable => "nprobe missing or invalid",
            RouteReason::NprobeAboveGpuLimit => "nprobe > gpu max nprobe",
            RouteReason::BelowSearchThreshold => "nq < gpu search threshold",
            RouteReason::NoSearchDevices => "no search devices",
            RouteReason::RoundRobin => "nq >= gpu search threshold",
        };
        f.write_str(reason)
    }
}

/// Where a task should run and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Selected resource
    pub resource: ResourceKey,
    /// Rule that fired
    pub reason: RouteReason,
    /// CPU execution that may still borrow a GPU for the quantizer
    pub hybrid: bool,
}

impl Decision {
    fn cpu(reason: RouteReason) -> Self {
        Self {
            resource: ResourceKey::Cpu,
            reason,
            hybrid: false,
        }
    }
}

/// Outcome of checking a task's `nprobe` against the GPU limit.
///
/// Anything that is not an integer counts as unavailable, which sends the
/// task to CPU the same way an oversized value does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NprobeCheck {
    /// Missing, null or not an integer
    Unavailable,
    /// Fits the GPU path
    WithinLimit(i64),
    /// Too large for the GPU path
    AboveLimit(i64),
}

impl NprobeCheck {
    /// Check the `nprobe` param against `max_nprobe`.
    pub fn evaluate(params: &ExtraParams, max_nprobe: i64) -> Self {
        match params.get(NPROBE).and_then(|v| v.as_i64()) {
            None => NprobeCheck::Unavailable,
            Some(nprobe) if nprobe > max_nprobe => NprobeCheck::AboveLimit(nprobe),
            Some(nprobe) => NprobeCheck::WithinLimit(nprobe),
        }
    }

    /// Whether the task must stay on CPU.
    pub fn forces_cpu(&self) -> bool {
        !matches!(self, NprobeCheck::WithinLimit(_))
    }
}

/// A negative threshold lets every task through.
fn below_threshold(nq: u64, threshold: i64) -> bool {
    u64::try_from(threshold).map_or(false, |t| nq < t)
}

/// Selection pass routing searches on one index kind between CPU and GPUs.
///
/// `gpu_enabled` and the device list are captured by [`initialize`](Self::initialize)
/// and stay fixed; the search threshold follows `gpu.gpu_search_threshold`
/// live through a [`ConfigSubscription`] released when the policy is dropped.
pub struct SelectionPolicy {
    name: String,
    index_kind: IndexKind,
    registry: Arc<dyn ResourceRegistry>,
    limits: GpuLimits,
    gpu_enabled: bool,
    devices: Vec<DeviceId>,
    cursor: RoundRobinCursor,
    threshold: Arc<AtomicI64>,
    subscription: ConfigSubscription,
}

impl SelectionPolicy {
    /// Create a policy and subscribe to the search threshold.
    ///
    /// GPU routing stays off until [`initialize`](Self::initialize) is called.
    pub fn new(
        index_kind: IndexKind,
        config: Arc<dyn ConfigStore>,
        registry: Arc<dyn ResourceRegistry>,
        limits: GpuLimits,
    ) -> Self {
        let threshold = Arc::new(AtomicI64::new(0));
        let subscription =
            ConfigSubscription::int(config, GPU_SEARCH_THRESHOLD, Arc::clone(&threshold));
        Self {
            name: format!("gpu_search[{}]", index_kind),
            index_kind,
            registry,
            limits,
            gpu_enabled: false,
            devices: Vec::new(),
            cursor: RoundRobinCursor::new(),
            threshold,
            subscription,
        }
    }

    /// Capture GPU settings from a config snapshot.
    ///
    /// Rejects a snapshot that enables GPU search without any search device.
    pub fn initialize(&mut self, snapshot: &ConfigSnapshot) -> Result<()> {
        if snapshot.gpu_enabled && snapshot.search_devices.is_empty() {
            return Err(SelectError::MisconfiguredDeviceSet {
                index_kind: self.index_kind,
            });
        }

        self.gpu_enabled = snapshot.gpu_enabled;
        self.devices = snapshot.search_devices.clone();
        self.threshold.store(snapshot.gpu_search_threshold, Ordering::Release);
        // The snapshot may predate a notification already delivered.
        if let Err(e) = self.subscription.refresh() {
            warn!(
                key = %self.subscription.key(),
                error = %e,
                "failed to re-read search threshold, using snapshot value"
            );
        }
        self.cursor.reset();

        info!(
            index = %self.index_kind,
            gpu_enabled = self.gpu_enabled,
            threshold = self.threshold(),
            devices = ?self.devices,
            "selection policy initialized"
        );
        Ok(())
    }

    /// Route a task, writing the chosen resource into it.
    ///
    /// Returns `Ok(false)` without touching the task when it is not a search
    /// on the governed index kind. Fails only if the registry cannot resolve
    /// the selected resource.
    pub fn evaluate(&self, task: &mut TaskDescriptor) -> Result<bool> {
        let Some(decision) = self.decide(task) else {
            return Ok(false);
        };

        let handle = self.registry.lookup(&decision.resource)?;
        task.assigned_resource = Some(handle);
        if decision.hybrid {
            task.hybrid = true;
        }
        Ok(true)
    }

    /// Run the rule chain without writing to the task.
    ///
    /// Still advances the device cursor when a GPU is picked.
    pub fn decide(&self, task: &TaskDescriptor) -> Option<Decision> {
        if task.kind != TaskKind::Search || task.index_kind != self.index_kind {
            return None;
        }

        let decision = self.route(task);
        debug!(
            task = %task.id,
            index = %self.index_kind,
            resource = %decision.resource,
            reason = %decision.reason,
            hybrid = decision.hybrid,
            "routed search task"
        );
        Some(decision)
    }

    fn route(&self, task: &TaskDescriptor) -> Decision {
        if !self.gpu_enabled {
            return Decision::cpu(RouteReason::GpuDisabled);
        }

        if task.topk > self.limits.max_topk {
            return Decision::cpu(RouteReason::TopkAboveGpuLimit);
        }

        match NprobeCheck::evaluate(&task.extra_params, self.limits.max_nprobe) {
            NprobeCheck::Unavailable => return Decision::cpu(RouteReason::NprobeUnavailable),
            NprobeCheck::AboveLimit(_) => return Decision::cpu(RouteReason::NprobeAboveGpuLimit),
            NprobeCheck::WithinLimit(_) => {}
        }

        if below_threshold(task.nq, self.threshold()) {
            return Decision {
                resource: ResourceKey::Cpu,
                reason: RouteReason::BelowSearchThreshold,
                hybrid: true,
            };
        }

        // initialize() refuses an empty list while GPU search is on
        match self.cursor.next(&self.devices) {
            Some(device) => Decision {
                resource: ResourceKey::Gpu(device),
                reason: RouteReason::RoundRobin,
                hybrid: false,
            },
            None => Decision::cpu(RouteReason::NoSearchDevices),
        }
    }

    /// Current search threshold.
    pub fn threshold(&self) -> i64 {
        self.threshold.load(Ordering::Acquire)
    }

    /// Whether GPU routing is on.
    pub fn gpu_enabled(&self) -> bool {
        self.gpu_enabled
    }

    /// Search devices in rotation order.
    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    /// Index kind this policy governs.
    pub fn index_kind(&self) -> IndexKind {
        self.index_kind
    }

    /// Config key the threshold is reloaded from.
    pub fn threshold_key(&self) -> &str {
        self.subscription.key()
    }
}

impl Pass for SelectionPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, snapshot: &ConfigSnapshot) -> Result<()> {
        self.initialize(snapshot)
    }

    fn run(&self, task: &mut TaskDescriptor) -> Result<bool> {
        self.evaluate(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vecsched_config::InMemoryConfigStore;
    use vecsched_config::{GpuConfig, GPU_ENABLE};
    use vecsched_resource::{InMemoryRegistry, RegistryError};

    fn gpu_config(enable: bool, threshold: i64, devices: &[&str]) -> GpuConfig {
        GpuConfig {
            enable,
            gpu_search_threshold: threshold,
            search_devices: devices.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn build_policy(gpu: GpuConfig) -> (Arc<InMemoryConfigStore>, SelectionPolicy) {
        let store = Arc::new(InMemoryConfigStore::from_config(&gpu));
        let snapshot = ConfigSnapshot::load(store.as_ref()).unwrap();
        let registry = Arc::new(InMemoryRegistry::with_devices(&snapshot.search_devices));
        let limits = GpuLimits::new().with_max_topk(1000).with_max_nprobe(256);
        let mut policy = SelectionPolicy::new(IndexKind::IvfSq8h, store.clone(), registry, limits);
        policy.initialize(&snapshot).unwrap();
        (store, policy)
    }

    fn gpu_task(nq: u64) -> TaskDescriptor {
        TaskDescriptor::search(IndexKind::IvfSq8h, 10, nq).with_param(NPROBE, 16)
    }

    fn assigned(task: &TaskDescriptor) -> String {
        task.assigned_resource.as_ref().map(|h| h.to_string()).unwrap_or_default()
    }

    #[test]
    fn test_non_search_task_declined() {
        let (_store, policy) = build_policy(gpu_config(true, 100, &["gpu0"]));
        let mut task = TaskDescriptor::new(TaskKind::BuildIndex, IndexKind::IvfSq8h, 10, 1000);

        assert!(!policy.evaluate(&mut task).unwrap());
        assert!(task.assigned_resource.is_none());
        assert!(!task.hybrid);
    }

    #[test]
    fn test_other_index_kind_declined() {
        let (_store, policy) = build_policy(gpu_config(true, 100, &["gpu0"]));
        let mut task = TaskDescriptor::search(IndexKind::IvfFlat, 10, 1000).with_param(NPROBE, 16);

        assert!(!policy.evaluate(&mut task).unwrap());
        assert!(task.assigned_resource.is_none());
    }

    #[test]
    fn test_gpu_disabled_always_cpu() {
        let (_store, policy) = build_policy(gpu_config(false, 100, &["gpu0"]));
        for (topk, nq) in [(10, 1), (10, 100_000), (5000, 100_000)] {
            let mut task = TaskDescriptor::search(IndexKind::IvfSq8h, topk, nq).with_param(NPROBE, 16);
            assert!(policy.evaluate(&mut task).unwrap());
            assert_eq!(assigned(&task), "cpu");
            assert!(!task.hybrid);
        }
    }

    #[test]
    fn test_round_robin_over_devices() {
        let (_store, policy) = build_policy(gpu_config(true, 100, &["gpu0", "gpu1", "gpu2"]));
        let picked: Vec<String> = (0..5)
            .map(|_| {
                let mut task = gpu_task(1000);
                assert!(policy.evaluate(&mut task).unwrap());
                assigned(&task)
            })
            .collect();

        assert_eq!(picked, vec!["gpu0", "gpu1", "gpu2", "gpu0", "gpu1"]);
    }

    #[test]
    fn test_below_threshold_is_hybrid_cpu() {
        let (_store, policy) = build_policy(gpu_config(true, 800, &["gpu0"]));
        let mut task = gpu_task(100);

        assert!(policy.evaluate(&mut task).unwrap());
        assert_eq!(assigned(&task), "cpu");
        assert!(task.hybrid);
    }

    #[test]
    fn test_missing_nprobe_goes_to_cpu() {
        let (_store, policy) = build_policy(gpu_config(true, 1, &["gpu0"]));
        let mut task = TaskDescriptor::search(IndexKind::IvfSq8h, 10, 100_000);

        assert!(policy.evaluate(&mut task).unwrap());
        assert_eq!(assigned(&task), "cpu");
        assert!(!task.hybrid);
    }

    #[test]
    fn test_unparseable_nprobe_goes_to_cpu() {
        let (_store, policy) = build_policy(gpu_config(true, 1, &["gpu0"]));
        for value in [serde_json::json!("16"), serde_json::json!(null), serde_json::json!(16.5)] {
            let task = TaskDescriptor::search(IndexKind::IvfSq8h, 10, 100_000).with_param(NPROBE, value);
            let decision = policy.decide(&task).unwrap();
            assert_eq!(decision.reason, RouteReason::NprobeUnavailable);
        }
    }

    #[test]
    fn test_nprobe_above_limit_goes_to_cpu() {
        let (_store, policy) = build_policy(gpu_config(true, 1, &["gpu0"]));
        let task = TaskDescriptor::search(IndexKind::IvfSq8h, 10, 100_000).with_param(NPROBE, 257);
        let decision = policy.decide(&task).unwrap();
        assert_eq!(decision.resource, ResourceKey::Cpu);
        assert_eq!(decision.reason, RouteReason::NprobeAboveGpuLimit);
    }

    #[test]
    fn test_topk_above_limit_goes_to_cpu() {
        let (_store, policy) = build_policy(gpu_config(true, 1, &["gpu0"]));
        let mut task = TaskDescriptor::search(IndexKind::IvfSq8h, 5000, 100_000).with_param(NPROBE, 16);

        assert!(policy.evaluate(&mut task).unwrap());
        assert_eq!(assigned(&task), "cpu");
        assert_eq!(policy.decide(&task).unwrap().reason, RouteReason::TopkAboveGpuLimit);
    }

    #[test]
    fn test_limits_are_inclusive() {
        let (_store, policy) = build_policy(gpu_config(true, 100, &["gpu0"]));
        let task = TaskDescriptor::search(IndexKind::IvfSq8h, 1000, 100).with_param(NPROBE, 256);
        assert_eq!(policy.decide(&task).unwrap().resource, ResourceKey::Gpu(DeviceId(0)));
    }

    #[test]
    fn test_threshold_reload_moves_task_to_gpu() {
        let (store, policy) = build_policy(gpu_config(true, 800, &["gpu0", "gpu1"]));

        let mut before = gpu_task(100);
        policy.evaluate(&mut before).unwrap();
        assert_eq!(assigned(&before), "cpu");
        assert!(before.hybrid);

        store.set(GPU_SEARCH_THRESHOLD, 50i64);
        assert_eq!(policy.threshold(), 50);

        let mut after = gpu_task(100);
        policy.evaluate(&mut after).unwrap();
        assert_eq!(assigned(&after), "gpu0");
        assert!(!after.hybrid);
    }

    #[test]
    fn test_new_policy_reads_live_threshold() {
        let store = Arc::new(InMemoryConfigStore::from_config(&gpu_config(true, 800, &["gpu0"])));
        let policy = SelectionPolicy::new(
            IndexKind::IvfSq8h,
            store,
            Arc::new(InMemoryRegistry::with_devices(&[DeviceId(0)])),
            GpuLimits::default(),
        );
        assert_eq!(policy.threshold(), 800);
    }

    #[test]
    fn test_initialize_keeps_threshold_changed_after_snapshot() {
        let store = Arc::new(InMemoryConfigStore::from_config(&gpu_config(true, 800, &["gpu0"])));
        let mut policy = SelectionPolicy::new(
            IndexKind::IvfSq8h,
            store.clone(),
            Arc::new(InMemoryRegistry::with_devices(&[DeviceId(0)])),
            GpuLimits::default(),
        );
        let snapshot = ConfigSnapshot::load(store.as_ref()).unwrap();
        store.set(GPU_SEARCH_THRESHOLD, 50i64);

        policy.initialize(&snapshot).unwrap();

        assert_eq!(policy.threshold(), 50);
        assert_eq!(policy.decide(&gpu_task(100)).unwrap().reason, RouteReason::RoundRobin);
    }

    #[test]
    fn test_initialize_falls_back_to_snapshot_threshold() {
        let store = Arc::new(InMemoryConfigStore::new());
        let mut policy = SelectionPolicy::new(
            IndexKind::IvfSq8h,
            store,
            Arc::new(InMemoryRegistry::with_devices(&[DeviceId(0)])),
            GpuLimits::default(),
        );
        let snapshot = ConfigSnapshot {
            gpu_enabled: true,
            gpu_search_threshold: 300,
            search_devices: vec![DeviceId(0)],
        };

        policy.initialize(&snapshot).unwrap();
        assert_eq!(policy.threshold(), 300);
    }

    #[test]
    fn test_only_threshold_is_live() {
        let (store, policy) = build_policy(gpu_config(true, 100, &["gpu0"]));
        store.set(GPU_ENABLE, false);
        store.set(
            vecsched_config::GPU_SEARCH_DEVICES,
            vec!["gpu3".to_string()],
        );

        assert!(policy.gpu_enabled());
        assert_eq!(policy.devices(), &[DeviceId(0)]);
    }

    #[test]
    fn test_negative_threshold_never_hybrid() {
        let (_store, policy) = build_policy(gpu_config(true, -5, &["gpu0"]));
        let decision = policy.decide(&gpu_task(0)).unwrap();
        assert_eq!(decision.reason, RouteReason::RoundRobin);
    }

    #[test]
    fn test_enabled_without_devices_rejected() {
        let store = Arc::new(InMemoryConfigStore::from_config(&gpu_config(true, 100, &[])));
        let snapshot = ConfigSnapshot::load(store.as_ref()).unwrap();
        let mut policy = SelectionPolicy::new(
            IndexKind::IvfSq8h,
            store,
            Arc::new(InMemoryRegistry::with_devices(&[])),
            GpuLimits::default(),
        );

        let err = policy.initialize(&snapshot).unwrap_err();
        assert!(matches!(
            err,
            SelectError::MisconfiguredDeviceSet { index_kind: IndexKind::IvfSq8h }
        ));
    }

    #[test]
    fn test_disabled_without_devices_accepted() {
        let (_store, policy) = build_policy(gpu_config(false, 100, &[]));
        let mut task = gpu_task(1000);
        assert!(policy.evaluate(&mut task).unwrap());
        assert_eq!(assigned(&task), "cpu");
    }

    #[test]
    fn test_unknown_device_is_fatal() {
        let gpu = gpu_config(true, 1, &["gpu0", "gpu1"]);
        let store = Arc::new(InMemoryConfigStore::from_config(&gpu));
        let snapshot = ConfigSnapshot::load(store.as_ref()).unwrap();
        let registry = Arc::new(InMemoryRegistry::with_devices(&[DeviceId(0)]));
        let mut policy = SelectionPolicy::new(IndexKind::IvfSq8h, store, registry, GpuLimits::default());
        policy.initialize(&snapshot).unwrap();

        let mut first = gpu_task(10);
        assert!(policy.evaluate(&mut first).unwrap());

        let mut second = gpu_task(10);
        let err = policy.evaluate(&mut second).unwrap_err();
        assert!(matches!(
            err,
            SelectError::ResourceNotFound(RegistryError::NotFound(ref name)) if name == "gpu1"
        ));
        assert!(second.assigned_resource.is_none());
    }

    #[test]
    fn test_drop_releases_subscription() {
        let (store, policy) = build_policy(gpu_config(true, 100, &["gpu0"]));
        assert_eq!(store.subscriber_count(GPU_SEARCH_THRESHOLD), 1);
        assert_eq!(policy.threshold_key(), GPU_SEARCH_THRESHOLD);
        drop(policy);
        assert_eq!(store.subscriber_count(GPU_SEARCH_THRESHOLD), 0);
    }

    #[test]
    fn test_concurrent_evaluate_spreads_evenly() {
        let (_store, policy) = build_policy(gpu_config(true, 1, &["gpu0", "gpu1", "gpu2"]));
        let picked = std::sync::Mutex::new(Vec::new());

        std::thread::scope(|s| {
            for _ in 0..6 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let mut task = gpu_task(10);
                        policy.evaluate(&mut task).unwrap();
                        picked.lock().unwrap().push(assigned(&task));
                    }
                });
            }
        });

        let picked = picked.into_inner().unwrap();
        for device in ["gpu0", "gpu1", "gpu2"] {
            assert_eq!(picked.iter().filter(|p| p.as_str() == device).count(), 100);
        }
    }

    #[test]
    fn test_nprobe_check() {
        let mut params = ExtraParams::default();
        assert_eq!(NprobeCheck::evaluate(&params, 10), NprobeCheck::Unavailable);
        params.insert(NPROBE, 10);
        assert_eq!(NprobeCheck::evaluate(&params, 10), NprobeCheck::WithinLimit(10));
        assert!(!NprobeCheck::evaluate(&params, 10).forces_cpu());
        params.insert(NPROBE, 11);
        assert_eq!(NprobeCheck::evaluate(&params, 10), NprobeCheck::AboveLimit(11));
        assert!(NprobeCheck::evaluate(&params, 10).forces_cpu());
    }
}
