//! Accelerator handler: device capability queries and memory housekeeping.
//!
//! The handler owns the serving process's device specification and the
//! configuration of the currently loaded model. Every query re-resolves the
//! device to a [`BackendIdentity`] and dispatches to the matching runtime.
//! All operations are infallible from the caller's point of view: a backend
//! that is absent, not ready, or whose driver call fails yields a no-op or
//! zero, so they are safe to call before every inference step.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capability::CapabilityRegistry;
use crate::checkpoint::CheckpointLocator;
use crate::config::{Config, ModelConfig};
use crate::device::backend::{resolve, BackendIdentity, DeviceHandle, DeviceSpec, AUTO_TAG};
use crate::device::runtime::{AcceleratorRuntime, Backends, RuntimeError};

/// Snapshot of the handler's device capabilities and checkpoint inventory.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityReport {
    /// Device specification as configured.
    pub device: String,

    /// Resolved backend identity.
    pub backend: BackendIdentity,

    /// Whether the resolved backend has a ready accelerator.
    pub accelerator_ready: bool,

    pub flash_attention: bool,
    pub turbo_model: bool,

    /// Currently allocated accelerator memory in bytes.
    pub allocated_bytes: usize,

    /// Peak allocated accelerator memory in bytes.
    pub peak_allocated_bytes: usize,

    pub checkpoint_roots: Vec<PathBuf>,
    pub models: Vec<String>,
}

/// Device-facing state of a model-serving handler.
#[derive(Debug)]
pub struct AcceleratorHandler {
    /// Current device specification.
    device: DeviceSpec,

    /// Configuration of the loaded model (None = nothing loaded).
    model_config: Option<ModelConfig>,

    /// Optional capabilities probed at startup.
    capabilities: CapabilityRegistry,

    /// Accelerator runtimes.
    backends: Backends,

    /// Checkpoint discovery.
    checkpoints: CheckpointLocator,
}

impl AcceleratorHandler {
    pub fn new(
        device: impl Into<DeviceSpec>,
        backends: Backends,
        capabilities: CapabilityRegistry,
        checkpoints: CheckpointLocator,
    ) -> Self {
        let device = device.into();
        info!(
            device = %device,
            backend = %resolve(Some(&device)),
            flash_attention = capabilities.flash_attention_installed(),
            ?backends,
            "Accelerator handler initialized"
        );

        Self {
            device,
            model_config: None,
            capabilities,
            backends,
            checkpoints,
        }
    }

    /// Build a handler from configuration, detecting runtimes and capabilities.
    pub fn from_config(config: &Config) -> Self {
        let ordinal = DeviceHandle::parse(&config.device.device).index.unwrap_or(0);
        let mut handler = Self::new(
            config.device.device.as_str(),
            Backends::detect(ordinal),
            CapabilityRegistry::detect(),
            CheckpointLocator::from_config(&config.paths),
        );
        if let Some(model) = &config.model {
            handler.load_model_config(model.clone());
        }
        handler
    }

    pub fn device(&self) -> &DeviceSpec {
        &self.device
    }

    pub fn set_device(&mut self, device: impl Into<DeviceSpec>) {
        self.device = device.into();
        debug!(device = %self.device, "Device changed");
    }

    pub fn model_config(&self) -> Option<&ModelConfig> {
        self.model_config.as_ref()
    }

    pub fn load_model_config(&mut self, config: ModelConfig) {
        info!(model = %config.name, is_turbo = config.is_turbo, "Model configuration loaded");
        self.model_config = Some(config);
    }

    pub fn unload_model_config(&mut self) -> Option<ModelConfig> {
        self.model_config.take()
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    pub fn checkpoints(&self) -> &CheckpointLocator {
        &self.checkpoints
    }

    /// Backend identity of the handler's current device.
    pub fn device_identity(&self) -> BackendIdentity {
        resolve(Some(&self.device))
    }

    /// Resolve a caller-supplied specification, defaulting to the handler's device.
    pub fn resolve_device(&self, spec: Option<&DeviceSpec>) -> BackendIdentity {
        resolve(Some(self.effective_device(spec)))
    }

    fn effective_device<'a>(&'a self, spec: Option<&'a DeviceSpec>) -> &'a DeviceSpec {
        spec.filter(|s| !s.is_empty()).unwrap_or(&self.device)
    }

    // ─── Capability Queries ────────────────────────────────────────────────

    /// Whether flash attention can be used on the given device (or the handler's).
    ///
    /// Flash attention is CUDA-only: an explicit "cuda" or "auto" target
    /// qualifies when CUDA is ready, every other tag (including unrecognized
    /// ones and an empty kind such as ":1") does not. Only an absent or empty
    /// device means "auto". The installed kernels must also have been found
    /// at startup.
    pub fn supports_flash_attention(&self, device_override: Option<&DeviceSpec>) -> bool {
        let device = self.effective_device(device_override);
        let tag = if device.is_empty() { AUTO_TAG } else { device.tag() };

        let cuda_target = match BackendIdentity::from_tag(tag) {
            Some(BackendIdentity::Cuda) | Some(BackendIdentity::Auto) => true,
            Some(BackendIdentity::Xpu)
            | Some(BackendIdentity::Mps)
            | Some(BackendIdentity::Cpu)
            | None => false,
        };

        cuda_target
            && self.backends.cuda.is_available()
            && self.capabilities.flash_attention_installed()
    }

    /// Whether the loaded model is a turbo variant (false when nothing is loaded).
    pub fn is_turbo_model(&self) -> bool {
        self.model_config
            .as_ref()
            .is_some_and(|config| config.is_turbo)
    }

    // ─── Memory / Sync Dispatch ────────────────────────────────────────────

    /// Release cached accelerator memory. No-op without a ready accelerator.
    pub fn clear_cache(&self) {
        self.command("empty_cache", |rt| rt.empty_cache());
    }

    /// Wait for outstanding accelerator work. No-op without a ready accelerator.
    pub fn synchronize(&self) {
        self.command("synchronize", |rt| rt.synchronize());
    }

    /// Bytes currently allocated on the accelerator; 0 where not tracked.
    pub fn current_allocated_bytes(&self) -> usize {
        match self.device_identity() {
            BackendIdentity::Cuda => {
                self.allocation(BackendIdentity::Cuda, "memory_allocated", |rt| {
                    rt.memory_allocated()
                })
            }
            // XPU and MPS expose no per-tensor accounting.
            BackendIdentity::Xpu
            | BackendIdentity::Mps
            | BackendIdentity::Cpu
            | BackendIdentity::Auto => 0,
        }
    }

    /// Peak bytes allocated on the accelerator; 0 where not tracked.
    pub fn peak_allocated_bytes(&self) -> usize {
        match self.device_identity() {
            BackendIdentity::Cuda => {
                self.allocation(BackendIdentity::Cuda, "max_memory_allocated", |rt| {
                    rt.max_memory_allocated()
                })
            }
            BackendIdentity::Xpu
            | BackendIdentity::Mps
            | BackendIdentity::Cpu
            | BackendIdentity::Auto => 0,
        }
    }

    fn command(
        &self,
        operation: &'static str,
        call: impl FnOnce(&dyn AcceleratorRuntime) -> Result<(), RuntimeError>,
    ) {
        let identity = self.device_identity();
        let Some(runtime) = self.backends.ready(identity) else {
            debug!(backend = %identity, operation, "No ready accelerator, skipping");
            return;
        };

        if let Err(e) = call(runtime) {
            warn!(backend = %identity, operation, "Accelerator call failed: {e}");
        }
    }

    fn allocation(
        &self,
        identity: BackendIdentity,
        operation: &'static str,
        query: impl FnOnce(&dyn AcceleratorRuntime) -> Result<usize, RuntimeError>,
    ) -> usize {
        let Some(runtime) = self.backends.ready(identity) else {
            return 0;
        };

        query(runtime).unwrap_or_else(|e| {
            warn!(backend = %identity, operation, "Allocation query failed: {e}");
            0
        })
    }

    // ─── Checkpoints ───────────────────────────────────────────────────────

    pub fn list_checkpoint_roots(&self) -> Vec<PathBuf> {
        self.checkpoints.list_checkpoint_roots()
    }

    pub fn list_named_models(&self) -> Vec<String> {
        self.checkpoints.list_named_models()
    }

    /// Collect every query into one report.
    pub fn report(&self) -> CapabilityReport {
        let backend = self.device_identity();
        CapabilityReport {
            device: self.device.to_string(),
            backend,
            accelerator_ready: self.backends.ready(backend).is_some(),
            flash_attention: self.supports_flash_attention(None),
            turbo_model: self.is_turbo_model(),
            allocated_bytes: self.current_allocated_bytes(),
            peak_allocated_bytes: self.peak_allocated_bytes(),
            checkpoint_roots: self.list_checkpoint_roots(),
            models: self.list_named_models(),
        }
    }
}
