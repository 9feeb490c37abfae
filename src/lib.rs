//! accel-probe: accelerator capability and memory accounting for model serving.
//!
//! Normalizes a device specification into a backend identity
//! (CUDA, XPU, MPS, CPU or auto), answers feature queries
//! (flash attention, turbo model), dispatches memory housekeeping to the
//! matching accelerator runtime, and lists local model checkpoints.

pub mod capability;
pub mod checkpoint;
pub mod config;
pub mod device;
pub mod handler;

pub use device::backend::{resolve, BackendIdentity, DeviceHandle, DeviceSpec};
pub use handler::{AcceleratorHandler, CapabilityReport};
