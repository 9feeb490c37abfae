//! Optional capability detection.
//!
//! Capabilities that depend on optional kernels are probed once when the
//! registry is built and cached as plain booleans; per-call queries never
//! re-probe. Probe failures are absorbed here and recorded as "absent".

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("{0} kernels are not linked into this build")]
    NotInstalled(&'static str),

    #[error("{capability} requires {requirement}")]
    IncompatibleBuild {
        capability: &'static str,
        requirement: &'static str,
    },
}

/// Probe whether the flash-attention kernels are usable by this build.
///
/// The kernels only have a CUDA implementation, so a build without CUDA
/// support cannot use them even when they are linked.
pub fn probe_flash_attention() -> Result<(), ProbeError> {
    if !cfg!(feature = "flash-attn") {
        return Err(ProbeError::NotInstalled("flash-attention"));
    }
    if !cfg!(feature = "cuda") {
        return Err(ProbeError::IncompatibleBuild {
            capability: "flash-attention",
            requirement: "the cuda feature",
        });
    }
    Ok(())
}

/// Immutable record of which optional capabilities are installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityRegistry {
    flash_attention: bool,
}

impl CapabilityRegistry {
    /// Build a registry with explicit capability presence.
    pub fn new(flash_attention: bool) -> Self {
        Self { flash_attention }
    }

    /// Run every probe once and cache the results.
    pub fn detect() -> Self {
        let flash_attention = match probe_flash_attention() {
            Ok(()) => true,
            Err(e) => {
                debug!("Flash attention unavailable: {e}");
                false
            }
        };

        info!(flash_attention, "Capability probe complete");
        Self { flash_attention }
    }

    /// Whether the flash-attention kernels are installed.
    pub fn flash_attention_installed(&self) -> bool {
        self.flash_attention
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::detect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_matches_probe() {
        let registry = CapabilityRegistry::detect();
        assert_eq!(
            registry.flash_attention_installed(),
            probe_flash_attention().is_ok()
        );
    }

    #[cfg(not(feature = "flash-attn"))]
    #[test]
    fn test_probe_reports_missing_kernels() {
        assert_eq!(
            probe_flash_attention(),
            Err(ProbeError::NotInstalled("flash-attention"))
        );
        assert!(!CapabilityRegistry::detect().flash_attention_installed());
    }

    #[test]
    fn test_explicit_registry() {
        assert!(CapabilityRegistry::new(true).flash_attention_installed());
        assert!(!CapabilityRegistry::new(false).flash_attention_installed());
    }
}
