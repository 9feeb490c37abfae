//! Accelerator runtimes.
//!
//! One runtime per accelerator kind exposes the driver operations the handler
//! dispatches to: availability, cache clearing, synchronization and
//! allocation accounting. With the `cuda` feature enabled, CUDA goes through
//! `cudarc`. Without it, and for XPU/MPS (no driver bindings in this build),
//! the backend is reported unavailable and every call is refused.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::device::backend::BackendIdentity;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("{0} runtime not available")]
    Unavailable(BackendIdentity),

    #[error("CUDA error: {0}")]
    Cuda(String),

    #[error("{backend} driver call failed: {operation}")]
    CallFailed {
        backend: BackendIdentity,
        operation: &'static str,
    },
}

/// Driver operations for a single accelerator kind.
///
/// Implementations must be callable from several threads at once; whether
/// the underlying driver tolerates that is the driver's concern.
pub trait AcceleratorRuntime: Send + Sync {
    /// Backend this runtime drives.
    fn backend(&self) -> BackendIdentity;

    /// Whether the accelerator is present and ready.
    fn is_available(&self) -> bool;

    /// Release cached, unused device memory.
    fn empty_cache(&self) -> Result<(), RuntimeError>;

    /// Block until outstanding device work has drained.
    fn synchronize(&self) -> Result<(), RuntimeError>;

    /// Bytes currently allocated on the device.
    fn memory_allocated(&self) -> Result<usize, RuntimeError>;

    /// Peak bytes allocated on the device.
    fn max_memory_allocated(&self) -> Result<usize, RuntimeError>;
}

/// Runtime for a backend with no usable driver.
#[derive(Debug, Clone, Copy)]
pub struct UnavailableRuntime {
    backend: BackendIdentity,
}

impl UnavailableRuntime {
    pub fn new(backend: BackendIdentity) -> Self {
        Self { backend }
    }
}

impl AcceleratorRuntime for UnavailableRuntime {
    fn backend(&self) -> BackendIdentity {
        self.backend
    }

    fn is_available(&self) -> bool {
        false
    }

    fn empty_cache(&self) -> Result<(), RuntimeError> {
        Err(RuntimeError::Unavailable(self.backend))
    }

    fn synchronize(&self) -> Result<(), RuntimeError> {
        Err(RuntimeError::Unavailable(self.backend))
    }

    fn memory_allocated(&self) -> Result<usize, RuntimeError> {
        Err(RuntimeError::Unavailable(self.backend))
    }

    fn max_memory_allocated(&self) -> Result<usize, RuntimeError> {
        Err(RuntimeError::Unavailable(self.backend))
    }
}

/// CUDA runtime backed by a `cudarc` context.
///
/// cudarc has no caching allocator: device buffers are released with
/// stream-ordered frees, so clearing the cache means draining those frees.
/// Allocation is device-wide used memory; the peak is the highest value
/// observed by this runtime.
#[cfg(feature = "cuda")]
pub struct CudaRuntime {
    ordinal: usize,
    ctx: Option<Arc<cudarc::driver::CudaContext>>,
    peak: AtomicUsize,
}

#[cfg(feature = "cuda")]
impl CudaRuntime {
    /// Open a context on the given device. Failure leaves the runtime unavailable.
    pub fn new(ordinal: usize) -> Self {
        let ctx = match cudarc::driver::CudaContext::new(ordinal) {
            Ok(ctx) => {
                tracing::info!(ordinal, "CUDA context created");
                Some(ctx)
            }
            Err(e) => {
                tracing::warn!(ordinal, "CUDA not available: {e}");
                None
            }
        };

        Self {
            ordinal,
            ctx,
            peak: AtomicUsize::new(0),
        }
    }

    fn context(&self) -> Result<&Arc<cudarc::driver::CudaContext>, RuntimeError> {
        self.ctx
            .as_ref()
            .ok_or(RuntimeError::Unavailable(BackendIdentity::Cuda))
    }

    fn used_bytes(&self) -> Result<usize, RuntimeError> {
        let ctx = self.context()?;
        ctx.bind_to_thread().map_err(cuda_error)?;
        let (free, total) = cudarc::driver::result::mem_get_info().map_err(cuda_error)?;
        let used = total.saturating_sub(free);
        self.peak.fetch_max(used, Ordering::Relaxed);
        Ok(used)
    }
}

#[cfg(feature = "cuda")]
fn cuda_error(e: cudarc::driver::DriverError) -> RuntimeError {
    RuntimeError::Cuda(e.to_string())
}

#[cfg(feature = "cuda")]
impl AcceleratorRuntime for CudaRuntime {
    fn backend(&self) -> BackendIdentity {
        BackendIdentity::Cuda
    }

    fn is_available(&self) -> bool {
        self.ctx.is_some()
    }

    fn empty_cache(&self) -> Result<(), RuntimeError> {
        debug!(ordinal = self.ordinal, "Draining pending CUDA frees");
        self.context()?.synchronize().map_err(cuda_error)
    }

    fn synchronize(&self) -> Result<(), RuntimeError> {
        self.context()?.synchronize().map_err(cuda_error)
    }

    fn memory_allocated(&self) -> Result<usize, RuntimeError> {
        self.used_bytes()
    }

    fn max_memory_allocated(&self) -> Result<usize, RuntimeError> {
        let used = self.used_bytes()?;
        Ok(self.peak.load(Ordering::Relaxed).max(used))
    }
}

/// In-memory runtime for tests and benchmarks.
///
/// Reports fixed allocation figures and counts the cache-clear and
/// synchronize calls it receives. A failing runtime claims availability but
/// refuses every driver call.
#[derive(Debug)]
pub struct RecordingRuntime {
    backend: BackendIdentity,
    available: bool,
    failing: bool,
    allocated: AtomicUsize,
    peak: AtomicUsize,
    cache_clears: AtomicUsize,
    synchronizations: AtomicUsize,
}

impl RecordingRuntime {
    pub fn new(backend: BackendIdentity, available: bool) -> Self {
        Self {
            backend,
            available,
            failing: false,
            allocated: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            cache_clears: AtomicUsize::new(0),
            synchronizations: AtomicUsize::new(0),
        }
    }

    /// Set the reported current and peak allocation.
    pub fn with_allocation(self, allocated: usize, peak: usize) -> Self {
        self.allocated.store(allocated, Ordering::Relaxed);
        self.peak.store(peak.max(allocated), Ordering::Relaxed);
        self
    }

    /// Make every driver call fail.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn cache_clears(&self) -> usize {
        self.cache_clears.load(Ordering::Relaxed)
    }

    pub fn synchronizations(&self) -> usize {
        self.synchronizations.load(Ordering::Relaxed)
    }

    fn check(&self, operation: &'static str) -> Result<(), RuntimeError> {
        if !self.available {
            return Err(RuntimeError::Unavailable(self.backend));
        }
        if self.failing {
            return Err(RuntimeError::CallFailed {
                backend: self.backend,
                operation,
            });
        }
        Ok(())
    }
}

impl AcceleratorRuntime for RecordingRuntime {
    fn backend(&self) -> BackendIdentity {
        self.backend
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn empty_cache(&self) -> Result<(), RuntimeError> {
        self.check("empty_cache")?;
        self.cache_clears.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn synchronize(&self) -> Result<(), RuntimeError> {
        self.check("synchronize")?;
        self.synchronizations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn memory_allocated(&self) -> Result<usize, RuntimeError> {
        self.check("memory_allocated")?;
        Ok(self.allocated.load(Ordering::Relaxed))
    }

    fn max_memory_allocated(&self) -> Result<usize, RuntimeError> {
        self.check("max_memory_allocated")?;
        Ok(self.peak.load(Ordering::Relaxed))
    }
}

/// One runtime per accelerator kind.
#[derive(Clone)]
pub struct Backends {
    pub cuda: Arc<dyn AcceleratorRuntime>,
    pub xpu: Arc<dyn AcceleratorRuntime>,
    pub mps: Arc<dyn AcceleratorRuntime>,
}

impl Backends {
    /// Every accelerator unavailable (CPU-only host).
    pub fn unavailable() -> Self {
        Self {
            cuda: Arc::new(UnavailableRuntime::new(BackendIdentity::Cuda)),
            xpu: Arc::new(UnavailableRuntime::new(BackendIdentity::Xpu)),
            mps: Arc::new(UnavailableRuntime::new(BackendIdentity::Mps)),
        }
    }

    /// Detect the runtimes compiled into this binary.
    ///
    /// `cuda_ordinal` selects the CUDA device to open when the `cuda`
    /// feature is enabled.
    pub fn detect(cuda_ordinal: usize) -> Self {
        #[cfg(feature = "cuda")]
        {
            Self::unavailable().with_cuda(Arc::new(CudaRuntime::new(cuda_ordinal)))
        }

        #[cfg(not(feature = "cuda"))]
        {
            debug!(cuda_ordinal, "CUDA not enabled, running in CPU-only mode");
            Self::unavailable()
        }
    }

    pub fn with_cuda(mut self, runtime: Arc<dyn AcceleratorRuntime>) -> Self {
        self.cuda = runtime;
        self
    }

    pub fn with_xpu(mut self, runtime: Arc<dyn AcceleratorRuntime>) -> Self {
        self.xpu = runtime;
        self
    }

    pub fn with_mps(mut self, runtime: Arc<dyn AcceleratorRuntime>) -> Self {
        self.mps = runtime;
        self
    }

    /// Runtime driving the given identity; CPU and auto have none.
    pub fn runtime(&self, identity: BackendIdentity) -> Option<&dyn AcceleratorRuntime> {
        match identity {
            BackendIdentity::Cuda => Some(self.cuda.as_ref()),
            BackendIdentity::Xpu => Some(self.xpu.as_ref()),
            BackendIdentity::Mps => Some(self.mps.as_ref()),
            BackendIdentity::Cpu | BackendIdentity::Auto => None,
        }
    }

    /// Runtime for the identity, only if it reports itself ready.
    pub fn ready(&self, identity: BackendIdentity) -> Option<&dyn AcceleratorRuntime> {
        self.runtime(identity).filter(|rt| rt.is_available())
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("cuda", &self.cuda.is_available())
            .field("xpu", &self.xpu.is_available())
            .field("mps", &self.mps.is_available())
            .finish()
    }
}
