//! Task shape limits for GPU search.

/// Largest topk the GPU search kernels accept.
pub const DEFAULT_MAX_TOPK: i64 = 2048;

/// Largest nprobe the GPU search kernels accept.
pub const DEFAULT_MAX_NPROBE: i64 = 2048;

/// Shape limits a search must stay within to run on a GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuLimits {
    /// Max results per query
    pub max_topk: i64,
    /// Max inverted lists probed per query
    pub max_nprobe: i64,
}

impl Default for GpuLimits {
    fn default() -> Self {
        Self {
            max_topk: DEFAULT_MAX_TOPK,
            max_nprobe: DEFAULT_MAX_NPROBE,
        }
    }
}

impl GpuLimits {
    /// Create limits with the default kernel bounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max topk.
    pub fn with_max_topk(mut self, max_topk: i64) -> Self {
        self.max_topk = max_topk;
        self
    }

    /// Set max nprobe.
    pub fn with_max_nprobe(mut self, max_nprobe: i64) -> Self {
        self.max_nprobe = max_nprobe;
        self
    }
}
