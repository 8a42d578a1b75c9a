//! Error types for the offscreen render core.

use thiserror::Error;

use crate::render::diagnostics::FramebufferStatus;
use crate::render::shader::ShaderError;

/// Errors produced by render target, scheduler and pipeline operations.
///
/// Every variant is `Send + Sync` so failures raised on the worker thread
/// can cross the task handle back to the submitting thread.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Width or height was zero.
    #[error("invalid dimensions {width}x{height}: width and height must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// A rotation outside {0, 90, 180, 270} degrees was requested.
    #[error("invalid rotation: {0} degrees (expected 0, 90, 180 or 270)")]
    InvalidRotation(u32),

    /// A configuration value was rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The orientation shader failed to compile or link.
    #[error(transparent)]
    Shader(#[from] ShaderError),

    /// A framebuffer failed its completeness check.
    #[error("{target} framebuffer incomplete: {status}")]
    FramebufferIncomplete {
        target: &'static str,
        status: FramebufferStatus,
    },

    /// A drawing operation was requested before `init()` (or after `deinit()`).
    #[error("render target is not initialized")]
    NotInitialized,

    /// The driver refused to create a GPU object.
    #[error("graphics resource allocation failed: {0}")]
    Allocation(String),

    /// Creating, activating or releasing the graphics context failed.
    #[error("graphics context error: {0}")]
    Context(String),

    /// The external effect reported a failure.
    #[error("effect failed: {0}")]
    Effect(String),

    /// A pixel buffer did not match `width * height * 4`.
    #[error("pixel buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Submission was attempted after the scheduler started shutting down.
    #[error("scheduler is closed")]
    SchedulerClosed,

    /// A task panicked on the worker thread.
    #[error("task panicked: {0}")]
    TaskPanicked(String),

    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
}
