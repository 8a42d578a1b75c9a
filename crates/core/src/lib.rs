#![deny(unsafe_code)]
//! Context-affined offscreen rendering with an orientation-correction pass.
//!
//! Provides the single-worker [`Scheduler`], the two-slot
//! [`OffscreenRenderTarget`](render::OffscreenRenderTarget) with its
//! precomputed orientation table, the [`Effect`] seam for the image
//! processing stage, and [`RenderPipeline`], which ties them together so any
//! thread can render while every graphics call stays on one worker.

pub mod config;
pub mod effect;
pub mod error;
pub mod pipeline;
pub mod pixel;
pub mod render;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use config::PipelineConfig;
pub use effect::{Effect, FrameTarget, PassthroughEffect};
pub use error::RenderError;
pub use pipeline::{RenderPipeline, RenderState};
pub use pixel::PixelBuffer;
pub use render::orientation::{Orientation, Rotation};
pub use scheduler::{Scheduler, TaskHandle};
