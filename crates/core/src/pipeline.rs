//! The render pipeline: a scheduler whose worker owns the graphics context,
//! the offscreen render target and the effect.
//!
//! Every public method submits a task and waits for it, so callers on any
//! thread get context-affined rendering without touching the context.

use std::thread::ThreadId;

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::effect::{Effect, FrameTarget, PassthroughEffect};
use crate::error::RenderError;
use crate::pixel::PixelBuffer;
use crate::render::api::{ContextInfo, GraphicsContext};
use crate::render::orientation::Orientation;
use crate::render::target::{Lifecycle, OffscreenRenderTarget};
use crate::scheduler::{Scheduler, TaskHandle};

/// Everything the worker thread owns.
pub struct RenderState<C: GraphicsContext> {
    target: OffscreenRenderTarget<C>,
    effect: Box<dyn Effect<C::Api>>,
}

impl<C: GraphicsContext> RenderState<C> {
    pub fn target(&self) -> &OffscreenRenderTarget<C> {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut OffscreenRenderTarget<C> {
        &mut self.target
    }

    /// One frame: draw `input` through the effect, orient, read back.
    fn render(
        &mut self,
        input: &PixelBuffer,
        orientation: Orientation,
    ) -> Result<PixelBuffer, RenderError> {
        self.target.activate_context()?;
        let frame = self.draw_frame(input, orientation);
        let released = self.target.deactivate_context();
        let frame = frame?;
        released?;
        Ok(frame)
    }

    /// An incomplete framebuffer skips the remaining draw steps; the frame
    /// still reads back whatever slot was last completed.
    fn draw_frame(
        &mut self,
        input: &PixelBuffer,
        orientation: Orientation,
    ) -> Result<PixelBuffer, RenderError> {
        if skip_incomplete(self.target.prepare_rendering())? {
            self.apply_effect(input)?;
            skip_incomplete(self.target.orient_image(orientation))?;
        }
        self.target.read_current_buffer()
    }

    fn apply_effect(&mut self, input: &PixelBuffer) -> Result<(), RenderError> {
        let texture = self
            .target
            .current_slot_texture()
            .ok_or(RenderError::NotInitialized)?;
        let frame = FrameTarget::new(texture);
        let gl = self.target.gl();
        self.effect.draw(gl, &frame, input)?;
        let leftover = gl.diagnostics().poll(gl.api());
        if leftover > 0 {
            debug!(effect = self.effect.name(), leftover, "errors left by effect");
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.target.surface_changed(width, height)?;
        self.effect.surface_changed(width, height);
        Ok(())
    }

    /// Releases the effect's objects, then deinitializes the target.
    fn shutdown(&mut self) -> Result<(), RenderError> {
        if self.target.lifecycle() != Lifecycle::Initialized {
            return Ok(());
        }
        self.target.activate_context()?;
        self.effect.release(self.target.gl());
        self.target.deactivate_context()?;
        self.target.deinit()
    }
}

impl<C: GraphicsContext> Drop for RenderState<C> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("render state teardown on drop failed: {e}");
        }
    }
}

/// Passes a draw step's result through, except that an incomplete
/// framebuffer becomes `Ok(false)`.
fn skip_incomplete(step: Result<(), RenderError>) -> Result<bool, RenderError> {
    match step {
        Ok(()) => Ok(true),
        Err(RenderError::FramebufferIncomplete { target, status }) => {
            warn!(target_slot = target, %status, "frame skipped, reading back the last completed slot");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Context-affined render pipeline over a graphics context `C`.
pub struct RenderPipeline<C: GraphicsContext + 'static> {
    scheduler: Scheduler<RenderState<C>>,
    info: ContextInfo,
    config: PipelineConfig,
}

impl<C: GraphicsContext + 'static> RenderPipeline<C> {
    /// Starts the worker and, on it, creates the context, the render target
    /// (initialized) and the effect.
    ///
    /// # Errors
    ///
    /// Config validation, context creation, `init()` or worker spawn
    /// failures. Nothing is left running on error.
    pub fn create<CF, EF>(
        config: PipelineConfig,
        context_factory: CF,
        effect_factory: EF,
    ) -> Result<Self, RenderError>
    where
        CF: FnOnce() -> Result<C, RenderError> + Send + 'static,
        EF: FnOnce() -> Box<dyn Effect<C::Api>> + Send + 'static,
    {
        config.validate()?;
        let (width, height) = (config.width, config.height);

        let scheduler = Scheduler::spawn(&config.worker_name, config.queue_capacity, move || {
            let context = context_factory()?;
            let mut target = OffscreenRenderTarget::new(context, width, height)?;
            target.init()?;
            let effect = effect_factory();
            debug!(effect = effect.name(), "effect ready");
            Ok(RenderState { target, effect })
        })?;

        let info = scheduler
            .submit(|state| state.target.context_info().ok_or(RenderError::NotInitialized))?
            .wait()?;
        info!(
            width,
            height,
            gl_major = info.major_version,
            gl_minor = info.minor_version,
            "render pipeline ready"
        );

        Ok(Self {
            scheduler,
            info,
            config,
        })
    }

    /// [`create`](Self::create) with [`PassthroughEffect`].
    pub fn with_passthrough<CF>(config: PipelineConfig, context_factory: CF) -> Result<Self, RenderError>
    where
        CF: FnOnce() -> Result<C, RenderError> + Send + 'static,
    {
        Self::create(config, context_factory, || {
            Box::new(PassthroughEffect) as Box<dyn Effect<C::Api>>
        })
    }

    /// Renders `input` with `orientation` applied and returns the read-back
    /// pixels. `input` must match the current target dimensions.
    pub fn render(
        &self,
        input: PixelBuffer,
        orientation: Orientation,
    ) -> Result<PixelBuffer, RenderError> {
        self.scheduler
            .submit(move |state| state.render(&input, orientation))?
            .wait()
    }

    /// Changes the target dimensions; textures are recreated on the next frame.
    pub fn resize(&self, width: u32, height: u32) -> Result<(), RenderError> {
        self.scheduler
            .submit(move |state| state.resize(width, height))?
            .wait()
    }

    /// Current target dimensions, as seen by the worker.
    pub fn dimensions(&self) -> Result<(u32, u32), RenderError> {
        self.scheduler
            .submit(|state| Ok(state.target.dimensions()))?
            .wait()
    }

    /// Deinitializes the target and stops the worker. Safe to call more
    /// than once; every later call to the pipeline fails with
    /// `RenderError::SchedulerClosed`.
    pub fn teardown(&self) -> Result<(), RenderError> {
        if self.scheduler.is_closed() {
            return Ok(());
        }
        let result = self
            .scheduler
            .submit(RenderState::shutdown)
            .and_then(TaskHandle::wait);
        self.scheduler.shutdown();
        info!("render pipeline torn down");
        match result {
            Err(RenderError::SchedulerClosed) => Ok(()),
            other => other,
        }
    }

    /// Runs arbitrary work against the render target on the worker.
    pub fn submit<R, F>(&self, task: F) -> Result<TaskHandle<R>, RenderError>
    where
        F: FnOnce(&mut OffscreenRenderTarget<C>) -> Result<R, RenderError> + Send + 'static,
        R: Send + 'static,
    {
        self.scheduler.submit(move |state| task(&mut state.target))
    }

    /// Capabilities queried when the target was initialized.
    pub fn context_info(&self) -> ContextInfo {
        self.info
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn worker_thread_id(&self) -> ThreadId {
        self.scheduler.worker_thread_id()
    }
}
