//! Offscreen render target with an orientation-correction pass.
//!
//! An [`OffscreenRenderTarget`] owns one graphics context plus two
//! framebuffer slots. The external effect draws into the primary slot
//! (see [`OffscreenRenderTarget::prepare_rendering`]); the orientation
//! pass samples the primary texture and draws it, rotated and flipped,
//! into the post-process slot. Whichever slot was written last is the
//! active one and is what [`OffscreenRenderTarget::read_current_buffer`]
//! returns.
//!
//! All methods must be called on the thread that owns the target; the
//! scheduler guarantees this for the pipeline.

use tracing::{debug, info, trace, warn};

use super::api::{ContextInfo, GraphicsApi, GraphicsContext};
use super::diagnostics::{CheckedGl, Diagnostics};
use super::framebuffer::{FramebufferSlot, SlotKind};
use super::orientation::Orientation;
use super::shader::ShaderProgram;
use super::surface::{SurfaceHandler, ORIENT_FRAGMENT_SHADER, ORIENT_VERTEX_SHADER};
use super::texture::Texture;
use crate::error::RenderError;
use crate::pixel::PixelBuffer;

/// Name the orientation program is logged under.
pub const ORIENTATION_PROGRAM: &str = "OrientationChange";

/// Where a render target is in its init/deinit lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initialized,
    Deinitialized,
}

/// Two-slot offscreen render target bound to one graphics context.
pub struct OffscreenRenderTarget<C: GraphicsContext> {
    context: C,
    diagnostics: Diagnostics,
    width: u32,
    height: u32,
    lifecycle: Lifecycle,
    primary: FramebufferSlot<C::Api>,
    postprocess: FramebufferSlot<C::Api>,
    active: Option<SlotKind>,
    program: Option<ShaderProgram<C::Api>>,
    surface: Option<SurfaceHandler<C::Api>>,
    info: Option<ContextInfo>,
}

impl<C: GraphicsContext> OffscreenRenderTarget<C> {
    /// Wraps `context`; no GPU resources are created until [`init`](Self::init).
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidDimensions` if either dimension is zero.
    pub fn new(context: C, width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        Ok(Self {
            context,
            diagnostics: Diagnostics::new(),
            width,
            height,
            lifecycle: Lifecycle::Uninitialized,
            primary: FramebufferSlot::new(SlotKind::Primary),
            postprocess: FramebufferSlot::new(SlotKind::PostProcess),
            active: None,
            program: None,
            surface: None,
            info: None,
        })
    }

    /// Allocates both framebuffers, the orientation program and the quad.
    ///
    /// Activates the context for the duration of the call and releases it
    /// afterwards. Calling `init` on an initialized or deinitialized target
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Context, allocation or shader failures. Whatever was allocated
    /// before the failure is released and the target stays uninitialized.
    pub fn init(&mut self) -> Result<(), RenderError> {
        if self.lifecycle != Lifecycle::Uninitialized {
            debug!(lifecycle = ?self.lifecycle, "init ignored");
            return Ok(());
        }

        self.context.make_current()?;
        let allocated = self.allocate();
        let released = self.context.release_current();
        allocated?;
        released?;

        self.lifecycle = Lifecycle::Initialized;
        info!(width = self.width, height = self.height, "render target initialized");
        Ok(())
    }

    fn allocate(&mut self) -> Result<(), RenderError> {
        let gl = CheckedGl::new(self.context.api(), &self.diagnostics);

        let info = ContextInfo::query(gl.api());
        if !info.fits(self.width, self.height) {
            warn!(
                width = self.width,
                height = self.height,
                max_texture_size = info.max_texture_size,
                "target dimensions exceed the driver texture limit"
            );
        }
        self.info = Some(info);

        let result = self.primary.allocate_framebuffer(gl).and_then(|()| {
            self.postprocess.allocate_framebuffer(gl)?;
            let program = ShaderProgram::compile_and_link(
                gl,
                ORIENTATION_PROGRAM,
                ORIENT_VERTEX_SHADER,
                ORIENT_FRAGMENT_SHADER,
            )?;
            match SurfaceHandler::new(gl, Orientation::IDENTITY) {
                Ok(surface) => Ok((program, surface)),
                Err(e) => {
                    program.destroy(gl);
                    Err(e)
                }
            }
        });

        match result {
            Ok((program, surface)) => {
                self.program = Some(program);
                self.surface = Some(surface);
                Ok(())
            }
            Err(e) => {
                self.primary.release_framebuffer(gl);
                self.postprocess.release_framebuffer(gl);
                Err(e)
            }
        }
    }

    /// Releases every GPU resource: program, quad buffers, framebuffers,
    /// then textures.
    ///
    /// A target that was never initialized is left untouched; a second
    /// call does nothing.
    ///
    /// # Errors
    ///
    /// Fails only if the context cannot be activated or released.
    pub fn deinit(&mut self) -> Result<(), RenderError> {
        match self.lifecycle {
            Lifecycle::Uninitialized => {
                debug!("deinit before init ignored");
                return Ok(());
            }
            Lifecycle::Deinitialized => return Ok(()),
            Lifecycle::Initialized => {}
        }

        self.context.make_current()?;
        {
            let gl = CheckedGl::new(self.context.api(), &self.diagnostics);
            if let Some(program) = self.program.take() {
                program.destroy(gl);
            }
            if let Some(surface) = self.surface.take() {
                surface.destroy(gl);
            }
            self.primary.release_framebuffer(gl);
            self.postprocess.release_framebuffer(gl);
            self.primary.delete_texture(gl);
            self.postprocess.delete_texture(gl);
        }
        self.active = None;
        self.lifecycle = Lifecycle::Deinitialized;
        info!("render target deinitialized");
        self.context.release_current()
    }

    /// Records new dimensions and drops both textures so the next pass
    /// recreates them at the new size.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidDimensions` (leaving the target
    /// unchanged) if either dimension is zero.
    pub fn surface_changed(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        self.width = width;
        self.height = height;
        if let Some(info) = self.info {
            if !info.fits(width, height) {
                warn!(width, height, max_texture_size = info.max_texture_size, "resize exceeds the driver texture limit");
            }
        }

        self.context.make_current()?;
        {
            let gl = CheckedGl::new(self.context.api(), &self.diagnostics);
            self.primary.delete_texture(gl);
            self.postprocess.delete_texture(gl);
        }
        self.active = None;
        debug!(width, height, "surface changed");
        self.context.release_current()
    }

    /// Makes the target's context current on the calling thread.
    pub fn activate_context(&self) -> Result<(), RenderError> {
        self.context.make_current()
    }

    /// Releases the context from the calling thread.
    pub fn deactivate_context(&self) -> Result<(), RenderError> {
        self.context.release_current()
    }

    fn ensure_initialized(&self) -> Result<(), RenderError> {
        if self.lifecycle == Lifecycle::Initialized {
            Ok(())
        } else {
            Err(RenderError::NotInitialized)
        }
    }

    /// Binds the primary framebuffer as the draw target, creating its
    /// texture on first use. The context must be active.
    ///
    /// # Errors
    ///
    /// `RenderError::NotInitialized` outside the initialized state, or
    /// `RenderError::FramebufferIncomplete` (active slot unchanged).
    pub fn prepare_rendering(&mut self) -> Result<(), RenderError> {
        self.ensure_initialized()?;
        let gl = CheckedGl::new(self.context.api(), &self.diagnostics);

        self.primary.ensure_texture(gl, self.width, self.height)?;
        self.primary.bind_and_attach(gl)?;
        gl.call(|gl| gl.viewport(0, 0, self.width as i32, self.height as i32));

        self.active = Some(SlotKind::Primary);
        trace!("primary framebuffer bound");
        Ok(())
    }

    /// Redraws the primary texture into the post-process slot with
    /// `orientation` applied. The context must be active.
    ///
    /// Pending work is always flushed. The identity orientation stops
    /// there: no pass is drawn and the active slot does not change.
    ///
    /// # Errors
    ///
    /// `RenderError::NotInitialized` outside the initialized state, or
    /// `RenderError::FramebufferIncomplete` (active slot unchanged).
    pub fn orient_image(&mut self, orientation: Orientation) -> Result<(), RenderError> {
        let gl = CheckedGl::new(self.context.api(), &self.diagnostics);
        gl.call(|gl| gl.flush());
        if orientation.is_identity() {
            trace!("identity orientation, correction pass skipped");
            return Ok(());
        }

        self.ensure_initialized()?;
        let (Some(program), Some(surface)) = (self.program.as_ref(), self.surface.as_mut()) else {
            return Err(RenderError::NotInitialized);
        };

        self.postprocess.ensure_texture(gl, self.width, self.height)?;
        self.postprocess.bind_and_attach(gl)?;
        gl.call(|gl| gl.viewport(0, 0, self.width as i32, self.height as i32));

        let source = self.primary.raw_texture();
        if source.is_none() {
            warn!("orientation pass without a primary texture");
        }
        gl.call(|gl| gl.active_texture(glow::TEXTURE0));
        gl.call(|gl| gl.bind_texture(glow::TEXTURE_2D, source));

        program.use_program(gl);
        surface.set_orientation(orientation.rotation);
        surface.set_y_flip(orientation.y_flip);
        surface.update_vertices_buffer(gl);
        surface.draw(gl);
        program.unuse(gl);

        gl.call(|gl| gl.flush());
        self.active = Some(SlotKind::PostProcess);
        trace!(?orientation, "orientation pass drawn");
        Ok(())
    }

    /// Reads the active slot back as RGBA8 and unbinds the framebuffer.
    ///
    /// Activates the context itself, so it may be called outside a draw.
    /// With no active slot (nothing drawn since init or the last resize)
    /// the result is a zeroed buffer at the current size and nothing is
    /// read from the driver.
    pub fn read_current_buffer(&self) -> Result<PixelBuffer, RenderError> {
        self.ensure_initialized()?;
        let Some(active) = self.active else {
            debug!(width = self.width, height = self.height, "no active slot, returning blank frame");
            return PixelBuffer::zeroed(self.width, self.height);
        };
        self.context.make_current()?;
        let gl = CheckedGl::new(self.context.api(), &self.diagnostics);

        let slot = match active {
            SlotKind::Primary => &self.primary,
            SlotKind::PostProcess => &self.postprocess,
        };
        if let Some(fb) = slot.framebuffer() {
            gl.call(|gl| gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fb)));
        }

        let mut buffer = PixelBuffer::zeroed(self.width, self.height)?;
        gl.call(|gl| {
            gl.read_pixels_rgba8(self.width as i32, self.height as i32, buffer.as_bytes_mut())
        });
        gl.call(|gl| gl.bind_framebuffer(glow::FRAMEBUFFER, None));
        Ok(buffer)
    }

    /// Texture of the active slot.
    pub fn current_texture(&self) -> Option<<C::Api as GraphicsApi>::Texture> {
        self.slot_texture(self.active?)
    }

    /// Owned texture of the active slot, for drawing into it.
    pub fn current_slot_texture(&self) -> Option<&Texture<C::Api>> {
        match self.active? {
            SlotKind::Primary => self.primary.texture(),
            SlotKind::PostProcess => self.postprocess.texture(),
        }
    }

    pub fn slot_texture(&self, kind: SlotKind) -> Option<<C::Api as GraphicsApi>::Texture> {
        match kind {
            SlotKind::Primary => self.primary.raw_texture(),
            SlotKind::PostProcess => self.postprocess.raw_texture(),
        }
    }

    pub fn slot_framebuffer(&self, kind: SlotKind) -> Option<<C::Api as GraphicsApi>::Framebuffer> {
        match kind {
            SlotKind::Primary => self.primary.framebuffer(),
            SlotKind::PostProcess => self.postprocess.framebuffer(),
        }
    }

    pub fn active_slot(&self) -> Option<SlotKind> {
        self.active
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Capabilities queried during `init()`.
    pub fn context_info(&self) -> Option<ContextInfo> {
        self.info
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// Checked access to the API for drawing into the bound slot.
    pub fn gl(&self) -> CheckedGl<'_, C::Api> {
        CheckedGl::new(self.context.api(), &self.diagnostics)
    }
}

impl<C: GraphicsContext> Drop for OffscreenRenderTarget<C> {
    fn drop(&mut self) {
        if self.lifecycle == Lifecycle::Initialized {
            if let Err(e) = self.deinit() {
                warn!("render target teardown on drop failed: {e}");
            }
        }
    }
}
