//! The `Effect` trait: the opaque image-processing stage that draws into the
//! primary framebuffer between `prepare_rendering` and the orientation pass.
//!
//! The trait is object-safe so the pipeline can hold a `Box<dyn Effect<A>>`.

use tracing::trace;

use crate::error::RenderError;
use crate::pixel::PixelBuffer;
use crate::render::api::GraphicsApi;
use crate::render::diagnostics::CheckedGl;
use crate::render::texture::Texture;

/// The primary slot an effect draws into. Already bound as the draw
/// framebuffer with the viewport covering it.
#[derive(Debug)]
pub struct FrameTarget<'a, A: GraphicsApi> {
    texture: &'a Texture<A>,
}

impl<'a, A: GraphicsApi> FrameTarget<'a, A> {
    pub fn new(texture: &'a Texture<A>) -> Self {
        Self { texture }
    }

    /// Color texture attached to the bound framebuffer.
    pub fn texture(&self) -> &'a Texture<A> {
        self.texture
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }
}

/// An image-processing stage driven on the worker thread.
pub trait Effect<A: GraphicsApi> {
    /// Name used in log output.
    fn name(&self) -> &str;

    /// Renders `input` into the bound primary framebuffer.
    ///
    /// Returns `RenderError::Effect` (or any other `RenderError`) to abort
    /// the current frame; the render target stays usable.
    fn draw(
        &mut self,
        gl: CheckedGl<'_, A>,
        frame: &FrameTarget<'_, A>,
        input: &PixelBuffer,
    ) -> Result<(), RenderError>;

    /// Called after the target has been resized.
    fn surface_changed(&mut self, _width: u32, _height: u32) {}

    /// Releases any GPU objects the effect owns. Called before the render
    /// target is deinitialized, with the context current.
    fn release(&mut self, _gl: CheckedGl<'_, A>) {}
}

/// Copies the input pixels into the frame texture unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEffect;

impl<A: GraphicsApi> Effect<A> for PassthroughEffect {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn draw(
        &mut self,
        gl: CheckedGl<'_, A>,
        frame: &FrameTarget<'_, A>,
        input: &PixelBuffer,
    ) -> Result<(), RenderError> {
        let (width, height) = (frame.width(), frame.height());
        if input.dimensions() != (width, height) {
            return Err(RenderError::Effect(format!(
                "input is {}x{} but the target is {width}x{height}",
                input.width(),
                input.height(),
            )));
        }
        frame.texture().upload(gl, input.as_bytes())?;
        trace!(width, height, "input uploaded");
        Ok(())
    }
}
