//! Framebuffer objects and the framebuffer + texture slots of a render target.

use std::fmt;

use tracing::error;

use super::api::GraphicsApi;
use super::diagnostics::{CheckedGl, FramebufferStatus};
use super::texture::{Texture, TextureConfig};
use crate::error::RenderError;

/// Which of the two render target slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Raw render output the external effect draws into.
    Primary,
    /// Orientation-corrected output.
    PostProcess,
}

impl SlotKind {
    pub fn label(self) -> &'static str {
        match self {
            SlotKind::Primary => "primary",
            SlotKind::PostProcess => "post-process",
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An owned framebuffer object, released by consuming [`Framebuffer::destroy`].
#[derive(Debug)]
pub struct Framebuffer<A: GraphicsApi> {
    raw: A::Framebuffer,
}

impl<A: GraphicsApi> Framebuffer<A> {
    /// # Errors
    ///
    /// Returns `RenderError::Allocation` if the driver refuses.
    pub fn create(gl: CheckedGl<'_, A>) -> Result<Self, RenderError> {
        let raw = gl
            .call(|gl| gl.create_framebuffer())
            .map_err(RenderError::Allocation)?;
        Ok(Self { raw })
    }

    pub fn raw(&self) -> A::Framebuffer {
        self.raw
    }

    pub fn bind(&self, gl: CheckedGl<'_, A>) {
        gl.call(|gl| gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.raw)));
    }

    pub fn destroy(self, gl: CheckedGl<'_, A>) {
        gl.call(|gl| gl.delete_framebuffer(self.raw));
    }
}

/// A framebuffer with a lazily created color texture.
///
/// The framebuffer lives from `init()` to `deinit()`. The texture is created
/// on first use at the current target size and deleted on resize or
/// teardown; a deleted texture is gone from the slot before any later
/// recreation.
#[derive(Debug)]
pub struct FramebufferSlot<A: GraphicsApi> {
    kind: SlotKind,
    framebuffer: Option<Framebuffer<A>>,
    texture: Option<Texture<A>>,
}

impl<A: GraphicsApi> FramebufferSlot<A> {
    pub fn new(kind: SlotKind) -> Self {
        Self {
            kind,
            framebuffer: None,
            texture: None,
        }
    }

    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    pub fn framebuffer(&self) -> Option<A::Framebuffer> {
        self.framebuffer.as_ref().map(Framebuffer::raw)
    }

    pub fn texture(&self) -> Option<&Texture<A>> {
        self.texture.as_ref()
    }

    pub fn raw_texture(&self) -> Option<A::Texture> {
        self.texture.as_ref().map(Texture::raw)
    }

    /// Creates the framebuffer object if the slot has none.
    pub fn allocate_framebuffer(&mut self, gl: CheckedGl<'_, A>) -> Result<(), RenderError> {
        if self.framebuffer.is_none() {
            self.framebuffer = Some(Framebuffer::create(gl)?);
        }
        Ok(())
    }

    /// Returns the slot texture, creating it at `width x height` if absent.
    pub fn ensure_texture(
        &mut self,
        gl: CheckedGl<'_, A>,
        width: u32,
        height: u32,
    ) -> Result<&Texture<A>, RenderError> {
        if self.texture.is_none() {
            self.texture = Some(Texture::create(gl, TextureConfig::rgba8(width, height))?);
        }
        self.texture.as_ref().ok_or(RenderError::NotInitialized)
    }

    /// Binds the framebuffer, attaches the texture as color attachment 0
    /// and checks completeness.
    ///
    /// # Errors
    ///
    /// `RenderError::NotInitialized` without a framebuffer, or
    /// `RenderError::FramebufferIncomplete`; the default framebuffer is
    /// rebound in that case.
    pub fn bind_and_attach(&self, gl: CheckedGl<'_, A>) -> Result<(), RenderError> {
        let framebuffer = self.framebuffer.as_ref().ok_or(RenderError::NotInitialized)?;
        framebuffer.bind(gl);
        gl.call(|gl| {
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                self.raw_texture(),
                0,
            )
        });

        let status = FramebufferStatus(gl.call(|gl| gl.check_framebuffer_status(glow::FRAMEBUFFER)));
        if !status.is_complete() {
            error!(target_slot = self.kind.label(), %status, "failed to make complete framebuffer");
            gl.diagnostics().note_incomplete_framebuffer();
            gl.call(|gl| gl.bind_framebuffer(glow::FRAMEBUFFER, None));
            return Err(RenderError::FramebufferIncomplete {
                target: self.kind.label(),
                status,
            });
        }
        Ok(())
    }

    pub fn delete_texture(&mut self, gl: CheckedGl<'_, A>) {
        if let Some(texture) = self.texture.take() {
            texture.destroy(gl);
        }
    }

    pub fn release_framebuffer(&mut self, gl: CheckedGl<'_, A>) {
        if let Some(framebuffer) = self.framebuffer.take() {
            framebuffer.destroy(gl);
        }
    }
}
