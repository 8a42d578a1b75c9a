//! RGBA8 render textures.
//!
//! Provides `TextureConfig` for specifying texture parameters and the owning
//! [`Texture`] handle. Render target textures are RGBA8 with NEAREST
//! filtering so read-back returns exactly what was drawn.

use tracing::trace;

use super::api::GraphicsApi;
use super::diagnostics::CheckedGl;
use crate::error::RenderError;

/// Configuration for creating a GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureConfig {
    /// Texture width in pixels.
    pub width: u32,
    /// Texture height in pixels.
    pub height: u32,
    /// GL texture filter mode (e.g. `glow::NEAREST`).
    pub filter: u32,
    /// GL wrap mode applied to both axes.
    pub wrap: u32,
}

impl TextureConfig {
    /// An RGBA8 render texture with NEAREST filtering and edge clamping.
    pub fn rgba8(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            filter: glow::NEAREST,
            wrap: glow::CLAMP_TO_EDGE,
        }
    }

    /// Bytes of storage one RGBA8 image of this size occupies.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// An owned GPU texture.
///
/// The handle is either present and valid or the `Texture` does not exist:
/// [`Texture::destroy`] consumes the value, so a deleted handle can never be
/// used or deleted again.
#[derive(Debug)]
pub struct Texture<A: GraphicsApi> {
    raw: A::Texture,
    config: TextureConfig,
}

impl<A: GraphicsApi> Texture<A> {
    /// Creates a texture and allocates uninitialised storage for it.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Allocation` if the driver cannot create the
    /// texture object.
    pub fn create(gl: CheckedGl<'_, A>, config: TextureConfig) -> Result<Self, RenderError> {
        let raw = gl
            .call(|gl| gl.create_texture())
            .map_err(RenderError::Allocation)?;

        gl.call(|gl| gl.bind_texture(glow::TEXTURE_2D, Some(raw)));
        gl.call(|gl| gl.tex_storage_rgba8(config.width as i32, config.height as i32));
        for (parameter, value) in [
            (glow::TEXTURE_MIN_FILTER, config.filter),
            (glow::TEXTURE_MAG_FILTER, config.filter),
            (glow::TEXTURE_WRAP_S, config.wrap),
            (glow::TEXTURE_WRAP_T, config.wrap),
        ] {
            gl.call(|gl| gl.tex_parameter_i32(glow::TEXTURE_2D, parameter, value as i32));
        }
        gl.call(|gl| gl.bind_texture(glow::TEXTURE_2D, None));

        trace!(?raw, width = config.width, height = config.height, "texture created");
        Ok(Self { raw, config })
    }

    pub fn raw(&self) -> A::Texture {
        self.raw
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Replaces the full contents with tightly packed RGBA8 `pixels`.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::BufferSizeMismatch` if `pixels` is not exactly
    /// `width * height * 4` bytes.
    pub fn upload(&self, gl: CheckedGl<'_, A>, pixels: &[u8]) -> Result<(), RenderError> {
        let expected = self.config.byte_len();
        if pixels.len() != expected {
            return Err(RenderError::BufferSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        gl.call(|gl| gl.bind_texture(glow::TEXTURE_2D, Some(self.raw)));
        gl.call(|gl| {
            gl.tex_sub_image_rgba8(self.config.width as i32, self.config.height as i32, pixels)
        });
        gl.call(|gl| gl.bind_texture(glow::TEXTURE_2D, None));
        Ok(())
    }

    pub fn destroy(self, gl: CheckedGl<'_, A>) {
        gl.call(|gl| gl.delete_texture(self.raw));
        trace!(raw = ?self.raw, "texture deleted");
    }
}
