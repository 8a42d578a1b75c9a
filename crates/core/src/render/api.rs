//! The graphics API seam.
//!
//! [`GraphicsApi`] is the narrow slice of OpenGL ES 3.0 this crate issues.
//! Method names and argument order follow `glow::HasContext` so the
//! production implementation ([`GlowApi`](super::glow_api::GlowApi)) is a
//! straight delegation. [`GraphicsContext`] owns the display/surface/context
//! triple that must be current before any `GraphicsApi` call.

use std::fmt::Debug;

use serde::Serialize;

use crate::error::RenderError;

/// OpenGL ES calls used by the render target, shader program and surface
/// handler.
///
/// Implementations may only be driven on the thread where their owning
/// [`GraphicsContext`] is current.
pub trait GraphicsApi {
    type Texture: Copy + Eq + Debug;
    type Framebuffer: Copy + Eq + Debug;
    type Shader: Copy + Eq + Debug;
    type Program: Copy + Eq + Debug;
    type Buffer: Copy + Eq + Debug;
    type VertexArray: Copy + Eq + Debug;

    /// Pops one code off the error queue (`NO_ERROR` when clear).
    fn get_error(&self) -> u32;
    fn get_parameter_i32(&self, parameter: u32) -> i32;
    fn flush(&self);
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);

    fn create_texture(&self) -> Result<Self::Texture, String>;
    fn delete_texture(&self, texture: Self::Texture);
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: u32, texture: Option<Self::Texture>);
    fn tex_parameter_i32(&self, target: u32, parameter: u32, value: i32);
    /// Allocates uninitialised RGBA8 storage for the bound 2D texture.
    fn tex_storage_rgba8(&self, width: i32, height: i32);
    /// Replaces the full contents of the bound 2D RGBA8 texture.
    fn tex_sub_image_rgba8(&self, width: i32, height: i32, pixels: &[u8]);

    fn create_framebuffer(&self) -> Result<Self::Framebuffer, String>;
    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);
    fn bind_framebuffer(&self, target: u32, framebuffer: Option<Self::Framebuffer>);
    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<Self::Texture>,
        level: i32,
    );
    fn check_framebuffer_status(&self, target: u32) -> u32;
    /// Reads RGBA8 pixels of the bound read framebuffer into `pixels`.
    fn read_pixels_rgba8(&self, width: i32, height: i32, pixels: &mut [u8]);

    fn create_shader(&self, shader_type: u32) -> Result<Self::Shader, String>;
    fn shader_source(&self, shader: Self::Shader, source: &str);
    fn compile_shader(&self, shader: Self::Shader);
    fn get_shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn get_shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn link_program(&self, program: Self::Program);
    fn get_program_link_status(&self, program: Self::Program) -> bool;
    fn get_program_info_log(&self, program: Self::Program) -> String;
    fn use_program(&self, program: Option<Self::Program>);
    fn delete_program(&self, program: Self::Program);

    fn create_vertex_array(&self) -> Result<Self::VertexArray, String>;
    fn bind_vertex_array(&self, vertex_array: Option<Self::VertexArray>);
    fn delete_vertex_array(&self, vertex_array: Self::VertexArray);

    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn bind_buffer(&self, target: u32, buffer: Option<Self::Buffer>);
    fn buffer_data_u8_slice(&self, target: u32, data: &[u8], usage: u32);
    fn delete_buffer(&self, buffer: Self::Buffer);

    fn vertex_attrib_pointer_f32(
        &self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
    fn enable_vertex_attrib_array(&self, index: u32);
    fn draw_elements(&self, mode: u32, count: i32, element_type: u32, offset: i32);
}

/// An exclusively owned display, drawing surface and rendering context.
///
/// Exactly one exists per render target. It is activated on the worker
/// thread for the duration of a task and never shared concurrently.
pub trait GraphicsContext {
    type Api: GraphicsApi;

    /// Binds the context and its surface to the calling thread.
    fn make_current(&self) -> Result<(), RenderError>;

    /// Unbinds any context from the calling thread.
    fn release_current(&self) -> Result<(), RenderError>;

    /// The API entry points loaded for this context.
    fn api(&self) -> &Self::Api;
}

/// Capabilities reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContextInfo {
    pub major_version: i32,
    pub minor_version: i32,
    pub max_texture_size: i32,
}

impl ContextInfo {
    /// Queries version and texture limits from the current context.
    pub fn query<A: GraphicsApi>(gl: &A) -> Self {
        Self {
            major_version: gl.get_parameter_i32(glow::MAJOR_VERSION),
            minor_version: gl.get_parameter_i32(glow::MINOR_VERSION),
            max_texture_size: gl.get_parameter_i32(glow::MAX_TEXTURE_SIZE),
        }
    }

    /// Whether a `width x height` texture fits within the driver limit.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        let max = u32::try_from(self.max_texture_size).unwrap_or(0);
        width <= max && height <= max
    }
}
