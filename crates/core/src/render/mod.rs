//! OpenGL ES rendering infrastructure.
//!
//! # Module overview
//!
//! - [`api`] -- The `GraphicsApi`/`GraphicsContext` seam and `ContextInfo`.
//! - [`diagnostics`] -- Error polling after every call, code names.
//! - [`glow_api`] -- `GraphicsApi` over a live `glow::Context`.
//! - [`egl`] -- Headless EGL context (feature `egl`).
//! - [`shader`] -- Shader compilation, linking, and error formatting.
//! - [`texture`] -- RGBA8 texture creation and upload.
//! - [`framebuffer`] -- Framebuffer objects and framebuffer + texture slots.
//! - [`orientation`] -- Rotation/flip state and the 8-entry vertex table.
//! - [`surface`] -- The oriented full-screen quad and its shaders.
//! - [`target`] -- The two-slot offscreen render target.

pub mod api;
pub mod diagnostics;
#[cfg(feature = "egl")]
pub mod egl;
pub mod framebuffer;
pub mod glow_api;
pub mod orientation;
pub mod shader;
pub mod surface;
pub mod target;
pub mod texture;

pub use api::{ContextInfo, GraphicsApi, GraphicsContext};
pub use diagnostics::{CheckedGl, Diagnostics, FramebufferStatus, GraphicsApiError};
#[cfg(feature = "egl")]
pub use egl::EglContext;
pub use framebuffer::{Framebuffer, FramebufferSlot, SlotKind};
pub use glow_api::GlowApi;
pub use orientation::{Orientation, Rotation, VERTEX_TABLE};
pub use shader::{compile_program, compile_shader, format_shader_error, link_program, ShaderError, ShaderProgram};
pub use surface::SurfaceHandler;
pub use target::{Lifecycle, OffscreenRenderTarget};
pub use texture::{Texture, TextureConfig};
