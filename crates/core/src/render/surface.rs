//! Full-screen quad used by the orientation-correction pass.
//!
//! [`SurfaceHandler`] owns the vertex array, vertex buffer and index buffer
//! for one quad. Changing the orientation only moves the table index;
//! [`SurfaceHandler::update_vertices_buffer`] is the separate step that
//! uploads the selected entry.

use tracing::trace;

use super::api::GraphicsApi;
use super::diagnostics::CheckedGl;
use super::orientation::{Orientation, Rotation, FLOATS_PER_VERTEX, QUAD_INDICES};
use crate::error::RenderError;

/// Vertex shader body of the orientation program (version directive added
/// at compile time).
pub const ORIENT_VERTEX_SHADER: &str = r#"precision highp float;
layout (location = 0) in vec3 aPos;
layout (location = 1) in vec2 aTexCoord;
out vec2 vTexCoord;
void main() {
    gl_Position = vec4(aPos, 1.0);
    vTexCoord = aTexCoord;
}
"#;

/// Fragment shader body of the orientation program.
pub const ORIENT_FRAGMENT_SHADER: &str = r#"precision highp float;
in vec2 vTexCoord;
out vec4 FragColor;
uniform sampler2D uTexture;
void main() {
    FragColor = texture(uTexture, vTexCoord);
}
"#;

const POSITION_ATTRIB: u32 = 0;
const TEXCOORD_ATTRIB: u32 = 1;
const STRIDE: i32 = (FLOATS_PER_VERTEX * std::mem::size_of::<f32>()) as i32;
const TEXCOORD_OFFSET: i32 = (3 * std::mem::size_of::<f32>()) as i32;

/// Vertex/index/array-object triple drawing the oriented quad.
#[derive(Debug)]
pub struct SurfaceHandler<A: GraphicsApi> {
    orientation: Orientation,
    vao: A::VertexArray,
    vbo: A::Buffer,
    ebo: A::Buffer,
}

impl<A: GraphicsApi> SurfaceHandler<A> {
    /// Creates the GPU objects and uploads the entry for `orientation`.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Allocation` if any object cannot be created;
    /// objects created before the failure are released.
    pub fn new(gl: CheckedGl<'_, A>, orientation: Orientation) -> Result<Self, RenderError> {
        let vao = gl
            .call(|gl| gl.create_vertex_array())
            .map_err(RenderError::Allocation)?;
        let vbo = match gl.call(|gl| gl.create_buffer()) {
            Ok(vbo) => vbo,
            Err(e) => {
                gl.call(|gl| gl.delete_vertex_array(vao));
                return Err(RenderError::Allocation(e));
            }
        };
        let ebo = match gl.call(|gl| gl.create_buffer()) {
            Ok(ebo) => ebo,
            Err(e) => {
                gl.call(|gl| gl.delete_buffer(vbo));
                gl.call(|gl| gl.delete_vertex_array(vao));
                return Err(RenderError::Allocation(e));
            }
        };

        gl.call(|gl| gl.bind_vertex_array(Some(vao)));

        gl.call(|gl| gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo)));
        gl.call(|gl| {
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(orientation.vertices()),
                glow::STATIC_DRAW,
            )
        });

        gl.call(|gl| gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo)));
        gl.call(|gl| {
            gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(&QUAD_INDICES),
                glow::STATIC_DRAW,
            )
        });

        gl.call(|gl| {
            gl.vertex_attrib_pointer_f32(POSITION_ATTRIB, 3, glow::FLOAT, false, STRIDE, 0)
        });
        gl.call(|gl| gl.enable_vertex_attrib_array(POSITION_ATTRIB));
        gl.call(|gl| {
            gl.vertex_attrib_pointer_f32(
                TEXCOORD_ATTRIB,
                2,
                glow::FLOAT,
                false,
                STRIDE,
                TEXCOORD_OFFSET,
            )
        });
        gl.call(|gl| gl.enable_vertex_attrib_array(TEXCOORD_ATTRIB));

        // The element buffer binding is VAO state, so unbind the VAO first.
        gl.call(|gl| gl.bind_vertex_array(None));
        gl.call(|gl| gl.bind_buffer(glow::ARRAY_BUFFER, None));
        gl.call(|gl| gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None));

        Ok(Self {
            orientation,
            vao,
            vbo,
            ebo,
        })
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, rotation: Rotation) {
        self.orientation.rotation = rotation;
    }

    pub fn set_y_flip(&mut self, y_flip: bool) {
        self.orientation.y_flip = y_flip;
    }

    /// Uploads the table entry for the current orientation.
    pub fn update_vertices_buffer(&self, gl: CheckedGl<'_, A>) {
        gl.call(|gl| gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo)));
        gl.call(|gl| {
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(self.orientation.vertices()),
                glow::STATIC_DRAW,
            )
        });
        gl.call(|gl| gl.bind_buffer(glow::ARRAY_BUFFER, None));
        trace!(orientation = ?self.orientation, "orientation vertices uploaded");
    }

    /// Draws the quad as two indexed triangles.
    pub fn draw(&self, gl: CheckedGl<'_, A>) {
        gl.call(|gl| gl.bind_vertex_array(Some(self.vao)));
        gl.call(|gl| {
            gl.draw_elements(
                glow::TRIANGLES,
                QUAD_INDICES.len() as i32,
                glow::UNSIGNED_INT,
                0,
            )
        });
        gl.call(|gl| gl.bind_vertex_array(None));
    }

    pub fn destroy(self, gl: CheckedGl<'_, A>) {
        gl.call(|gl| gl.delete_vertex_array(self.vao));
        gl.call(|gl| gl.delete_buffer(self.vbo));
        gl.call(|gl| gl.delete_buffer(self.ebo));
    }
}
