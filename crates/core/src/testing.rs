//! Recording fake of the graphics API for unit tests.
//!
//! `RecordingGl` keeps just enough GL state (bindings, attachments, texture
//! storage, the last vertex upload) to make the render target observable,
//! and records every call with the thread that issued it. Handles are never
//! reused. `draw_elements` samples the texture bound to unit 0 through the
//! uploaded quad with nearest filtering, so orientation passes produce real
//! pixel permutations.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use crate::error::RenderError;
use crate::render::api::{GraphicsApi, GraphicsContext};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub name: &'static str,
    pub thread: ThreadId,
    /// Whether a context was current on `thread` when the call was made.
    pub current: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TextureRecord {
    pub width: i32,
    pub height: i32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Default)]
struct GlState {
    calls: Vec<RecordedCall>,
    current_thread: Option<ThreadId>,
    next_handle: u32,
    errors: VecDeque<u32>,
    textures: HashMap<u32, TextureRecord>,
    framebuffers: HashSet<u32>,
    shaders: HashMap<u32, u32>,
    programs: HashSet<u32>,
    buffers: HashSet<u32>,
    vertex_arrays: HashSet<u32>,
    deleted: HashSet<u32>,
    invalid_deletes: usize,
    bound_texture: Option<u32>,
    bound_framebuffer: Option<u32>,
    attachments: HashMap<u32, u32>,
    current_program: Option<u32>,
    bound_vertex_array: Option<u32>,
    vertex_data: Option<Vec<f32>>,
    vertex_uploads: usize,
    draws: usize,
    framebuffer_status: Option<u32>,
    failing_stage: Option<u32>,
    fail_link: bool,
}

impl GlState {
    fn alloc(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn release(&mut self, handle: u32, live: bool) {
        if !live || !self.deleted.insert(handle) {
            self.invalid_deletes += 1;
        }
    }

    fn draw_quad(&mut self) {
        let (Some(vertices), Some(source), Some(fb)) = (
            self.vertex_data.clone(),
            self.bound_texture,
            self.bound_framebuffer,
        ) else {
            return;
        };
        let Some(&target) = self.attachments.get(&fb) else {
            return;
        };
        let Some(src) = self.textures.get(&source).cloned() else {
            return;
        };
        let Some(dst) = self.textures.get_mut(&target) else {
            return;
        };

        // Texture coordinates at the four clip-space corners.
        let corner = |sx: f32, sy: f32| -> (f32, f32) {
            vertices
                .chunks_exact(5)
                .find(|v| v[0] == sx && v[1] == sy)
                .map(|v| (v[3], v[4]))
                .unwrap_or((0.0, 0.0))
        };
        let (bl, br, tl, tr) = (
            corner(-1.0, -1.0),
            corner(1.0, -1.0),
            corner(-1.0, 1.0),
            corner(1.0, 1.0),
        );
        let lerp = |a: (f32, f32), b: (f32, f32), t: f32| {
            (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
        };

        for y in 0..dst.height {
            for x in 0..dst.width {
                let s = (x as f32 + 0.5) / dst.width as f32;
                let t = (y as f32 + 0.5) / dst.height as f32;
                let (u, v) = lerp(lerp(bl, br, s), lerp(tl, tr, s), t);
                let sx = ((u * src.width as f32) as i32).clamp(0, src.width - 1);
                let sy = ((v * src.height as f32) as i32).clamp(0, src.height - 1);
                let from = ((sy * src.width + sx) * 4) as usize;
                let to = ((y * dst.width + x) * 4) as usize;
                if from + 4 <= src.pixels.len() && to + 4 <= dst.pixels.len() {
                    dst.pixels[to..to + 4].copy_from_slice(&src.pixels[from..from + 4]);
                }
            }
        }
    }
}

/// Shared-state fake of [`GraphicsApi`]; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct RecordingGl {
    state: Arc<Mutex<GlState>>,
}

impl RecordingGl {
    pub const MAX_TEXTURE_SIZE: i32 = 4096;

    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, name: &'static str) -> MutexGuard<'_, GlState> {
        let mut state = self.state.lock().unwrap();
        let thread = thread::current().id();
        let current = state.current_thread == Some(thread);
        state.calls.push(RecordedCall {
            name,
            thread,
            current,
        });
        state
    }

    /// Records a call that touches no fake state.
    fn log_call(&self, name: &'static str) {
        drop(self.record(name));
    }

    fn set_current(&self, thread: Option<ThreadId>) {
        self.peek().current_thread = thread;
    }

    fn peek(&self) -> MutexGuard<'_, GlState> {
        self.state.lock().unwrap()
    }

    pub fn inject_error(&self, code: u32) {
        self.peek().errors.push_back(code);
    }

    pub fn set_framebuffer_status(&self, status: u32) {
        self.peek().framebuffer_status = Some(status);
    }

    pub fn fail_compile(&self, shader_type: u32) {
        self.peek().failing_stage = Some(shader_type);
    }

    pub fn fail_link(&self) {
        self.peek().fail_link = true;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.peek().calls.clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.peek().calls.iter().map(|c| c.name).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.peek().calls.iter().filter(|c| c.name == name).count()
    }

    pub fn clear_calls(&self) {
        self.peek().calls.clear();
    }

    pub fn texture(&self, handle: u32) -> Option<TextureRecord> {
        self.peek().textures.get(&handle).cloned()
    }

    pub fn live_textures(&self) -> Vec<u32> {
        let state = self.peek();
        let mut live: Vec<u32> = state
            .textures
            .keys()
            .filter(|h| !state.deleted.contains(h))
            .copied()
            .collect();
        live.sort_unstable();
        live
    }

    pub fn live_objects(&self) -> usize {
        let state = self.peek();
        let all = state
            .textures
            .keys()
            .chain(state.framebuffers.iter())
            .chain(state.shaders.keys())
            .chain(state.programs.iter())
            .chain(state.buffers.iter())
            .chain(state.vertex_arrays.iter());
        all.filter(|h| !state.deleted.contains(h)).count()
    }

    pub fn is_deleted(&self, handle: u32) -> bool {
        self.peek().deleted.contains(&handle)
    }

    pub fn invalid_deletes(&self) -> usize {
        self.peek().invalid_deletes
    }

    pub fn bound_framebuffer(&self) -> Option<u32> {
        self.peek().bound_framebuffer
    }

    pub fn attachment(&self, framebuffer: u32) -> Option<u32> {
        self.peek().attachments.get(&framebuffer).copied()
    }

    pub fn current_program(&self) -> Option<u32> {
        self.peek().current_program
    }

    pub fn vertex_data(&self) -> Option<Vec<f32>> {
        self.peek().vertex_data.clone()
    }

    pub fn vertex_uploads(&self) -> usize {
        self.peek().vertex_uploads
    }

    pub fn draws(&self) -> usize {
        self.peek().draws
    }
}

impl GraphicsApi for RecordingGl {
    type Texture = u32;
    type Framebuffer = u32;
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type VertexArray = u32;

    fn get_error(&self) -> u32 {
        self.peek().errors.pop_front().unwrap_or(glow::NO_ERROR)
    }

    fn get_parameter_i32(&self, parameter: u32) -> i32 {
        self.log_call("get_parameter_i32");
        match parameter {
            glow::MAJOR_VERSION => 3,
            glow::MINOR_VERSION => 0,
            glow::MAX_TEXTURE_SIZE => Self::MAX_TEXTURE_SIZE,
            _ => 0,
        }
    }

    fn flush(&self) {
        self.log_call("flush");
    }

    fn viewport(&self, _x: i32, _y: i32, _width: i32, _height: i32) {
        self.log_call("viewport");
    }

    fn create_texture(&self) -> Result<u32, String> {
        let mut state = self.record("create_texture");
        let handle = state.alloc();
        state.textures.insert(handle, TextureRecord::default());
        Ok(handle)
    }

    fn delete_texture(&self, texture: u32) {
        let mut state = self.record("delete_texture");
        let live = state.textures.contains_key(&texture);
        state.release(texture, live);
    }

    fn active_texture(&self, _unit: u32) {
        self.log_call("active_texture");
    }

    fn bind_texture(&self, _target: u32, texture: Option<u32>) {
        self.record("bind_texture").bound_texture = texture;
    }

    fn tex_parameter_i32(&self, _target: u32, _parameter: u32, _value: i32) {
        self.log_call("tex_parameter_i32");
    }

    fn tex_storage_rgba8(&self, width: i32, height: i32) {
        let mut state = self.record("tex_storage_rgba8");
        if let Some(bound) = state.bound_texture {
            state.textures.insert(
                bound,
                TextureRecord {
                    width,
                    height,
                    pixels: vec![0; (width * height * 4) as usize],
                },
            );
        }
    }

    fn tex_sub_image_rgba8(&self, _width: i32, _height: i32, pixels: &[u8]) {
        let mut state = self.record("tex_sub_image_rgba8");
        if let Some(bound) = state.bound_texture {
            if let Some(record) = state.textures.get_mut(&bound) {
                record.pixels = pixels.to_vec();
            }
        }
    }

    fn create_framebuffer(&self) -> Result<u32, String> {
        let mut state = self.record("create_framebuffer");
        let handle = state.alloc();
        state.framebuffers.insert(handle);
        Ok(handle)
    }

    fn delete_framebuffer(&self, framebuffer: u32) {
        let mut state = self.record("delete_framebuffer");
        let live = state.framebuffers.contains(&framebuffer);
        state.release(framebuffer, live);
    }

    fn bind_framebuffer(&self, _target: u32, framebuffer: Option<u32>) {
        self.record("bind_framebuffer").bound_framebuffer = framebuffer;
    }

    fn framebuffer_texture_2d(
        &self,
        _target: u32,
        _attachment: u32,
        _texture_target: u32,
        texture: Option<u32>,
        _level: i32,
    ) {
        let mut state = self.record("framebuffer_texture_2d");
        if let Some(fb) = state.bound_framebuffer {
            match texture {
                Some(texture) => state.attachments.insert(fb, texture),
                None => state.attachments.remove(&fb),
            };
        }
    }

    fn check_framebuffer_status(&self, _target: u32) -> u32 {
        self.record("check_framebuffer_status")
            .framebuffer_status
            .unwrap_or(glow::FRAMEBUFFER_COMPLETE)
    }

    fn read_pixels_rgba8(&self, _width: i32, _height: i32, pixels: &mut [u8]) {
        let state = self.record("read_pixels_rgba8");
        let source = state
            .bound_framebuffer
            .and_then(|fb| state.attachments.get(&fb))
            .and_then(|tex| state.textures.get(tex));
        if let Some(record) = source {
            let n = pixels.len().min(record.pixels.len());
            pixels[..n].copy_from_slice(&record.pixels[..n]);
        }
    }

    fn create_shader(&self, shader_type: u32) -> Result<u32, String> {
        let mut state = self.record("create_shader");
        let handle = state.alloc();
        state.shaders.insert(handle, shader_type);
        Ok(handle)
    }

    fn shader_source(&self, _shader: u32, _source: &str) {
        self.log_call("shader_source");
    }

    fn compile_shader(&self, _shader: u32) {
        self.log_call("compile_shader");
    }

    fn get_shader_compile_status(&self, shader: u32) -> bool {
        let state = self.record("get_shader_compile_status");
        state.failing_stage.is_none() || state.shaders.get(&shader) != state.failing_stage.as_ref()
    }

    fn get_shader_info_log(&self, _shader: u32) -> String {
        self.log_call("get_shader_info_log");
        "ERROR: 0:3: 'vTexCoord' : undeclared identifier".to_string()
    }

    fn delete_shader(&self, shader: u32) {
        let mut state = self.record("delete_shader");
        let live = state.shaders.contains_key(&shader);
        state.release(shader, live);
    }

    fn create_program(&self) -> Result<u32, String> {
        let mut state = self.record("create_program");
        let handle = state.alloc();
        state.programs.insert(handle);
        Ok(handle)
    }

    fn attach_shader(&self, _program: u32, _shader: u32) {
        self.log_call("attach_shader");
    }

    fn detach_shader(&self, _program: u32, _shader: u32) {
        self.log_call("detach_shader");
    }

    fn link_program(&self, _program: u32) {
        self.log_call("link_program");
    }

    fn get_program_link_status(&self, _program: u32) -> bool {
        !self.record("get_program_link_status").fail_link
    }

    fn get_program_info_log(&self, _program: u32) -> String {
        self.log_call("get_program_info_log");
        "error: varying vTexCoord not written by vertex shader".to_string()
    }

    fn use_program(&self, program: Option<u32>) {
        self.record("use_program").current_program = program;
    }

    fn delete_program(&self, program: u32) {
        let mut state = self.record("delete_program");
        let live = state.programs.contains(&program);
        state.release(program, live);
    }

    fn create_vertex_array(&self) -> Result<u32, String> {
        let mut state = self.record("create_vertex_array");
        let handle = state.alloc();
        state.vertex_arrays.insert(handle);
        Ok(handle)
    }

    fn bind_vertex_array(&self, vertex_array: Option<u32>) {
        self.record("bind_vertex_array").bound_vertex_array = vertex_array;
    }

    fn delete_vertex_array(&self, vertex_array: u32) {
        let mut state = self.record("delete_vertex_array");
        let live = state.vertex_arrays.contains(&vertex_array);
        state.release(vertex_array, live);
    }

    fn create_buffer(&self) -> Result<u32, String> {
        let mut state = self.record("create_buffer");
        let handle = state.alloc();
        state.buffers.insert(handle);
        Ok(handle)
    }

    fn bind_buffer(&self, _target: u32, _buffer: Option<u32>) {
        self.log_call("bind_buffer");
    }

    fn buffer_data_u8_slice(&self, target: u32, data: &[u8], _usage: u32) {
        let mut state = self.record("buffer_data_u8_slice");
        if target == glow::ARRAY_BUFFER {
            let floats = data
                .chunks_exact(4)
                .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            state.vertex_data = Some(floats);
            state.vertex_uploads += 1;
        }
    }

    fn delete_buffer(&self, buffer: u32) {
        let mut state = self.record("delete_buffer");
        let live = state.buffers.contains(&buffer);
        state.release(buffer, live);
    }

    fn vertex_attrib_pointer_f32(
        &self,
        _index: u32,
        _size: i32,
        _data_type: u32,
        _normalized: bool,
        _stride: i32,
        _offset: i32,
    ) {
        self.log_call("vertex_attrib_pointer_f32");
    }

    fn enable_vertex_attrib_array(&self, _index: u32) {
        self.log_call("enable_vertex_attrib_array");
    }

    fn draw_elements(&self, _mode: u32, _count: i32, _element_type: u32, _offset: i32) {
        let mut state = self.record("draw_elements");
        state.draws += 1;
        if state.current_program.is_some() && state.bound_vertex_array.is_some() {
            state.draw_quad();
        }
    }
}

/// Fake display/surface/context triple around a [`RecordingGl`].
///
/// Currency is tracked in the shared GL state so every recorded call knows
/// whether the context was active on its thread.
#[derive(Debug, Clone, Default)]
pub struct FakeContext {
    gl: RecordingGl,
}

impl FakeContext {
    pub fn new(gl: RecordingGl) -> Self {
        Self { gl }
    }

    pub fn current_thread(&self) -> Option<ThreadId> {
        self.gl.peek().current_thread
    }
}

/// Names of the context calls themselves, which bracket GL work.
pub const CONTEXT_CALLS: [&str; 2] = ["make_current", "release_current"];

impl GraphicsContext for FakeContext {
    type Api = RecordingGl;

    fn make_current(&self) -> Result<(), RenderError> {
        self.gl.log_call("make_current");
        self.gl.set_current(Some(thread::current().id()));
        Ok(())
    }

    fn release_current(&self) -> Result<(), RenderError> {
        self.gl.log_call("release_current");
        self.gl.set_current(None);
        Ok(())
    }

    fn api(&self) -> &RecordingGl {
        &self.gl
    }
}

/// Row-major RGBA8 test image whose pixel `i` is `[i, i, i, 255]`.
pub fn gradient_pixels(width: u32, height: u32) -> Vec<u8> {
    (0..width * height)
        .flat_map(|i| {
            let v = (i % 256) as u8;
            [v, v, v, 255]
        })
        .collect()
}
