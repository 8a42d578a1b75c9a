//! Shader compilation, linking and the owning [`ShaderProgram`] handle.
//!
//! Compile and link failures are returned as [`ShaderError`] values; there
//! is no partially usable program. The formatting utilities are pure string
//! processing and need no GPU context.

use thiserror::Error;
use tracing::{debug, error};

use super::api::GraphicsApi;
use super::diagnostics::CheckedGl;

/// GLSL version directive prepended to every stage.
pub const GLSL_VERSION: &str = "#version 300 es\n";

/// Errors that can occur during shader compilation or program linking.
#[derive(Debug, Clone, Error)]
pub enum ShaderError {
    /// A shader stage failed to compile.
    #[error("shader compile error ({stage}):\n{log}")]
    CompileError {
        /// The shader stage that failed (e.g. "vertex", "fragment").
        stage: String,
        /// The driver's info log describing the error.
        log: String,
    },
    /// A program failed to link.
    #[error("shader link error:\n{0}")]
    LinkError(String),
}

/// Formats a shader compilation error for human-readable debugging.
///
/// Prepends right-aligned line numbers to each line of `source`, then
/// appends the driver's error `log`. This makes it easy to correlate
/// error messages (which reference line numbers) with the actual GLSL.
///
/// Both `source` and `log` may be empty; the function handles all
/// combinations gracefully.
pub fn format_shader_error(source: &str, log: &str) -> String {
    let source_lines: Vec<&str> = if source.is_empty() {
        Vec::new()
    } else {
        source.lines().collect()
    };

    let line_count = source_lines.len();
    let width = if line_count == 0 {
        1
    } else {
        line_count.to_string().len()
    };

    let numbered: String = source_lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$}: {line}", i + 1, width = width))
        .collect::<Vec<_>>()
        .join("\n");

    match (numbered.is_empty(), log.is_empty()) {
        (true, true) => String::new(),
        (true, false) => log.to_string(),
        (false, true) => numbered,
        (false, false) => format!("{numbered}\n\n{log}"),
    }
}

/// Prefixes `body` with [`GLSL_VERSION`].
pub fn with_version(body: &str) -> String {
    format!("{GLSL_VERSION}{body}")
}

fn stage_name(shader_type: u32) -> &'static str {
    match shader_type {
        glow::VERTEX_SHADER => "vertex",
        glow::FRAGMENT_SHADER => "fragment",
        _ => "unknown",
    }
}

/// Compiles a single shader stage.
///
/// # Errors
///
/// Returns `ShaderError::CompileError` if the GLSL source fails to compile.
/// The stage object is deleted on failure.
pub fn compile_shader<A: GraphicsApi>(
    gl: CheckedGl<'_, A>,
    shader_type: u32,
    source: &str,
) -> Result<A::Shader, ShaderError> {
    let stage = stage_name(shader_type);

    let shader = gl
        .call(|gl| gl.create_shader(shader_type))
        .map_err(|log| ShaderError::CompileError {
            stage: stage.to_string(),
            log,
        })?;

    gl.call(|gl| gl.shader_source(shader, source));
    gl.call(|gl| gl.compile_shader(shader));

    if gl.call(|gl| gl.get_shader_compile_status(shader)) {
        Ok(shader)
    } else {
        let info_log = gl.call(|gl| gl.get_shader_info_log(shader));
        gl.call(|gl| gl.delete_shader(shader));
        Err(ShaderError::CompileError {
            stage: stage.to_string(),
            log: format_shader_error(source, &info_log),
        })
    }
}

/// Links a vertex and fragment shader into a program.
///
/// Attaches both shaders, links, and detaches them afterward (the program
/// retains its own copies).
///
/// # Errors
///
/// Returns `ShaderError::LinkError` if linking fails.
pub fn link_program<A: GraphicsApi>(
    gl: CheckedGl<'_, A>,
    vertex: A::Shader,
    fragment: A::Shader,
) -> Result<A::Program, ShaderError> {
    let program = gl
        .call(|gl| gl.create_program())
        .map_err(ShaderError::LinkError)?;

    gl.call(|gl| gl.attach_shader(program, vertex));
    gl.call(|gl| gl.attach_shader(program, fragment));
    gl.call(|gl| gl.link_program(program));
    gl.call(|gl| gl.detach_shader(program, vertex));
    gl.call(|gl| gl.detach_shader(program, fragment));

    if gl.call(|gl| gl.get_program_link_status(program)) {
        Ok(program)
    } else {
        let info_log = gl.call(|gl| gl.get_program_info_log(program));
        gl.call(|gl| gl.delete_program(program));
        Err(ShaderError::LinkError(info_log))
    }
}

/// Compiles vertex and fragment sources and links them into a program.
///
/// Stage objects are deleted after linking regardless of success or failure.
///
/// # Errors
///
/// Returns `ShaderError::CompileError` if either shader fails to compile,
/// or `ShaderError::LinkError` if linking fails.
pub fn compile_program<A: GraphicsApi>(
    gl: CheckedGl<'_, A>,
    vertex_src: &str,
    fragment_src: &str,
) -> Result<A::Program, ShaderError> {
    let vert = compile_shader(gl, glow::VERTEX_SHADER, vertex_src)?;
    let frag = match compile_shader(gl, glow::FRAGMENT_SHADER, fragment_src) {
        Ok(f) => f,
        Err(e) => {
            gl.call(|gl| gl.delete_shader(vert));
            return Err(e);
        }
    };

    let result = link_program(gl, vert, frag);

    gl.call(|gl| gl.delete_shader(vert));
    gl.call(|gl| gl.delete_shader(frag));

    result
}

/// An owned, linked shader program.
///
/// Released exactly once by [`ShaderProgram::destroy`], which consumes the
/// value.
#[derive(Debug)]
pub struct ShaderProgram<A: GraphicsApi> {
    name: &'static str,
    handle: A::Program,
}

impl<A: GraphicsApi> ShaderProgram<A> {
    /// Compiles both stages (each prefixed with [`GLSL_VERSION`]) and links
    /// them.
    ///
    /// # Errors
    ///
    /// Any compile or link failure; nothing is left allocated.
    pub fn compile_and_link(
        gl: CheckedGl<'_, A>,
        name: &'static str,
        vertex_body: &str,
        fragment_body: &str,
    ) -> Result<Self, ShaderError> {
        let vertex = with_version(vertex_body);
        let fragment = with_version(fragment_body);
        match compile_program(gl, &vertex, &fragment) {
            Ok(handle) => {
                debug!(program = name, ?handle, "shader program linked");
                Ok(Self { name, handle })
            }
            Err(e) => {
                error!(program = name, "{e}");
                Err(e)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn handle(&self) -> A::Program {
        self.handle
    }

    /// Makes this the active program for subsequent draws.
    pub fn use_program(&self, gl: CheckedGl<'_, A>) {
        gl.call(|gl| gl.use_program(Some(self.handle)));
    }

    /// Clears the active program.
    pub fn unuse(&self, gl: CheckedGl<'_, A>) {
        gl.call(|gl| gl.use_program(None));
    }

    pub fn destroy(self, gl: CheckedGl<'_, A>) {
        gl.call(|gl| gl.delete_program(self.handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::diagnostics::Diagnostics;
    use crate::testing::RecordingGl;

    // --- format_shader_error tests ---

    #[test]
    fn format_shader_error_prepends_line_numbers() {
        let source = "#version 300 es\nvoid main() {\n}\n";
        let log = "ERROR: 0:2: syntax error";
        let formatted = format_shader_error(source, log);

        assert!(
            formatted.contains("1: #version 300 es"),
            "expected line 1 with content, got:\n{formatted}"
        );
        assert!(
            formatted.contains("2: void main() {"),
            "expected line 2 with content, got:\n{formatted}"
        );
        assert!(
            formatted.contains(log),
            "expected driver log in output, got:\n{formatted}"
        );
    }

    #[test]
    fn format_shader_error_handles_empty_inputs() {
        assert_eq!(format_shader_error("", "some error"), "some error");
        assert_eq!(format_shader_error("void main() {}", ""), "1: void main() {}");
        assert!(format_shader_error("", "").is_empty());
    }

    #[test]
    fn format_shader_error_right_aligns_line_numbers() {
        let source = (1..=12)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let formatted = format_shader_error(&source, "err");
        let lines: Vec<&str> = formatted.lines().collect();

        assert!(lines[0].starts_with(" 1: "), "got: '{}'", lines[0]);
        assert!(lines[9].starts_with("10: "), "got: '{}'", lines[9]);
    }

    #[test]
    fn with_version_prepends_directive() {
        let src = with_version("void main() {}");
        assert!(src.starts_with("#version 300 es\n"), "got: {src}");
        assert!(src.ends_with("void main() {}"));
    }

    // --- ShaderError Display tests ---

    #[test]
    fn shader_compile_error_display_includes_stage_and_log() {
        let err = ShaderError::CompileError {
            stage: "fragment".into(),
            log: "undeclared identifier".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("fragment"), "missing stage in: {msg}");
        assert!(msg.contains("undeclared identifier"), "missing log in: {msg}");
    }

    #[test]
    fn shader_link_error_display_includes_log() {
        let err = ShaderError::LinkError("varying mismatch".into());
        assert!(err.to_string().contains("varying mismatch"));
    }

    // --- ShaderProgram against the recording backend ---

    #[test]
    fn compile_and_link_releases_stage_objects() {
        let gl = RecordingGl::new();
        let diagnostics = Diagnostics::new();
        let checked = CheckedGl::new(&gl, &diagnostics);

        let program =
            ShaderProgram::compile_and_link(checked, "test", "void main() {}", "void main() {}")
                .unwrap();

        assert_eq!(gl.count("create_shader"), 2);
        assert_eq!(gl.count("delete_shader"), 2);
        assert_eq!(gl.count("detach_shader"), 2);
        assert_eq!(gl.live_objects(), 1, "only the program should remain");
        assert_eq!(program.name(), "test");

        program.destroy(checked);
        assert_eq!(gl.live_objects(), 0);
        assert_eq!(gl.invalid_deletes(), 0);
    }

    #[test]
    fn vertex_compile_failure_leaves_nothing_allocated() {
        let gl = RecordingGl::new();
        gl.fail_compile(glow::VERTEX_SHADER);
        let diagnostics = Diagnostics::new();
        let checked = CheckedGl::new(&gl, &diagnostics);

        let err = ShaderProgram::compile_and_link(checked, "test", "bad", "void main() {}")
            .unwrap_err();

        match err {
            ShaderError::CompileError { stage, log } => {
                assert_eq!(stage, "vertex");
                assert!(log.contains("1: #version 300 es"), "got: {log}");
                assert!(log.contains("undeclared identifier"), "got: {log}");
            }
            other => panic!("expected compile error, got {other:?}"),
        }
        assert_eq!(gl.count("create_program"), 0);
        assert_eq!(gl.live_objects(), 0);
    }

    #[test]
    fn fragment_compile_failure_releases_vertex_stage() {
        let gl = RecordingGl::new();
        gl.fail_compile(glow::FRAGMENT_SHADER);
        let diagnostics = Diagnostics::new();
        let checked = CheckedGl::new(&gl, &diagnostics);

        let err = ShaderProgram::compile_and_link(checked, "test", "void main() {}", "bad")
            .unwrap_err();

        assert!(matches!(err, ShaderError::CompileError { ref stage, .. } if stage == "fragment"));
        assert_eq!(gl.live_objects(), 0);
        assert_eq!(gl.invalid_deletes(), 0);
    }

    #[test]
    fn link_failure_deletes_program_and_stages() {
        let gl = RecordingGl::new();
        gl.fail_link();
        let diagnostics = Diagnostics::new();
        let checked = CheckedGl::new(&gl, &diagnostics);

        let err = ShaderProgram::compile_and_link(checked, "test", "void main() {}", "void main() {}")
            .unwrap_err();

        assert!(matches!(err, ShaderError::LinkError(ref log) if log.contains("vTexCoord")));
        assert_eq!(gl.live_objects(), 0);
    }

    #[test]
    fn use_and_unuse_toggle_active_program() {
        let gl = RecordingGl::new();
        let diagnostics = Diagnostics::new();
        let checked = CheckedGl::new(&gl, &diagnostics);
        let program =
            ShaderProgram::compile_and_link(checked, "test", "void main() {}", "void main() {}")
                .unwrap();

        program.use_program(checked);
        assert_eq!(gl.current_program(), Some(program.handle()));
        program.unuse(checked);
        assert_eq!(gl.current_program(), None);
    }

    #[test]
    fn shader_error_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<ShaderError>();
    }
}
