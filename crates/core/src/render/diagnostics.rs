//! Error polling around graphics API calls.
//!
//! Every call the render target issues goes through [`CheckedGl::call`],
//! which drains the driver's error queue afterwards and logs each code with
//! the Rust call site. GL errors never change control flow; they are counted
//! so callers can surface the accumulation. Incomplete framebuffers are
//! tallied alongside them.

use std::cell::Cell;
use std::fmt;
use std::panic::Location;

use tracing::warn;

use super::api::GraphicsApi;

/// Upper bound on codes drained by a single poll.
const MAX_ERRORS_PER_POLL: usize = 16;

/// GLES 2.0 status code absent from desktop GL headers.
const FRAMEBUFFER_INCOMPLETE_DIMENSIONS: u32 = 0x8CD9;

/// A GL error code observed after a call, with the call site that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsApiError {
    pub code: u32,
    pub location: &'static Location<'static>,
}

impl fmt::Display for GraphicsApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (0x{:04X}) at {}:{}",
            error_code_name(self.code),
            self.code,
            self.location.file(),
            self.location.line()
        )
    }
}

impl std::error::Error for GraphicsApiError {}

/// A `glCheckFramebufferStatus` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferStatus(pub u32);

impl FramebufferStatus {
    pub fn is_complete(self) -> bool {
        self.0 == glow::FRAMEBUFFER_COMPLETE
    }
}

impl fmt::Display for FramebufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", framebuffer_status_name(self.0), self.0)
    }
}

/// Human-readable name of a `glGetError` code.
pub fn error_code_name(code: u32) -> &'static str {
    match code {
        glow::NO_ERROR => "NO_ERROR",
        glow::INVALID_ENUM => "INVALID_ENUM",
        glow::INVALID_VALUE => "INVALID_VALUE",
        glow::INVALID_OPERATION => "INVALID_OPERATION",
        glow::STACK_OVERFLOW => "STACK_OVERFLOW",
        glow::STACK_UNDERFLOW => "STACK_UNDERFLOW",
        glow::OUT_OF_MEMORY => "OUT_OF_MEMORY",
        glow::INVALID_FRAMEBUFFER_OPERATION => "INVALID_FRAMEBUFFER_OPERATION",
        _ => "UNKNOWN",
    }
}

/// Human-readable name of a `glCheckFramebufferStatus` result.
pub fn framebuffer_status_name(status: u32) -> &'static str {
    match status {
        glow::FRAMEBUFFER_COMPLETE => "COMPLETE",
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => "INCOMPLETE_ATTACHMENT",
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => "INCOMPLETE_MISSING_ATTACHMENT",
        FRAMEBUFFER_INCOMPLETE_DIMENSIONS => "INCOMPLETE_DIMENSIONS",
        glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => "INCOMPLETE_MULTISAMPLE",
        glow::FRAMEBUFFER_UNSUPPORTED => "UNSUPPORTED",
        0 => "ERROR",
        _ => "UNKNOWN",
    }
}

/// Running tally of GL errors seen on one context.
#[derive(Debug, Default)]
pub struct Diagnostics {
    error_count: Cell<u64>,
    last_error: Cell<Option<GraphicsApiError>>,
    incomplete_framebuffers: Cell<u64>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains the error queue, logging each code against the caller's
    /// location. Returns how many codes were drained.
    #[track_caller]
    pub fn poll<A: GraphicsApi>(&self, gl: &A) -> usize {
        let location = Location::caller();
        let mut drained = 0;
        while drained < MAX_ERRORS_PER_POLL {
            let code = gl.get_error();
            if code == glow::NO_ERROR {
                break;
            }
            let error = GraphicsApiError { code, location };
            warn!(%error, "graphics API error");
            self.error_count.set(self.error_count.get() + 1);
            self.last_error.set(Some(error));
            drained += 1;
        }
        if drained == MAX_ERRORS_PER_POLL {
            warn!(
                file = location.file(),
                line = location.line(),
                "error queue did not drain, context may be lost"
            );
        }
        drained
    }

    /// Total number of GL errors observed so far.
    pub fn error_count(&self) -> u64 {
        self.error_count.get()
    }

    /// Most recently observed GL error.
    pub fn last_error(&self) -> Option<GraphicsApiError> {
        self.last_error.get()
    }

    pub fn note_incomplete_framebuffer(&self) {
        self.incomplete_framebuffers
            .set(self.incomplete_framebuffers.get() + 1);
    }

    /// How many framebuffer completeness checks have failed.
    pub fn incomplete_framebuffers(&self) -> u64 {
        self.incomplete_framebuffers.get()
    }
}

/// A borrowed API paired with the diagnostics that polls after each call.
pub struct CheckedGl<'a, A> {
    api: &'a A,
    diagnostics: &'a Diagnostics,
}

impl<A> Clone for CheckedGl<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for CheckedGl<'_, A> {}

impl<'a, A: GraphicsApi> CheckedGl<'a, A> {
    pub fn new(api: &'a A, diagnostics: &'a Diagnostics) -> Self {
        Self { api, diagnostics }
    }

    /// Runs one API call, then polls the error queue.
    #[track_caller]
    pub fn call<R>(&self, f: impl FnOnce(&A) -> R) -> R {
        let result = f(self.api);
        self.diagnostics.poll(self.api);
        result
    }

    /// The unchecked API, for calls whose errors are polled in bulk.
    pub fn api(&self) -> &'a A {
        self.api
    }

    pub fn diagnostics(&self) -> &'a Diagnostics {
        self.diagnostics
    }
}
