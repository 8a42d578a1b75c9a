//! Headless EGL display, 1x1 pbuffer surface and OpenGL ES 3 context.
//!
//! The render target draws into its own framebuffers, so the pbuffer only
//! exists to give the context something to be current against.

use khronos_egl as egl;
use tracing::{debug, warn};

use super::api::GraphicsContext;
use super::glow_api::GlowApi;
use crate::error::RenderError;

type EglInstance = egl::DynamicInstance<egl::EGL1_4>;

const OPENGL_ES3_BIT: egl::Int = 0x0040;

const CONFIG_ATTRIBUTES: [egl::Int; 13] = [
    egl::RED_SIZE,
    8,
    egl::GREEN_SIZE,
    8,
    egl::BLUE_SIZE,
    8,
    egl::ALPHA_SIZE,
    8,
    egl::SURFACE_TYPE,
    egl::PBUFFER_BIT,
    egl::RENDERABLE_TYPE,
    OPENGL_ES3_BIT,
    egl::NONE,
];

const PBUFFER_ATTRIBUTES: [egl::Int; 5] = [egl::WIDTH, 1, egl::HEIGHT, 1, egl::NONE];

const CONTEXT_ATTRIBUTES: [egl::Int; 3] = [egl::CONTEXT_CLIENT_VERSION, 3, egl::NONE];

fn context_error(step: &str, e: impl std::fmt::Display) -> RenderError {
    RenderError::Context(format!("{step}: {e}"))
}

/// An EGL display/surface/context triple with its loaded GL entry points.
///
/// Not `Send`: create it on the thread that will use it.
pub struct EglContext {
    egl: EglInstance,
    display: egl::Display,
    surface: egl::Surface,
    context: egl::Context,
    api: GlowApi,
}

impl EglContext {
    /// Opens the default display and creates an OpenGL ES 3 context with a
    /// 1x1 pbuffer surface.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Context` if libEGL cannot be loaded or any
    /// setup step fails. Objects created before the failure are released.
    pub fn new() -> Result<Self, RenderError> {
        // SAFETY: loading libEGL runs its initialisers; nothing else in the
        // process depends on a specific EGL being loaded.
        #[allow(unsafe_code)]
        let egl = unsafe { EglInstance::load_required() }
            .map_err(|e| context_error("load libEGL", e))?;

        // SAFETY: DEFAULT_DISPLAY is always a valid display id.
        #[allow(unsafe_code)]
        let display = unsafe { egl.get_display(egl::DEFAULT_DISPLAY) }
            .ok_or_else(|| RenderError::Context("no default EGL display".into()))?;

        let (major, minor) = egl
            .initialize(display)
            .map_err(|e| context_error("eglInitialize", e))?;
        debug!(major, minor, "EGL display initialized");

        match Self::create_on(&egl, display) {
            Ok((surface, context, api)) => Ok(Self {
                egl,
                display,
                surface,
                context,
                api,
            }),
            Err(e) => {
                if let Err(term) = egl.terminate(display) {
                    warn!("eglTerminate after failed setup: {term}");
                }
                Err(e)
            }
        }
    }

    fn create_on(
        egl: &EglInstance,
        display: egl::Display,
    ) -> Result<(egl::Surface, egl::Context, GlowApi), RenderError> {
        let config = egl
            .choose_first_config(display, &CONFIG_ATTRIBUTES)
            .map_err(|e| context_error("eglChooseConfig", e))?
            .ok_or_else(|| RenderError::Context("no RGBA8 pbuffer config for ES 3".into()))?;

        egl.bind_api(egl::OPENGL_ES_API)
            .map_err(|e| context_error("eglBindAPI", e))?;

        let surface = egl
            .create_pbuffer_surface(display, config, &PBUFFER_ATTRIBUTES)
            .map_err(|e| context_error("eglCreatePbufferSurface", e))?;

        let context = match egl.create_context(display, config, None, &CONTEXT_ATTRIBUTES) {
            Ok(context) => context,
            Err(e) => {
                Self::destroy_partial(egl, display, None, surface);
                return Err(context_error("eglCreateContext", e));
            }
        };

        if let Err(e) = egl.make_current(display, Some(surface), Some(surface), Some(context)) {
            Self::destroy_partial(egl, display, Some(context), surface);
            return Err(context_error("eglMakeCurrent", e));
        }

        // SAFETY: the context is current on this thread and every pointer
        // handed to glow comes from eglGetProcAddress for that context.
        #[allow(unsafe_code)]
        let gl = unsafe {
            glow::Context::from_loader_function(|name| {
                egl.get_proc_address(name)
                    .map_or(std::ptr::null(), |f| f as *const std::ffi::c_void)
            })
        };

        if let Err(e) = egl.make_current(display, None, None, None) {
            warn!("eglMakeCurrent(release) after load: {e}");
        }

        Ok((surface, context, GlowApi::new(gl)))
    }

    /// Releases objects created before a setup step failed. Failures are
    /// logged; the setup error is what the caller reports.
    fn destroy_partial(
        egl: &EglInstance,
        display: egl::Display,
        context: Option<egl::Context>,
        surface: egl::Surface,
    ) {
        if let Some(context) = context {
            if let Err(e) = egl.destroy_context(display, context) {
                warn!("eglDestroyContext after failed setup: {e}");
            }
        }
        if let Err(e) = egl.destroy_surface(display, surface) {
            warn!("eglDestroySurface after failed setup: {e}");
        }
    }
}

impl GraphicsContext for EglContext {
    type Api = GlowApi;

    fn make_current(&self) -> Result<(), RenderError> {
        self.egl
            .make_current(
                self.display,
                Some(self.surface),
                Some(self.surface),
                Some(self.context),
            )
            .map_err(|e| context_error("eglMakeCurrent", e))
    }

    fn release_current(&self) -> Result<(), RenderError> {
        self.egl
            .make_current(self.display, None, None, None)
            .map_err(|e| context_error("eglMakeCurrent(release)", e))
    }

    fn api(&self) -> &GlowApi {
        &self.api
    }
}

impl Drop for EglContext {
    fn drop(&mut self) {
        if let Err(e) = self.release_current() {
            warn!("{e}");
        }
        if let Err(e) = self.egl.destroy_context(self.display, self.context) {
            warn!("eglDestroyContext: {e}");
        }
        if let Err(e) = self.egl.destroy_surface(self.display, self.surface) {
            warn!("eglDestroySurface: {e}");
        }
        if let Err(e) = self.egl.terminate(self.display) {
            warn!("eglTerminate: {e}");
        }
        debug!("EGL context destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Creating a display needs a driver; these only pin the setup constants.

    #[test]
    fn attribute_lists_are_none_terminated() {
        assert_eq!(CONFIG_ATTRIBUTES.last(), Some(&egl::NONE));
        assert_eq!(PBUFFER_ATTRIBUTES.last(), Some(&egl::NONE));
        assert_eq!(CONTEXT_ATTRIBUTES.last(), Some(&egl::NONE));
    }

    #[test]
    fn context_requests_es3() {
        assert_eq!(CONTEXT_ATTRIBUTES[..2], [egl::CONTEXT_CLIENT_VERSION, 3]);
        let renderable = CONFIG_ATTRIBUTES
            .chunks_exact(2)
            .find(|pair| pair[0] == egl::RENDERABLE_TYPE)
            .map(|pair| pair[1]);
        assert_eq!(renderable, Some(OPENGL_ES3_BIT));
    }

    #[test]
    fn pbuffer_is_one_pixel() {
        assert_eq!(PBUFFER_ATTRIBUTES[..4], [egl::WIDTH, 1, egl::HEIGHT, 1]);
    }

    #[test]
    fn egl_context_implements_graphics_context() {
        fn assert_context<C: GraphicsContext>() {}
        assert_context::<EglContext>();
    }

    #[test]
    #[ignore = "needs an EGL driver (run with --ignored on a machine with Mesa)"]
    fn live_context_reports_es3() {
        use crate::render::api::ContextInfo;

        let context = EglContext::new().unwrap();
        context.make_current().unwrap();
        let info = ContextInfo::query(context.api());
        context.release_current().unwrap();

        assert!(info.major_version >= 3, "got {info:?}");
        assert!(info.max_texture_size >= 2048, "got {info:?}");
    }

    #[test]
    #[ignore = "needs an EGL driver (run with --ignored on a machine with Mesa)"]
    fn live_pipeline_mirrors_on_half_turn() {
        use crate::config::PipelineConfig;
        use crate::pipeline::RenderPipeline;
        use crate::pixel::PixelBuffer;
        use crate::render::orientation::{Orientation, Rotation};
        use crate::testing::gradient_pixels;

        let config = PipelineConfig::default().with_dimensions(8, 4);
        let pipeline = RenderPipeline::with_passthrough(config, EglContext::new).unwrap();
        let input = PixelBuffer::from_rgba(8, 4, gradient_pixels(8, 4)).unwrap();

        let out = pipeline
            .render(input.clone(), Orientation::new(Rotation::Deg180, false))
            .unwrap();
        pipeline.teardown().unwrap();

        let mut expected = input;
        expected.mirror_columns();
        assert_eq!(out, expected);
    }
}
