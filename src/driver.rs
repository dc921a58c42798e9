//! Interfaces the host engine must provide.
//!
//! The bridge never owns a GL context or a texture pool of its own; it
//! wraps runtime-provided GPU images into host textures and binds them to
//! host render targets, all through these traits.

use std::ffi::c_void;
use std::sync::Arc;

/// Host color format for a wrapped swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// 8-bit-per-channel color, the host's standard BGRA-equivalent.
    Argb8,
    /// 32-bit float linear depth.
    DepthF32,
}

/// A host texture wrapping a runtime-provided GL image.
pub trait Texture {
    /// The GL texture name this wraps.
    fn gl_name(&self) -> u32;
}

/// A host render target (framebuffer + attachments).
///
/// The color attachment stays fixed for the lifetime of the target; the
/// depth attachment may be rebound every frame, because the runtime
/// acquires color and depth images independently.
pub trait RenderTarget {
    fn set_textures(&self, color: &Arc<dyn Texture>, depth: &Arc<dyn Texture>);
}

/// The host video driver. Reference-counted on the host side; the bridge
/// holds shared handles at every level of its hierarchy and releases them
/// child-first during teardown.
pub trait VideoDriver {
    fn add_render_target(&self) -> Arc<dyn RenderTarget>;
    fn remove_render_target(&self, target: &Arc<dyn RenderTarget>);
    /// Wrap a runtime-owned GL texture into a host texture object. The
    /// host must not take ownership of the GL name.
    fn wrap_device_texture(
        &self,
        name: &str,
        gl_texture: u32,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> Arc<dyn Texture>;
}

/// GL version and profile the host context was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlVersion {
    pub major: u16,
    pub minor: u16,
    /// True for an OpenGL ES profile.
    pub gles: bool,
}

/// Raw context handles pulled from the host's windowing layer. These must
/// refer to the context that is current on the render thread.
#[derive(Debug, Clone, Copy)]
pub enum ContextHandles {
    #[cfg(windows)]
    Wgl {
        h_dc: *mut c_void,
        h_glrc: *mut c_void,
    },
    #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
    Glx {
        display: *mut c_void,
        drawable: u64,
        context: *mut c_void,
    },
    /// EGL contexts (GLES, Wayland) are recognized so they can be
    /// rejected with a clear error rather than a runtime crash.
    Egl {
        display: *mut c_void,
        context: *mut c_void,
    },
}

/// The host's windowing/GL-context provider.
pub trait GlWindow {
    /// Symbolic windowing driver name, e.g. "windows", "x11", "wayland".
    fn driver_name(&self) -> String;
    fn gl_version(&self) -> GlVersion;
    fn context_handles(&self) -> ContextHandles;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct FakeWindow {
        driver: &'static str,
        egl: bool,
    }

    impl FakeWindow {
        /// Native GL context handles (GLX on unix, WGL on windows).
        pub(crate) fn glx(driver: &'static str) -> Self {
            Self { driver, egl: false }
        }

        pub(crate) fn egl(driver: &'static str) -> Self {
            Self { driver, egl: true }
        }
    }

    impl GlWindow for FakeWindow {
        fn driver_name(&self) -> String {
            self.driver.to_owned()
        }

        fn gl_version(&self) -> GlVersion {
            GlVersion {
                major: 4,
                minor: 6,
                gles: self.egl,
            }
        }

        fn context_handles(&self) -> ContextHandles {
            if self.egl {
                return ContextHandles::Egl {
                    display: std::ptr::null_mut(),
                    context: std::ptr::null_mut(),
                };
            }
            #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
            {
                ContextHandles::Glx {
                    display: std::ptr::null_mut(),
                    drawable: 0,
                    context: std::ptr::null_mut(),
                }
            }
            #[cfg(windows)]
            {
                ContextHandles::Wgl {
                    h_dc: std::ptr::null_mut(),
                    h_glrc: std::ptr::null_mut(),
                }
            }
            #[cfg(not(any(
                windows,
                all(unix, not(target_os = "macos"), not(target_os = "android"))
            )))]
            {
                panic!("no native GL binding on this platform")
            }
        }
    }

    pub(crate) struct NullTexture(u32);

    impl Texture for NullTexture {
        fn gl_name(&self) -> u32 {
            self.0
        }
    }

    pub(crate) struct NullTarget;

    impl RenderTarget for NullTarget {
        fn set_textures(&self, _color: &Arc<dyn Texture>, _depth: &Arc<dyn Texture>) {}
    }

    pub(crate) struct NullDriver;

    impl VideoDriver for NullDriver {
        fn add_render_target(&self) -> Arc<dyn RenderTarget> {
            Arc::new(NullTarget)
        }

        fn remove_render_target(&self, _target: &Arc<dyn RenderTarget>) {}

        fn wrap_device_texture(
            &self,
            _name: &str,
            gl_texture: u32,
            _format: TextureFormat,
            _width: u32,
            _height: u32,
        ) -> Arc<dyn Texture> {
            Arc::new(NullTexture(gl_texture))
        }
    }
}
