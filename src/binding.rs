//! Platform graphics binding for session creation.
//!
//! OpenXR and the host's windowing library do not know how to talk to
//! each other; the raw GL context has to be pulled out of the windowing
//! layer and passed through the session-create chain. The binding kind
//! must match the windowing driver exactly, so it is validated here
//! instead of trusting the handles.

use openxr as xr;

use crate::driver::{ContextHandles, GlVersion, GlWindow};
use crate::error::XrError;

#[derive(Debug, Clone, Copy)]
pub(crate) enum GraphicsBinding {
    #[cfg(windows)]
    Wgl {
        h_dc: *mut std::ffi::c_void,
        h_glrc: *mut std::ffi::c_void,
    },
    #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
    Glx {
        display: *mut std::ffi::c_void,
        drawable: u64,
        context: *mut std::ffi::c_void,
    },
}

impl GraphicsBinding {
    /// Select the binding for the host's windowing driver, rejecting
    /// handle/driver combinations that cannot work.
    pub(crate) fn from_window(window: &dyn GlWindow) -> Result<Self, XrError> {
        let driver = window.driver_name();
        match window.context_handles() {
            #[cfg(windows)]
            ContextHandles::Wgl { h_dc, h_glrc } => {
                if driver != "windows" {
                    return Err(XrError::DriverMismatch {
                        expected: "windows",
                        found: driver,
                    });
                }
                Ok(Self::Wgl { h_dc, h_glrc })
            }
            #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
            ContextHandles::Glx {
                display,
                drawable,
                context,
            } => {
                if driver != "x11" {
                    return Err(XrError::DriverMismatch {
                        expected: "x11",
                        found: driver,
                    });
                }
                Ok(Self::Glx {
                    display,
                    drawable,
                    context,
                })
            }
            ContextHandles::Egl { .. } => Err(XrError::UnsupportedPlatform(driver)),
        }
    }

    pub(crate) fn session_create_info(&self) -> xr::opengl::SessionCreateInfo {
        match *self {
            #[cfg(windows)]
            Self::Wgl { h_dc, h_glrc } => xr::opengl::SessionCreateInfo::Windows {
                h_dc: h_dc as _,
                h_glrc: h_glrc as _,
            },
            #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
            Self::Glx {
                display,
                drawable,
                context,
            } => xr::opengl::SessionCreateInfo::Xlib {
                x_display: display as _,
                // The runtime only dereferences the display and context;
                // visual and FBConfig stay unset like in every GLX host.
                visualid: 0,
                glx_fb_config: std::ptr::null_mut(),
                glx_drawable: drawable as _,
                glx_context: context as _,
            },
        }
    }
}

/// Check the host GL context against the version window the runtime
/// accepts. OpenXR requires this check to happen before session
/// creation.
pub(crate) fn gl_compat_check(
    version: GlVersion,
    min: xr::Version,
    max: xr::Version,
) -> Result<(), XrError> {
    if version.gles {
        return Err(XrError::GlProfileMismatch);
    }
    let found = xr::Version::new(version.major, version.minor, 0);
    if found < min || found > max {
        return Err(XrError::GlVersionUnsupported { found, min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gl(major: u16, minor: u16) -> GlVersion {
        GlVersion {
            major,
            minor,
            gles: false,
        }
    }

    #[test]
    fn version_window() {
        let min = xr::Version::new(3, 3, 0);
        let max = xr::Version::new(4, 6, 0);
        assert!(gl_compat_check(gl(4, 3), min, max).is_ok());
        assert!(gl_compat_check(gl(3, 3), min, max).is_ok());
        assert!(matches!(
            gl_compat_check(gl(3, 1), min, max),
            Err(XrError::GlVersionUnsupported { .. })
        ));
        assert!(matches!(
            gl_compat_check(gl(4, 7), min, max),
            Err(XrError::GlVersionUnsupported { .. })
        ));
    }

    #[test]
    fn gles_profile_rejected() {
        let v = GlVersion {
            major: 3,
            minor: 2,
            gles: true,
        };
        assert!(matches!(
            gl_compat_check(v, xr::Version::new(3, 0, 0), xr::Version::new(4, 6, 0)),
            Err(XrError::GlProfileMismatch)
        ));
    }

    #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
    mod unix {
        use super::*;
        use crate::driver::tests::FakeWindow;

        #[test]
        fn glx_requires_x11_driver() {
            let window = FakeWindow::glx("wayland");
            assert!(matches!(
                GraphicsBinding::from_window(&window),
                Err(XrError::DriverMismatch {
                    expected: "x11",
                    ..
                })
            ));
            let window = FakeWindow::glx("x11");
            assert!(GraphicsBinding::from_window(&window).is_ok());
        }

        #[test]
        fn egl_rejected_explicitly() {
            let window = FakeWindow::egl("wayland");
            assert!(matches!(
                GraphicsBinding::from_window(&window),
                Err(XrError::UnsupportedPlatform(d)) if d == "wayland"
            ));
        }
    }
}
