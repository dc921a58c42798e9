use openxr as xr;

/// Errors produced while talking to the OpenXR runtime or validating the
/// host's graphics setup. Any of these invalidates the current instance;
/// the connector schedules a reconnect attempt in response.
#[derive(Debug, thiserror::Error)]
pub enum XrError {
    #[error("cannot load OpenXR loader: {0}")]
    Load(#[from] xr::LoadError),
    #[error("{call} error: {result}")]
    Call {
        call: &'static str,
        result: xr::sys::Result,
    },
    #[error("OpenXR runtime does not support OpenGL")]
    OpenGlUnsupported,
    #[error("runtime does not support the stereo view configuration")]
    StereoUnsupported,
    #[error("no supported depth swapchain format")]
    NoDepthFormat,
    #[error("no supported color swapchain format")]
    NoColorFormat,
    #[error("GL profile mismatch (OpenGL vs. OpenGL ES)")]
    GlProfileMismatch,
    #[error("GL context version {found} outside supported range ({min}, {max})")]
    GlVersionUnsupported {
        found: xr::Version,
        min: xr::Version,
        max: xr::Version,
    },
    #[error("expected windowing driver {expected:?}, got {found:?}")]
    DriverMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("windowing driver {0:?} is not supported (EGL binding not implemented)")]
    UnsupportedPlatform(String),
    #[error("color and depth swapchains have different lengths")]
    SwapchainLengthMismatch,
    #[error("event queue overflowed, events were lost")]
    EventsLost,
    #[error("instance loss pending")]
    InstanceLost,
}

/// Maps a failed OpenXR call into [`XrError`], logging the failing
/// function and the runtime's name for the error code.
pub(crate) trait XrResultExt<T> {
    fn or_fail(self, call: &'static str) -> Result<T, XrError>;
}

impl<T> XrResultExt<T> for Result<T, xr::sys::Result> {
    fn or_fail(self, call: &'static str) -> Result<T, XrError> {
        self.map_err(|result| {
            log::error!("[XR] {call} error: {result}");
            XrError::Call { call, result }
        })
    }
}
