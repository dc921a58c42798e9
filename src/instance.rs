use std::sync::Arc;

use openxr as xr;

use crate::config::Config;
use crate::driver::{GlWindow, VideoDriver};
use crate::error::{XrError, XrResultExt};
use crate::session::Session;
use crate::view::ViewInfo;

/// A live connection to an OpenXR runtime: the instance handle plus the
/// one session bound to the host's GL context.
pub(crate) struct Instance {
    // Session first: it must be torn down before the instance handle.
    session: Session,
    handle: xr::Instance,
    events: xr::EventDataBuffer,
}

impl Instance {
    /// Load the runtime, negotiate extensions, create the instance, and
    /// bring up the session. Any failure tears the partial hierarchy
    /// down in reverse order and leaves nothing behind.
    pub(crate) fn connect(
        driver: &Arc<dyn VideoDriver>,
        window: &Arc<dyn GlWindow>,
        config: &Config,
    ) -> Result<Self, XrError> {
        log::info!("[XR] Initializing OpenXR");
        let entry = unsafe { xr::Entry::load() }?;

        let available = entry
            .enumerate_extensions()
            .or_fail("xrEnumerateInstanceExtensionProperties")?;
        log::debug!("[XR] Available extensions: {available:?}");
        if !available.khr_opengl_enable {
            log::error!("[XR] OpenXR runtime does not support OpenGL");
            return Err(XrError::OpenGlUnsupported);
        }
        let mut extensions = xr::ExtensionSet::default();
        extensions.khr_opengl_enable = true;

        let handle = entry
            .create_instance(
                &xr::ApplicationInfo {
                    application_name: &config.app_name,
                    application_version: config.app_version,
                    engine_name: "",
                    engine_version: 0,
                    api_version: xr::Version::new(1, 0, 0),
                },
                &extensions,
                &[],
            )
            .map_err(|result| {
                if result == xr::sys::Result::ERROR_RUNTIME_FAILURE {
                    log::error!(
                        "Failed to connect to OpenXR runtime!\n\
                         Ensure that your XR provider (e.g. SteamVR)\n\
                         is running and has OpenXR enabled."
                    );
                } else {
                    log::error!("[XR] xrCreateInstance error: {result}");
                }
                XrError::Call {
                    call: "xrCreateInstance",
                    result,
                }
            })?;

        let props = handle.properties().or_fail("xrGetInstanceProperties")?;
        log::info!("[XR] OpenXR Runtime: {}", props.runtime_name);
        log::info!("[XR] OpenXR Version: {}", props.runtime_version);

        let session = Session::create(&handle, driver.clone(), window.as_ref(), config)?;
        Ok(Self {
            session,
            handle,
            events: xr::EventDataBuffer::new(),
        })
    }

    /// Drain all pending runtime events without blocking. Reports failure
    /// on instance loss or a dropped event queue; the caller responds by
    /// rebuilding the whole connection.
    pub(crate) fn handle_events(&mut self) -> Result<(), XrError> {
        let Self {
            session,
            handle,
            events,
        } = self;
        let mut lost_events = false;
        while let Some(event) = handle.poll_event(events).or_fail("xrPollEvent")? {
            match event {
                xr::Event::EventsLost(e) => {
                    log::error!(
                        "[XR] OpenXR event queue overflowed, lost {} events",
                        e.lost_event_count()
                    );
                    lost_events = true;
                }
                xr::Event::InstanceLossPending(_) => {
                    log::error!("[XR] Disconnected (lost instance)");
                    return Err(XrError::InstanceLost);
                }
                xr::Event::SessionStateChanged(e) => session.handle_state_change(e.state()),
                _ => {}
            }
        }
        if lost_events {
            Err(XrError::EventsLost)
        } else {
            Ok(())
        }
    }

    pub(crate) fn recenter(&mut self) {
        self.session.recenter();
    }

    pub(crate) fn try_begin_frame(&mut self) -> Result<i64, XrError> {
        self.session.try_begin_frame()
    }

    pub(crate) fn next_view(&mut self) -> Result<Option<ViewInfo>, XrError> {
        self.session.next_view()
    }
}
