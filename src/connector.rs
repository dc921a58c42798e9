use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::driver::{GlWindow, VideoDriver};
use crate::instance::Instance;
use crate::view::ViewInfo;

/// Delay between reconnection attempts. Constant, no backoff.
const RETRY_INTERVAL: Duration = Duration::from_secs(10);

enum Link {
    Up(Instance),
    Down { retry_at: Instant },
}

/// The host-facing entry point: owns the runtime connection and the
/// reconnect policy, and exposes the per-frame API.
///
/// All methods must be called from the render thread that owns the GL
/// context. While the runtime is unavailable, the per-frame methods
/// return `None` and [`Connector::handle_events`] re-attempts the
/// connection once the retry deadline passes.
pub struct Connector {
    driver: Arc<dyn VideoDriver>,
    window: Arc<dyn GlWindow>,
    config: Config,
    link: Link,
}

impl Connector {
    /// Connect to the OpenXR runtime. A failed first connection is not
    /// fatal: the connector starts out retrying and the host simply sees
    /// `try_begin_frame` return `None` until a later attempt succeeds.
    pub fn new(driver: Arc<dyn VideoDriver>, window: Arc<dyn GlWindow>, config: Config) -> Self {
        let link = match Instance::connect(&driver, &window, &config) {
            Ok(instance) => Link::Up(instance),
            Err(err) => {
                log::error!("[XR] Connection failed: {err}");
                Link::Down {
                    retry_at: Instant::now() + RETRY_INTERVAL,
                }
            }
        };
        Self {
            driver,
            window,
            config,
            link,
        }
    }

    /// Pump runtime events and drive reconnection. Call at least once
    /// per host event-processing pass, never inside a frame.
    pub fn handle_events(&mut self) {
        let reconnect = match &mut self.link {
            Link::Up(instance) => match instance.handle_events() {
                Ok(()) => return,
                Err(err) => {
                    log::error!("[XR] Event pump failed: {err}");
                    false
                }
            },
            Link::Down { retry_at } => {
                if Instant::now() < *retry_at {
                    return;
                }
                true
            }
        };

        if reconnect {
            log::info!("[XR] Retrying OpenXR connection");
            match Instance::connect(&self.driver, &self.window, &self.config) {
                Ok(instance) => self.link = Link::Up(instance),
                Err(err) => {
                    log::error!("[XR] Reconnection failed: {err}");
                    self.link = Link::Down {
                        retry_at: Instant::now() + RETRY_INTERVAL,
                    };
                }
            }
        } else {
            self.invalidate();
        }
    }

    /// Request a yaw recenter; takes effect at the start of the next
    /// renderable frame. Ignored while disconnected.
    pub fn recenter(&mut self) {
        if let Link::Up(instance) = &mut self.link {
            instance.recenter();
        }
    }

    /// Block for the runtime's frame pacing and begin a frame. Returns
    /// the predicted display-time delta in nanoseconds, or `None` while
    /// disconnected or when the frame could not be begun.
    pub fn try_begin_frame(&mut self) -> Option<i64> {
        let result = match &mut self.link {
            Link::Up(instance) => instance.try_begin_frame(),
            Link::Down { .. } => return None,
        };
        match result {
            Ok(delta) => Some(delta),
            Err(_) => {
                self.invalidate();
                None
            }
        }
    }

    /// Produce the next eye's render data. Returns `None` after the last
    /// eye (the frame has then been submitted), when the frame is not
    /// being rendered, or while disconnected.
    pub fn next_view(&mut self) -> Option<ViewInfo> {
        let result = match &mut self.link {
            Link::Up(instance) => instance.next_view(),
            Link::Down { .. } => return None,
        };
        match result {
            Ok(view) => view,
            Err(_) => {
                self.invalidate();
                None
            }
        }
    }

    fn invalidate(&mut self) {
        log::warn!(
            "[XR] Dropping OpenXR instance, retrying in {}s",
            RETRY_INTERVAL.as_secs()
        );
        self.link = Link::Down {
            retry_at: Instant::now() + RETRY_INTERVAL,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::tests::{FakeWindow, NullDriver};

    fn down_connector(retry_at: Instant) -> Connector {
        Connector {
            driver: Arc::new(NullDriver),
            window: Arc::new(FakeWindow::glx("x11")),
            config: Config::default(),
            link: Link::Down { retry_at },
        }
    }

    #[test]
    fn per_frame_calls_return_none_while_down() {
        let mut connector = down_connector(Instant::now() + Duration::from_secs(3600));
        assert!(connector.try_begin_frame().is_none());
        assert!(connector.next_view().is_none());
        connector.recenter();
        assert!(connector.try_begin_frame().is_none());
    }

    #[test]
    fn no_reconnect_attempt_before_deadline() {
        let retry_at = Instant::now() + Duration::from_secs(3600);
        let mut connector = down_connector(retry_at);
        connector.handle_events();
        match connector.link {
            Link::Down { retry_at: at } => assert_eq!(at, retry_at),
            Link::Up(_) => panic!("connected without a runtime"),
        }
    }
}
