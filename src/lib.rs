//! OpenXR presentation bridge for OpenGL host renderers.
//!
//! Connects a host engine's GL context to an OpenXR runtime and drives
//! stereo HMD presentation:
//!
//! - capability negotiation and graphics-bound session setup,
//! - per-eye color/depth swapchains and the per-frame
//!   acquire/wait/release handshake,
//! - head pose projection into the host's left-handed coordinates,
//! - yaw-only recentering,
//! - transparent reconnection when the runtime goes away.
//!
//! The host supplies its video driver and windowing layer through the
//! [`VideoDriver`] and [`GlWindow`] traits, then drives frames:
//!
//! ```ignore
//! let mut xr = Connector::new(driver, window, Config::default());
//! loop {
//!     xr.handle_events();
//!     if xr.try_begin_frame().is_some() {
//!         while let Some(view) = xr.next_view() {
//!             // render the scene into view.target from view.position /
//!             // view.orientation, then flush GL before the next call
//!         }
//!     }
//! }
//! ```
//!
//! Everything runs on the render thread that owns the GL context; the
//! only blocking point is frame pacing inside `try_begin_frame`.

mod binding;
mod config;
mod connector;
mod driver;
mod error;
mod instance;
pub mod math;
mod session;
mod swapchain;
mod view;

pub use config::{Config, PlaySpace, MODE_ROOM_SCALE};
pub use connector::Connector;
pub use driver::{
    ContextHandles, GlVersion, GlWindow, RenderTarget, Texture, TextureFormat, VideoDriver,
};
pub use error::XrError;
pub use view::{ViewInfo, ViewKind};
