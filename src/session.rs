use std::sync::Arc;

use nalgebra::Vector3;
use openxr as xr;

use crate::binding::{gl_compat_check, GraphicsBinding};
use crate::config::{Config, PlaySpace};
use crate::driver::{GlWindow, RenderTarget, TextureFormat, VideoDriver};
use crate::error::{XrError, XrResultExt};
use crate::math;
use crate::swapchain::Swapchain;
use crate::view::{ViewInfo, ViewKind};

const GL_SRGB8_ALPHA8: u32 = 0x8C43;
const GL_DEPTH_COMPONENT32F: u32 = 0x8CAC;

/// Color and depth image rings for one view, plus the host render
/// targets bound to them.
struct ViewChain {
    color: Swapchain,
    depth: Swapchain,
    /// Lazily allocated, indexed by the color swapchain's image index.
    /// The color attachment of a target never changes once bound; the
    /// depth attachment is rebound every frame, because the runtime
    /// acquires color and depth images independently.
    targets: Vec<Option<Arc<dyn RenderTarget>>>,
}

/// A graphics-bound OpenXR session: spaces, swapchains, and the
/// per-frame handshake.
pub(crate) struct Session {
    // Field order doubles as destruction order: swapchains and spaces
    // must be destroyed before the session handle they belong to.
    chains: Vec<ViewChain>,
    view_space: xr::Space,
    play_space: xr::Space,
    waiter: xr::FrameWaiter,
    stream: xr::FrameStream<xr::OpenGL>,
    handle: xr::Session<xr::OpenGL>,
    driver: Arc<dyn VideoDriver>,

    view_config_type: xr::ViewConfigurationType,
    view_configs: Vec<xr::ViewConfigurationView>,
    play_space_type: xr::ReferenceSpaceType,
    play_space_offset: xr::Posef,
    yaw_offset: f32,
    z_near: f32,
    z_far: f32,
    depth_layer: bool,
    recenter_pending: bool,

    // Only valid while in_frame is true
    in_frame: bool,
    next_view_index: usize,
    should_render: bool,
    predicted_display_time: xr::Time,
    views: Vec<xr::View>,
}

impl Session {
    pub(crate) fn create(
        instance: &xr::Instance,
        driver: Arc<dyn VideoDriver>,
        window: &dyn GlWindow,
        config: &Config,
    ) -> Result<Self, XrError> {
        let system = instance
            .system(xr::FormFactor::HEAD_MOUNTED_DISPLAY)
            .or_fail("xrGetSystem")?;
        let props = instance
            .system_properties(system)
            .or_fail("xrGetSystemProperties")?;
        log::info!("[XR] HMD: {}", props.system_name);
        log::info!("[XR] Vendor id: {}", props.vendor_id);
        log::info!(
            "[XR] Graphics: max swapchain {} x {}; {} composition layers",
            props.graphics_properties.max_swapchain_image_width,
            props.graphics_properties.max_swapchain_image_height,
            props.graphics_properties.max_layer_count
        );
        let tracking = match (
            props.tracking_properties.orientation_tracking,
            props.tracking_properties.position_tracking,
        ) {
            (true, true) => "Orientation and Position",
            (true, false) => "Orientation only",
            (false, true) => "Position only",
            (false, false) => "None",
        };
        log::info!("[XR] Tracking: {tracking}");

        let view_config_type = xr::ViewConfigurationType::PRIMARY_STEREO;
        let config_types = instance
            .enumerate_view_configurations(system)
            .or_fail("xrEnumerateViewConfigurations")?;
        for &ty in &config_types {
            let prop = instance
                .view_configuration_properties(system, ty)
                .or_fail("xrGetViewConfigurationProperties")?;
            let label = match ty {
                xr::ViewConfigurationType::PRIMARY_MONO => "mono",
                xr::ViewConfigurationType::PRIMARY_STEREO => "stereo",
                _ => "other",
            };
            log::info!(
                "[XR] Supported view: {label} [type={:?}, fovMutable={}]",
                ty,
                prop.fov_mutable
            );
        }
        if !config_types.contains(&view_config_type) {
            log::error!("[XR] Runtime does not support stereo rendering");
            return Err(XrError::StereoUnsupported);
        }

        let view_configs = instance
            .enumerate_view_configuration_views(system, view_config_type)
            .or_fail("xrEnumerateViewConfigurationViews")?;
        log::info!("[XR] Using stereo view");
        for (i, conf) in view_configs.iter().enumerate() {
            log::info!(
                "[XR] View {i}: Recommended/Max Resolution {}x{}/{}x{}, Swapchain samples {}/{}",
                conf.recommended_image_rect_width,
                conf.recommended_image_rect_height,
                conf.max_image_rect_width,
                conf.max_image_rect_height,
                conf.recommended_swapchain_sample_count,
                conf.max_swapchain_sample_count
            );
        }

        // OpenXR requires checking graphics compatibility before
        // creating a session.
        let reqs = instance
            .graphics_requirements::<xr::OpenGL>(system)
            .or_fail("xrGetOpenGLGraphicsRequirementsKHR")?;
        log::info!(
            "[XR] Runtime supports OpenGL versions ({}, {})",
            reqs.min_api_version_supported,
            reqs.max_api_version_supported
        );
        let gl = window.gl_version();
        log::info!(
            "[XR] Host context is OpenGL{} {}.{}",
            if gl.gles { " ES" } else { "" },
            gl.major,
            gl.minor
        );
        gl_compat_check(
            gl,
            reqs.min_api_version_supported,
            reqs.max_api_version_supported,
        )?;

        let binding = GraphicsBinding::from_window(window)?;
        let (handle, waiter, stream) =
            unsafe { instance.create_session::<xr::OpenGL>(system, &binding.session_create_info()) }
                .or_fail("xrCreateSession")?;

        let play_space_type = match config.play_space {
            PlaySpace::Seated => xr::ReferenceSpaceType::LOCAL,
            PlaySpace::RoomScale => xr::ReferenceSpaceType::STAGE,
        };
        let play_space_offset = xr::Posef::IDENTITY;
        let (play_space, view_space) = create_spaces(&handle, play_space_type, play_space_offset)?;

        handle.begin(view_config_type).or_fail("xrBeginSession")?;

        let supported = handle
            .enumerate_swapchain_formats()
            .or_fail("xrEnumerateSwapchainFormats")?;
        let (color_format, depth_format) = select_formats(&supported)?;

        let mut chains = Vec::with_capacity(view_configs.len());
        for (i, conf) in view_configs.iter().enumerate() {
            let color = Swapchain::create(
                &handle,
                &driver,
                &format!("color{i}"),
                xr::SwapchainUsageFlags::SAMPLED | xr::SwapchainUsageFlags::COLOR_ATTACHMENT,
                color_format,
                conf.recommended_swapchain_sample_count,
                conf.recommended_image_rect_width,
                conf.recommended_image_rect_height,
                TextureFormat::Argb8,
            )?;
            let depth = Swapchain::create(
                &handle,
                &driver,
                &format!("depth{i}"),
                xr::SwapchainUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                depth_format,
                conf.recommended_swapchain_sample_count,
                conf.recommended_image_rect_width,
                conf.recommended_image_rect_height,
                TextureFormat::DepthF32,
            )?;
            if color.len() != depth.len() {
                log::error!("[XR] Inconsistent swapchain lengths");
                return Err(XrError::SwapchainLengthMismatch);
            }
            let targets = vec![None; color.len()];
            chains.push(ViewChain {
                color,
                depth,
                targets,
            });
        }

        // Composition layers are rebuilt from per-view state every frame,
        // so nothing is pre-built here.

        Ok(Self {
            chains,
            view_space,
            play_space,
            waiter,
            stream,
            handle,
            driver,
            view_config_type,
            view_configs,
            play_space_type,
            play_space_offset,
            yaw_offset: 0.0,
            z_near: config.z_near,
            z_far: config.z_far,
            depth_layer: config.depth_layer,
            recenter_pending: false,
            in_frame: false,
            next_view_index: 0,
            should_render: false,
            predicted_display_time: xr::Time::from_nanos(0),
            views: Vec::new(),
        })
    }

    /// Request a yaw recenter. The re-derivation happens at the start of
    /// the next renderable frame, when a predicted display time exists to
    /// locate the headset at.
    pub(crate) fn recenter(&mut self) {
        self.recenter_pending = true;
    }

    fn recenter_play_space(&mut self, time: xr::Time) -> Result<(), XrError> {
        let location = self
            .view_space
            .locate(&self.play_space, time)
            .or_fail("xrLocateSpace")?;
        let flags = location.location_flags;
        if !flags.contains(xr::SpaceLocationFlags::POSITION_VALID)
            || !flags.contains(xr::SpaceLocationFlags::ORIENTATION_VALID)
        {
            // Quietly do nothing on incomplete tracking data
            return Ok(());
        }

        // Only yaw matters: the runtime keeps the XZ plane parallel with
        // the floor, and the seated origin must not move.
        let yaw = math::yaw_of(&location.pose.orientation);
        self.yaw_offset = math::wrap_yaw(self.yaw_offset + yaw);
        self.play_space_offset = math::yaw_pose(self.yaw_offset);
        let (play_space, view_space) =
            create_spaces(&self.handle, self.play_space_type, self.play_space_offset)?;
        self.play_space = play_space;
        self.view_space = view_space;
        Ok(())
    }

    /// Wait for frame pacing and begin the frame. Blocks inside
    /// `xrWaitFrame`; this is the render loop's VSync.
    pub(crate) fn try_begin_frame(&mut self) -> Result<i64, XrError> {
        debug_assert!(!self.in_frame, "frame already begun");

        let frame_state = self.waiter.wait().or_fail("xrWaitFrame")?;
        self.stream.begin().or_fail("xrBeginFrame")?;
        self.in_frame = true;
        self.next_view_index = 0;
        self.should_render = frame_state.should_render;
        self.predicted_display_time = frame_state.predicted_display_time;

        if self.recenter_pending && self.should_render {
            self.recenter_pending = false;
            self.recenter_play_space(frame_state.predicted_display_time)?;
        }

        let (flags, views) = self
            .handle
            .locate_views(
                self.view_config_type,
                frame_state.predicted_display_time,
                &self.play_space,
            )
            .or_fail("xrLocateViews")?;
        if !flags.contains(xr::ViewStateFlags::POSITION_VALID)
            || !flags.contains(xr::ViewStateFlags::ORIENTATION_VALID)
        {
            self.should_render = false;
        }
        self.views = views;

        // Computing the real delta needs a wall-clock mapping for XrTime
        // (XR_KHR_convert_timespec_time); report zero until that exists.
        Ok(0)
    }

    /// Hand out the next view's render target and transform, or end the
    /// frame and return `None` once every view has been drawn (or none
    /// will be).
    pub(crate) fn next_view(&mut self) -> Result<Option<ViewInfo>, XrError> {
        debug_assert!(self.in_frame, "next_view outside a frame");

        if self.should_render && self.next_view_index < self.chains.len() {
            let index = self.next_view_index;
            self.next_view_index += 1;

            let conf = &self.view_configs[index];
            let width = conf.recommended_image_rect_width;
            let height = conf.recommended_image_rect_height;

            let chain = &mut self.chains[index];
            let slot = chain.color.acquire_and_wait()? as usize;
            chain.depth.acquire_and_wait()?;

            let driver = &self.driver;
            let target = chain.targets[slot]
                .get_or_insert_with(|| {
                    log::info!("[XR] Adding render target");
                    driver.add_render_target()
                })
                .clone();
            target.set_textures(chain.color.acquired_texture(), chain.depth.acquired_texture());

            let view = &self.views[index];
            let base = self
                .views
                .iter()
                .fold(Vector3::zeros(), |acc, v| {
                    acc + math::position_to_host(&v.pose.position)
                })
                / self.views.len() as f32;

            return Ok(Some(ViewInfo {
                kind: ViewKind::from_view_index(index),
                target,
                width,
                height,
                position: math::position_to_host(&view.pose.position),
                orientation: math::orientation_to_host(&view.pose.orientation),
                position_base: base,
                angle_left: view.fov.angle_left,
                angle_right: view.fov.angle_right,
                angle_up: view.fov.angle_up,
                angle_down: view.fov.angle_down,
                z_near: self.z_near,
                z_far: self.z_far,
            }));
        }

        if self.should_render {
            // About to end the frame: hand every image back, in view
            // order. The host has flushed its GPU work by now.
            for chain in &mut self.chains {
                chain.color.release()?;
                chain.depth.release()?;
            }
        }
        self.end_frame()?;
        Ok(None)
    }

    /// Submit the frame. Always called, even for frames the compositor
    /// will not render; those end with an empty layer list.
    fn end_frame(&mut self) -> Result<(), XrError> {
        debug_assert!(self.in_frame, "end_frame outside a frame");

        if !self.should_render {
            self.stream
                .end(
                    self.predicted_display_time,
                    xr::EnvironmentBlendMode::OPAQUE,
                    &[],
                )
                .or_fail("xrEndFrame")?;
        } else if self.depth_layer {
            self.end_frame_with_depth()?;
        } else {
            let Self {
                stream,
                chains,
                play_space,
                views,
                view_configs,
                predicted_display_time,
                ..
            } = self;
            let projection_views: Vec<_> = views
                .iter()
                .zip(chains.iter())
                .zip(view_configs.iter())
                .map(|((view, chain), conf)| {
                    xr::CompositionLayerProjectionView::new()
                        .pose(view.pose)
                        .fov(view.fov)
                        .sub_image(
                            xr::SwapchainSubImage::new()
                                .swapchain(chain.color.inner())
                                .image_array_index(0)
                                .image_rect(image_rect(conf)),
                        )
                })
                .collect();
            let layer = xr::CompositionLayerProjection::new()
                .space(play_space)
                .views(&projection_views);
            stream
                .end(
                    *predicted_display_time,
                    xr::EnvironmentBlendMode::OPAQUE,
                    &[&layer],
                )
                .or_fail("xrEndFrame")?;
        }

        self.in_frame = false;
        self.next_view_index = 0;
        Ok(())
    }

    /// Frame submission with per-view depth info chained into the
    /// projection layer. The safe layer builders have no `next`-chain
    /// hook, so this goes through the raw entry point.
    fn end_frame_with_depth(&mut self) -> Result<(), XrError> {
        use openxr::sys;

        let depth_infos: Vec<sys::CompositionLayerDepthInfoKHR> = self
            .chains
            .iter()
            .zip(self.view_configs.iter())
            .map(|(chain, conf)| sys::CompositionLayerDepthInfoKHR {
                ty: sys::CompositionLayerDepthInfoKHR::TYPE,
                next: std::ptr::null(),
                sub_image: sys::SwapchainSubImage {
                    swapchain: chain.depth.inner().as_raw(),
                    image_rect: image_rect(conf),
                    image_array_index: 0,
                },
                min_depth: 0.0,
                max_depth: 1.0,
                near_z: self.z_near,
                far_z: self.z_far,
            })
            .collect();

        let projection_views: Vec<sys::CompositionLayerProjectionView> = self
            .views
            .iter()
            .zip(self.chains.iter())
            .zip(self.view_configs.iter())
            .zip(depth_infos.iter())
            .map(
                |(((view, chain), conf), depth)| sys::CompositionLayerProjectionView {
                    ty: sys::CompositionLayerProjectionView::TYPE,
                    next: depth as *const _ as *const std::ffi::c_void,
                    pose: view.pose,
                    fov: view.fov,
                    sub_image: sys::SwapchainSubImage {
                        swapchain: chain.color.inner().as_raw(),
                        image_rect: image_rect(conf),
                        image_array_index: 0,
                    },
                },
            )
            .collect();

        let layer = sys::CompositionLayerProjection {
            ty: sys::CompositionLayerProjection::TYPE,
            next: std::ptr::null(),
            layer_flags: sys::CompositionLayerFlags::EMPTY,
            space: self.play_space.as_raw(),
            view_count: projection_views.len() as u32,
            views: projection_views.as_ptr(),
        };
        let layers = [&layer as *const _ as *const sys::CompositionLayerBaseHeader];
        let end_info = sys::FrameEndInfo {
            ty: sys::FrameEndInfo::TYPE,
            next: std::ptr::null(),
            display_time: self.predicted_display_time,
            environment_blend_mode: xr::EnvironmentBlendMode::OPAQUE,
            layer_count: layers.len() as u32,
            layers: layers.as_ptr(),
        };
        let result =
            unsafe { (self.handle.instance().fp().end_frame)(self.handle.as_raw(), &end_info) };
        if result.into_raw() < 0 {
            log::error!("[XR] xrEndFrame error: {result}");
            return Err(XrError::Call {
                call: "xrEndFrame",
                result,
            });
        }
        Ok(())
    }

    pub(crate) fn handle_state_change(&mut self, state: xr::SessionState) {
        log::info!("[XR] Session state changed to `{}`", state_label(state));
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Hand render targets back to the driver before the swapchain
        // textures they reference go away.
        for chain in &mut self.chains {
            for target in chain.targets.drain(..).flatten() {
                self.driver.remove_render_target(&target);
            }
        }
    }
}

fn create_spaces(
    session: &xr::Session<xr::OpenGL>,
    play_space_type: xr::ReferenceSpaceType,
    offset: xr::Posef,
) -> Result<(xr::Space, xr::Space), XrError> {
    let play_space = session
        .create_reference_space(play_space_type, offset)
        .or_fail("xrCreateReferenceSpace")?;
    let view_space = session
        .create_reference_space(xr::ReferenceSpaceType::VIEW, xr::Posef::IDENTITY)
        .or_fail("xrCreateReferenceSpace")?;
    Ok((play_space, view_space))
}

fn image_rect(conf: &xr::ViewConfigurationView) -> xr::Rect2Di {
    xr::Rect2Di {
        offset: xr::Offset2Di { x: 0, y: 0 },
        extent: xr::Extent2Di {
            width: conf.recommended_image_rect_width as i32,
            height: conf.recommended_image_rect_height as i32,
        },
    }
}

/// Pick the color and depth swapchain formats, preferring 8-bit sRGBA
/// and 32-bit float depth. A missing depth format is fatal; a missing
/// preferred color format falls back to the runtime's first choice.
fn select_formats(supported: &[u32]) -> Result<(u32, u32), XrError> {
    let color = if supported.contains(&GL_SRGB8_ALPHA8) {
        GL_SRGB8_ALPHA8
    } else {
        log::warn!("[XR] Using non-preferred color format");
        *supported.first().ok_or(XrError::NoColorFormat)?
    };
    let depth = supported
        .iter()
        .copied()
        .find(|&f| f == GL_DEPTH_COMPONENT32F)
        .ok_or_else(|| {
            log::error!("[XR] Couldn't find valid depth buffer format");
            XrError::NoDepthFormat
        })?;
    log::info!(
        "[XR] ColorFormat {color:#x} ({})",
        if color == GL_SRGB8_ALPHA8 {
            "GL_SRGB8_ALPHA8"
        } else {
            "unknown"
        }
    );
    log::info!("[XR] DepthFormat {depth:#x} (GL_DEPTH_COMPONENT32F)");
    Ok((color, depth))
}

fn state_label(state: xr::SessionState) -> &'static str {
    match state {
        xr::SessionState::IDLE => "idle",
        xr::SessionState::READY => "ready",
        xr::SessionState::SYNCHRONIZED => "synchronized",
        xr::SessionState::VISIBLE => "visible",
        xr::SessionState::FOCUSED => "focused",
        xr::SessionState::STOPPING => "stopping",
        xr::SessionState::LOSS_PENDING => "loss_pending",
        xr::SessionState::EXITING => "exiting",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_prefer_srgba_and_float_depth() {
        let supported = [0x8058, GL_SRGB8_ALPHA8, 0x81A6, GL_DEPTH_COMPONENT32F];
        assert_eq!(
            select_formats(&supported).unwrap(),
            (GL_SRGB8_ALPHA8, GL_DEPTH_COMPONENT32F)
        );
    }

    #[test]
    fn color_falls_back_to_first_supported() {
        let supported = [0x8058, GL_DEPTH_COMPONENT32F];
        assert_eq!(
            select_formats(&supported).unwrap(),
            (0x8058, GL_DEPTH_COMPONENT32F)
        );
    }

    #[test]
    fn missing_depth_format_is_fatal() {
        let supported = [GL_SRGB8_ALPHA8, 0x8058];
        assert!(matches!(
            select_formats(&supported),
            Err(XrError::NoDepthFormat)
        ));
    }

    #[test]
    fn state_labels() {
        assert_eq!(state_label(xr::SessionState::READY), "ready");
        assert_eq!(state_label(xr::SessionState::LOSS_PENDING), "loss_pending");
    }
}
