use std::sync::Arc;

use openxr as xr;

use crate::driver::{Texture, TextureFormat, VideoDriver};
use crate::error::{XrError, XrResultExt};

/// Swapchains should almost never have contention, so a wait longer than
/// this is treated as fatal by the caller.
const IMAGE_WAIT_TIMEOUT_NS: i64 = 100_000_000; // 100 ms

/// One ring of runtime-owned GL images, with the host-texture wrappers
/// needed to render into them.
///
/// Acquire and release are strictly paired: exactly one image may be
/// acquired at a time.
pub(crate) struct Swapchain {
    handle: xr::Swapchain<xr::OpenGL>,
    textures: Vec<Arc<dyn Texture>>,
    acquired: Option<u32>,
}

impl Swapchain {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create(
        session: &xr::Session<xr::OpenGL>,
        driver: &Arc<dyn VideoDriver>,
        label: &str,
        usage: xr::SwapchainUsageFlags,
        format: u32,
        sample_count: u32,
        width: u32,
        height: u32,
        host_format: TextureFormat,
    ) -> Result<Self, XrError> {
        let handle = session
            .create_swapchain(&xr::SwapchainCreateInfo {
                create_flags: xr::SwapchainCreateFlags::EMPTY,
                usage_flags: usage,
                format,
                sample_count,
                width,
                height,
                face_count: 1,
                array_size: 1,
                mip_count: 1,
            })
            .or_fail("xrCreateSwapchain")?;

        let images = handle
            .enumerate_images()
            .or_fail("xrEnumerateSwapchainImages")?;
        let textures = images
            .iter()
            .enumerate()
            .map(|(i, &image)| {
                driver.wrap_device_texture(
                    &format!("xr_{label}_{i}"),
                    image,
                    host_format,
                    width,
                    height,
                )
            })
            .collect();

        Ok(Self {
            handle,
            textures,
            acquired: None,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.textures.len()
    }

    pub(crate) fn inner(&self) -> &xr::Swapchain<xr::OpenGL> {
        &self.handle
    }

    /// Acquire the runtime's next image and wait for it to become ready
    /// for rendering. Must be called inside a begun frame.
    pub(crate) fn acquire_and_wait(&mut self) -> Result<u32, XrError> {
        debug_assert!(self.acquired.is_none(), "acquire without release");
        let index = self
            .handle
            .acquire_image()
            .or_fail("xrAcquireSwapchainImage")?;
        self.acquired = Some(index);
        self.handle
            .wait_image(xr::Duration::from_nanos(IMAGE_WAIT_TIMEOUT_NS))
            .or_fail("xrWaitSwapchainImage")?;
        Ok(index)
    }

    /// Host texture for the currently acquired image.
    pub(crate) fn acquired_texture(&self) -> &Arc<dyn Texture> {
        let index = self.acquired.expect("no image acquired");
        &self.textures[index as usize]
    }

    /// Return the acquired image to the runtime. All GPU work targeting
    /// the image must have been flushed (glFinish or a fence) before
    /// this, or the compositor may sample a half-drawn frame.
    pub(crate) fn release(&mut self) -> Result<(), XrError> {
        debug_assert!(self.acquired.is_some(), "release without acquire");
        self.handle
            .release_image()
            .or_fail("xrReleaseSwapchainImage")?;
        self.acquired = None;
        Ok(())
    }
}
