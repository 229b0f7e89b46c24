use std::sync::Arc;

use ash::vk;

use super::{
    VulkanBackend,
    device::{DeviceShared, VkQueue},
    instance::InstanceShared,
    vk_err,
};
use crate::{
    backend::{PresentMode, RawSwapchain, SwapchainDesc},
    error::BackendError,
    surface::SurfaceHandle,
};

///Formats in order of preference. Falls back to the first reported format.
const FORMAT_PREFERENCE: [vk::Format; 2] = [vk::Format::R8G8B8A8_UNORM, vk::Format::B8G8R8A8_UNORM];

///Swapchain on a window surface.
///
/// The next image is acquired right after each present, waiting on a CPU fence, so the current back buffer index
/// always refers to an image that can be written.
pub struct VkSwapchain {
    device: Arc<DeviceShared>,
    instance: Arc<InstanceShared>,
    surface: vk::SurfaceKHR,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    ///Signaled right before presenting image `i`. Waited on by the presentation engine.
    present_semaphores: Vec<vk::Semaphore>,
    acquire_fence: vk::Fence,
    current: u32,

    requested_count: u32,
    vsync: bool,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl VkSwapchain {
    pub(crate) fn new(
        instance: Arc<InstanceShared>,
        device: Arc<DeviceShared>,
        handle: &SurfaceHandle,
        desc: &SwapchainDesc,
    ) -> Result<Self, BackendError> {
        let surface = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.instance,
                handle.display,
                handle.window,
                None,
            )
            .map_err(vk_err)?
        };

        let acquire_fence = match unsafe {
            device
                .device
                .create_fence(&vk::FenceCreateInfo::default(), None)
        } {
            Ok(fence) => fence,
            Err(e) => {
                unsafe { instance.surface_loader.destroy_surface(surface, None) };
                return Err(vk_err(e));
            }
        };

        //From here on Drop cleans up.
        let mut swapchain = VkSwapchain {
            device,
            instance,
            surface,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            present_semaphores: Vec::new(),
            acquire_fence,
            current: 0,
            requested_count: desc.buffer_count,
            vsync: desc.vsync,
            format: vk::SurfaceFormatKHR::default(),
            extent: vk::Extent2D::default(),
            present_mode: vk::PresentModeKHR::FIFO,
        };

        swapchain.recreate(desc.width, desc.height)?;
        Ok(swapchain)
    }

    pub fn raw(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    ///Image the next frame renders into.
    pub fn current_image(&self) -> vk::Image {
        self.images[self.current as usize]
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    fn choose_present_mode(vsync: bool, available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
        if vsync {
            return vk::PresentModeKHR::FIFO;
        }
        [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX]
            .into_iter()
            .find(|mode| available.contains(mode))
            .unwrap_or(vk::PresentModeKHR::FIFO)
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        let loader = &self.instance.surface_loader;
        let physical_device = self.device.physical_device;

        let supported = unsafe {
            loader.get_physical_device_surface_support(
                physical_device,
                self.device.queue_family,
                self.surface,
            )?
        };
        if !supported {
            return Err(BackendError::Unsupported(
                "graphics queue can't present to this surface".to_owned(),
            ));
        }

        let capabilities =
            unsafe { loader.get_physical_device_surface_capabilities(physical_device, self.surface)? };
        let formats =
            unsafe { loader.get_physical_device_surface_formats(physical_device, self.surface)? };
        let present_modes = unsafe {
            loader.get_physical_device_surface_present_modes(physical_device, self.surface)?
        };

        let format = FORMAT_PREFERENCE
            .iter()
            .find_map(|preferred| formats.iter().find(|f| f.format == *preferred))
            .or_else(|| formats.first())
            .copied()
            .ok_or_else(|| BackendError::Unsupported("surface reports no formats".to_owned()))?;
        let present_mode = Self::choose_present_mode(self.vsync, &present_modes);

        let mut image_count = self.requested_count.max(capabilities.min_image_count);
        if capabilities.max_image_count > 0 {
            image_count = image_count.min(capabilities.max_image_count);
        }

        let extent = if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            vk::Extent2D {
                width: width.clamp(
                    capabilities.min_image_extent.width,
                    capabilities.max_image_extent.width,
                ),
                height: height.clamp(
                    capabilities.min_image_extent.height,
                    capabilities.max_image_extent.height,
                ),
            }
        };

        let composite_alpha = if capabilities
            .supported_composite_alpha
            .contains(vk::CompositeAlphaFlagsKHR::OPAQUE)
        {
            vk::CompositeAlphaFlagsKHR::OPAQUE
        } else {
            vk::CompositeAlphaFlagsKHR::INHERIT
        };

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(composite_alpha)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain_loader = &self.device.swapchain_loader;
        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(vk_err)?
        };
        unsafe { swapchain_loader.destroy_swapchain(old_swapchain, None) };
        self.swapchain = swapchain;

        self.images = unsafe { swapchain_loader.get_swapchain_images(swapchain)? };

        for semaphore in self.present_semaphores.drain(..) {
            unsafe { self.device.device.destroy_semaphore(semaphore, None) };
        }
        for _ in 0..self.images.len() {
            let semaphore = unsafe {
                self.device
                    .device
                    .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
            };
            self.present_semaphores.push(semaphore);
        }

        self.format = format;
        self.extent = extent;
        self.present_mode = present_mode;

        #[cfg(feature = "logging")]
        log::info!(
            "Created swapchain: {} images, {:?}, {:?}, {}x{}",
            self.images.len(),
            format.format,
            present_mode,
            extent.width,
            extent.height
        );

        self.acquire()
    }

    ///Blocks until the next image is available and makes it current.
    fn acquire(&mut self) -> Result<(), BackendError> {
        let (index, _suboptimal) = unsafe {
            self.device
                .swapchain_loader
                .acquire_next_image(
                    self.swapchain,
                    u64::MAX,
                    vk::Semaphore::null(),
                    self.acquire_fence,
                )
                .map_err(vk_err)?
        };
        unsafe {
            self.device
                .device
                .wait_for_fences(&[self.acquire_fence], true, u64::MAX)
                .map_err(vk_err)?;
            self.device
                .device
                .reset_fences(&[self.acquire_fence])
                .map_err(vk_err)?;
        }
        self.current = index;
        Ok(())
    }
}

impl RawSwapchain<VulkanBackend> for VkSwapchain {
    fn buffer_count(&self) -> u32 {
        self.images.len() as u32
    }

    fn current_back_buffer_index(&self) -> u32 {
        self.current
    }

    fn present(&mut self, queue: &VkQueue, _mode: PresentMode) -> Result<(), BackendError> {
        //Signals after everything submitted before. The present waits on it.
        let semaphores = [self.present_semaphores[self.current as usize]];
        let submit = vk::SubmitInfo::default().signal_semaphores(&semaphores);
        queue.device.submit(queue.queue, &submit)?;

        let swapchains = [self.swapchain];
        let indices = [self.current];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);
        {
            let _guard = queue.device.lock_queue();
            unsafe {
                self.device
                    .swapchain_loader
                    .queue_present(queue.queue, &present_info)
                    .map_err(vk_err)?
            };
        }

        self.acquire()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        //the present semaphores might still be in use by the presentation engine
        {
            let _guard = self.device.lock_queue();
            unsafe { self.device.device.device_wait_idle().map_err(vk_err)? };
        }
        self.recreate(width, height)
    }
}

impl Drop for VkSwapchain {
    fn drop(&mut self) {
        let guard = self.device.lock_queue();
        unsafe {
            if let Err(_e) = self.device.device.device_wait_idle() {
                #[cfg(feature = "logging")]
                log::error!("Failed to wait for idle before destroying swapchain: {}", _e);
            }
        }
        drop(guard);

        unsafe {
            for semaphore in self.present_semaphores.drain(..) {
                self.device.device.destroy_semaphore(semaphore, None);
            }
            self.device.device.destroy_fence(self.acquire_fence, None);
            self.device
                .swapchain_loader
                .destroy_swapchain(self.swapchain, None);
            self.instance
                .surface_loader
                .destroy_surface(self.surface, None);
        }
    }
}
