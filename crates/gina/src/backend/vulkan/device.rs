use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ash::vk;

use super::{
    VulkanBackend,
    command::{VkCommandAllocator, VkCommandList},
    instance::InstanceShared,
    sync::VkFence,
    vk_err,
};
use crate::{
    backend::{RawDevice, RawQueue},
    error::BackendError,
};

pub(crate) struct DeviceShared {
    pub(crate) device: ash::Device,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) queue_family: u32,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,
    ///Queue submission and presentation have to be externally synchronized.
    queue_lock: Mutex<()>,
    //NOTE: keeps the instance alive until the device is destroyed.
    _instance: Arc<InstanceShared>,
}

impl DeviceShared {
    pub(crate) fn new(
        instance: Arc<InstanceShared>,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
        device: ash::Device,
    ) -> Self {
        let swapchain_loader = ash::khr::swapchain::Device::new(&instance.instance, &device);
        DeviceShared {
            device,
            physical_device,
            queue_family,
            swapchain_loader,
            queue_lock: Mutex::new(()),
            _instance: instance,
        }
    }

    pub(crate) fn lock_queue(&self) -> MutexGuard<'_, ()> {
        self.queue_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn submit(
        &self,
        queue: vk::Queue,
        submit: &vk::SubmitInfo<'_>,
    ) -> Result<(), BackendError> {
        let _guard = self.lock_queue();
        unsafe {
            self.device
                .queue_submit(queue, std::slice::from_ref(submit), vk::Fence::null())
                .map_err(vk_err)
        }
    }
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        unsafe {
            if let Err(_e) = self.device.device_wait_idle() {
                #[cfg(feature = "logging")]
                log::error!("Failed to wait for device idle before destruction: {}", _e);
            }
            self.device.destroy_device(None);
        }
    }
}

///Logical device with one graphics queue.
pub struct VkDevice {
    pub(crate) shared: Arc<DeviceShared>,
}

impl VkDevice {
    pub fn device(&self) -> &ash::Device {
        &self.shared.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.shared.physical_device
    }

    pub fn queue_family(&self) -> u32 {
        self.shared.queue_family
    }
}

impl RawDevice<VulkanBackend> for VkDevice {
    fn create_queue(&self) -> Result<VkQueue, BackendError> {
        let queue = unsafe { self.shared.device.get_device_queue(self.shared.queue_family, 0) };
        Ok(VkQueue {
            device: self.shared.clone(),
            queue,
        })
    }

    fn create_command_allocator(&self) -> Result<VkCommandAllocator, BackendError> {
        VkCommandAllocator::new(self.shared.clone())
    }

    fn create_command_list(
        &self,
        allocator: &VkCommandAllocator,
    ) -> Result<VkCommandList, BackendError> {
        VkCommandList::new(self.shared.clone(), allocator)
    }

    fn create_fence(&self, initial_value: u64) -> Result<VkFence, BackendError> {
        VkFence::new(self.shared.clone(), initial_value)
    }
}

pub struct VkQueue {
    pub(crate) device: Arc<DeviceShared>,
    pub(crate) queue: vk::Queue,
}

impl VkQueue {
    pub fn raw(&self) -> vk::Queue {
        self.queue
    }
}

impl RawQueue<VulkanBackend> for VkQueue {
    fn execute(&self, lists: &[&VkCommandList]) -> Result<(), BackendError> {
        if lists.iter().any(|list| list.is_recording()) {
            return Err(BackendError::Validation(
                "command list executed while still recording".to_owned(),
            ));
        }
        let buffers = lists.iter().map(|list| list.raw()).collect::<Vec<_>>();
        let submit = vk::SubmitInfo::default().command_buffers(&buffers);
        self.device.submit(self.queue, &submit)
    }

    fn signal(&self, fence: &VkFence, value: u64) -> Result<(), BackendError> {
        let semaphores = [fence.raw()];
        let values = [value];
        let mut timeline = vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&values);
        let submit = vk::SubmitInfo::default()
            .signal_semaphores(&semaphores)
            .push_next(&mut timeline);
        self.device.submit(self.queue, &submit)
    }

    fn wait(&self, fence: &VkFence, value: u64) -> Result<(), BackendError> {
        let semaphores = [fence.raw()];
        let values = [value];
        let stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let mut timeline = vk::TimelineSemaphoreSubmitInfo::default().wait_semaphore_values(&values);
        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&semaphores)
            .wait_dst_stage_mask(&stages)
            .push_next(&mut timeline);
        self.device.submit(self.queue, &submit)
    }
}
