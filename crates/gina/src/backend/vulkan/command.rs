use std::sync::Arc;

use ash::vk;

use super::{VulkanBackend, device::DeviceShared, vk_err};
use crate::{
    backend::{RawCommandAllocator, RawCommandList},
    error::BackendError,
};

///Command pool with exactly one primary command buffer. Resetting the pool resets the buffer.
pub struct VkCommandAllocator {
    device: Arc<DeviceShared>,
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
}

impl VkCommandAllocator {
    pub(crate) fn new(device: Arc<DeviceShared>) -> Result<Self, BackendError> {
        let pool_info =
            vk::CommandPoolCreateInfo::default().queue_family_index(device.queue_family);
        let pool = unsafe { device.device.create_command_pool(&pool_info, None)? };

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffer = match unsafe { device.device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => buffers[0],
            Err(e) => {
                unsafe { device.device.destroy_command_pool(pool, None) };
                return Err(vk_err(e));
            }
        };

        Ok(VkCommandAllocator {
            device,
            pool,
            buffer,
        })
    }

    pub fn pool(&self) -> vk::CommandPool {
        self.pool
    }
}

impl RawCommandAllocator for VkCommandAllocator {
    fn reset(&mut self) -> Result<(), BackendError> {
        unsafe {
            self.device
                .device
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())
                .map_err(vk_err)
        }
    }
}

impl Drop for VkCommandAllocator {
    fn drop(&mut self) {
        unsafe {
            //frees the buffer as well
            self.device.device.destroy_command_pool(self.pool, None);
        }
    }
}

///Records into the command buffer of the allocator it was last reset on.
pub struct VkCommandList {
    device: Arc<DeviceShared>,
    buffer: vk::CommandBuffer,
    recording: bool,
}

impl VkCommandList {
    ///Records an empty buffer on `allocator`, so the closed list is valid to submit before its first reset.
    pub(crate) fn new(
        device: Arc<DeviceShared>,
        allocator: &VkCommandAllocator,
    ) -> Result<Self, BackendError> {
        unsafe {
            device
                .device
                .begin_command_buffer(allocator.buffer, &vk::CommandBufferBeginInfo::default())
                .map_err(vk_err)?;
            device
                .device
                .end_command_buffer(allocator.buffer)
                .map_err(vk_err)?;
        }

        Ok(VkCommandList {
            device,
            buffer: allocator.buffer,
            recording: false,
        })
    }

    ///Command buffer to record into. Use [device](VkCommandList::device) to issue `vkCmd*` calls.
    pub fn raw(&self) -> vk::CommandBuffer {
        self.buffer
    }

    pub fn device(&self) -> &ash::Device {
        &self.device.device
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }
}

impl RawCommandList<VulkanBackend> for VkCommandList {
    fn reset(&mut self, allocator: &VkCommandAllocator) -> Result<(), BackendError> {
        if self.recording {
            return Err(BackendError::Validation(
                "command list reset while still recording".to_owned(),
            ));
        }
        let begin_info =
            vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device
                .device
                .begin_command_buffer(allocator.buffer, &begin_info)
                .map_err(vk_err)?
        };
        self.buffer = allocator.buffer;
        self.recording = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        if !self.recording {
            return Err(BackendError::Validation(
                "command list closed twice".to_owned(),
            ));
        }
        unsafe { self.device.device.end_command_buffer(self.buffer).map_err(vk_err)? };
        self.recording = false;
        Ok(())
    }
}
