use std::{sync::Arc, time::Duration};

use ash::vk;

use super::{device::DeviceShared, vk_err};
use crate::{backend::RawFence, error::BackendError};

///Timeline semaphore.
pub struct VkFence {
    device: Arc<DeviceShared>,
    semaphore: vk::Semaphore,
}

impl VkFence {
    pub(crate) fn new(device: Arc<DeviceShared>, initial_value: u64) -> Result<Self, BackendError> {
        let mut timeline_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut timeline_info);
        let semaphore = unsafe { device.device.create_semaphore(&create_info, None)? };

        Ok(VkFence { device, semaphore })
    }

    pub fn raw(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl RawFence for VkFence {
    fn completed_value(&self) -> u64 {
        //fails only on device loss, which completes everything
        unsafe {
            self.device
                .device
                .get_semaphore_counter_value(self.semaphore)
                .unwrap_or(u64::MAX)
        }
    }

    fn wait(&self, value: u64, timeout: Option<Duration>) -> Result<bool, BackendError> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        let timeout_ns = timeout
            .map(|t| u64::try_from(t.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(u64::MAX);

        match unsafe { self.device.device.wait_semaphores(&wait_info, timeout_ns) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(vk_err(e)),
        }
    }
}

impl Drop for VkFence {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_semaphore(self.semaphore, None) };
    }
}
