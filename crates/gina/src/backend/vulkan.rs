//! # Vulkan backend
//!
//! Maps gina's objects onto Vulkan through [ash]:
//!
//! | gina              | Vulkan                                                        |
//! |-------------------|---------------------------------------------------------------|
//! | instance          | `VkInstance`, optionally with validation layer and messenger  |
//! | adapter           | `VkPhysicalDevice`                                            |
//! | queue             | the first queue of a graphics capable family                  |
//! | command allocator | `VkCommandPool` owning a single primary command buffer        |
//! | command list      | rebinds to the command buffer of the slot it records into     |
//! | fence             | timeline semaphore                                            |
//! | swapchain         | `VkSwapchainKHR` on a surface created via [ash_window]        |
//!
//! Timeline semaphores are core since Vulkan 1.2, which therefore is the minimum API version, regardless of the
//! requested [FeatureLevel](super::FeatureLevel).

use ash::vk;

use super::Backend;
use crate::error::BackendError;

mod command;
pub use command::{VkCommandAllocator, VkCommandList};

mod debugger;

mod device;
pub use device::{VkDevice, VkQueue};

mod instance;
pub use instance::{VkAdapter, VkInstance};

mod swapchain;
pub use swapchain::VkSwapchain;

mod sync;
pub use sync::VkFence;

pub struct VulkanBackend;

impl Backend for VulkanBackend {
    const NAME: &'static str = "Vulkan";

    type Instance = VkInstance;
    type Adapter = VkAdapter;
    type Device = VkDevice;
    type Queue = VkQueue;
    type CommandAllocator = VkCommandAllocator;
    type CommandList = VkCommandList;
    type Fence = VkFence;
    type Swapchain = VkSwapchain;
}

///Translates device loss, passes everything else through.
pub(crate) fn vk_err(error: vk::Result) -> BackendError {
    match error {
        vk::Result::ERROR_DEVICE_LOST => BackendError::DeviceLost,
        e => BackendError::VkError(e),
    }
}
