use super::{SimBackend, device::SimQueue, gpu::GpuOp};
use crate::{
    backend::{PresentMode, RawSwapchain, SwapchainDesc},
    error::BackendError,
};

///Flip-model swapchain. The back buffer index advances by one on every present and wraps around.
pub struct SimSwapchain {
    width: u32,
    height: u32,
    buffer_count: u32,
    current: u32,
    allow_tearing: bool,
    presented: u64,
}

impl SimSwapchain {
    pub(crate) fn new(desc: &SwapchainDesc) -> Result<Self, BackendError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::Validation(format!(
                "swapchain extent {}x{} has a zero axis",
                desc.width, desc.height
            )));
        }
        if desc.buffer_count == 0 {
            return Err(BackendError::Validation(
                "swapchain needs at least one buffer".to_owned(),
            ));
        }

        Ok(SimSwapchain {
            width: desc.width,
            height: desc.height,
            buffer_count: desc.buffer_count,
            current: 0,
            allow_tearing: desc.allow_tearing(),
            presented: 0,
        })
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn allows_tearing(&self) -> bool {
        self.allow_tearing
    }

    ///Number of successful presents since creation.
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl RawSwapchain<SimBackend> for SimSwapchain {
    fn buffer_count(&self) -> u32 {
        self.buffer_count
    }

    fn current_back_buffer_index(&self) -> u32 {
        self.current
    }

    fn present(&mut self, queue: &SimQueue, mode: PresentMode) -> Result<(), BackendError> {
        if mode == PresentMode::Immediate && !self.allow_tearing {
            return Err(BackendError::Validation(
                "tearing present on a swapchain created without tearing support".to_owned(),
            ));
        }

        queue.enqueue(GpuOp::Present {
            buffer: self.current,
        })?;
        self.current = (self.current + 1) % self.buffer_count;
        self.presented += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::Validation(format!(
                "swapchain extent {}x{} has a zero axis",
                width, height
            )));
        }
        self.width = width;
        self.height = height;
        self.current = 0;
        Ok(())
    }
}
