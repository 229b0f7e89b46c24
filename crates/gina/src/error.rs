use std::fmt::Display;

use thiserror::Error;

///Errors reported by a [Backend](crate::backend::Backend) implementation.
#[derive(Error, Debug)]
pub enum BackendError {
    #[cfg(feature = "vulkan")]
    #[error("Vulkan error: {0}")]
    VkError(#[from] ash::vk::Result),
    #[error("Failed to load graphics API entry point: {0}")]
    Loading(String),
    #[error("Device was lost or removed")]
    DeviceLost,
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("No suitable graphics adapter found")]
    NotFound,
    #[error("Adapter enumeration failed: {0}")]
    Backend(#[from] BackendError),
}

///The initialization step of a [GraphicsDevice](crate::GraphicsDevice) that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitStage {
    DeclareCapabilities,
    CreateFactory,
    SelectAdapter,
    CreateDevice,
    CreateCommandQueue,
    CreateCommandAllocator,
    CreateCommandList,
    CreateSwapchain,
    CreateFence,
}

impl Display for InitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            InitStage::DeclareCapabilities => "declare platform capabilities",
            InitStage::CreateFactory => "create factory",
            InitStage::SelectAdapter => "select adapter",
            InitStage::CreateDevice => "create device",
            InitStage::CreateCommandQueue => "create command queue",
            InitStage::CreateCommandAllocator => "create command allocator",
            InitStage::CreateCommandList => "create command list",
            InitStage::CreateSwapchain => "create swap chain",
            InitStage::CreateFence => "create fence",
        };
        f.write_str(msg)
    }
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No suitable graphics adapter found")]
    NoAdapter,
    #[error("Surface can't have an extent of 0 on either axis, was: {width}x{height}")]
    InvalidSurfaceSize { width: u32, height: u32 },
    #[error("At least two back buffers are needed, got {0}")]
    InvalidBufferCount(u32),
    #[error("Failed to {stage}: {source}")]
    Init {
        stage: InitStage,
        #[source]
        source: BackendError,
    },
}

impl DeviceError {
    pub(crate) fn init(stage: InitStage) -> impl FnOnce(BackendError) -> DeviceError {
        move |source| {
            #[cfg(feature = "logging")]
            log::error!("Failed to {}: {}", stage, source);
            DeviceError::Init { stage, source }
        }
    }
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Command list must be closed before it can be submitted")]
    ListNotClosed,
    #[error("Command list is not recording")]
    ListNotRecording,
    #[error("A frame was already started for slot {0}")]
    FrameInProgress(usize),
    #[error("No frame was started")]
    NoFrameInProgress,
}

#[derive(Error, Debug)]
pub enum FenceError {
    #[error("Backend error: {0}")]
    Backend(BackendError),
    #[error("Device was lost while waiting for fence value {0}")]
    DeviceLost(u64),
    #[error("Timed out waiting for fence value {value}, completed value is {completed}")]
    Timeout { value: u64, completed: u64 },
}

#[derive(Error, Debug)]
pub enum SwapchainError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("Swapchain can't have a extent of 0 on either axis, was: {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

#[derive(Error, Debug)]
pub enum GinaError {
    #[error("Adapter error: {0}")]
    AdapterError(#[from] AdapterError),
    #[error("Device error: {0}")]
    DeviceError(#[from] DeviceError),
    #[error("Command error: {0}")]
    CommandError(#[from] CommandError),
    #[error("Fence error: {0}")]
    FenceError(#[from] FenceError),
    #[error("Swapchain error: {0}")]
    SwapchainError(#[from] SwapchainError),
    #[error("Backend error: {0}")]
    BackendError(#[from] BackendError),
}
