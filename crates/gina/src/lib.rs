//! # gina
//!
//! Creates a graphics device, submits command lists, presents frames and keeps the CPU from touching anything the GPU
//! still consumes.
//!
//! The crate is organised around five components:
//!
//! - [AdapterSelector]: finds the first hardware adapter that supports the required [FeatureLevel](backend::FeatureLevel).
//! - [Fence]: a monotonic counter the GPU advances in queue order. The only way the CPU learns about GPU progress.
//! - [CommandSubmitter]: the queue, one command allocator per frame in flight and a single shared command list.
//! - [PresentationSurface]: the swap chain. Its current back buffer index selects the frame slot.
//! - [GraphicsDevice]: creates and owns all of the above.
//!
//! # Frame protocol
//!
//! Each frame records into the allocator of the current back buffer. Before that allocator is reset, the fence value
//! signaled after its previous use has to be reached. [GraphicsDevice::begin_frame] and [GraphicsDevice::end_frame]
//! implement that. The individual components expose the raw steps as well, in which case waiting is up to the caller.
//!
//! # Backends
//!
//! All components are generic over a [Backend](backend::Backend). The [simulated](backend::sim) backend is always
//! available, the Vulkan backend is enabled by the `vulkan` feature.

///Adapter enumeration and selection.
pub mod adapter;
pub use adapter::{Adapter, AdapterSelector};

pub mod backend;

pub mod command;
pub use command::{CommandList, CommandListState, CommandSubmitter};

pub mod device;
pub use device::{DeviceDesc, GraphicsDevice};

mod error;
pub use error::{
    AdapterError, BackendError, CommandError, DeviceError, FenceError, GinaError, InitStage,
    SwapchainError,
};

pub mod fence;
pub use fence::Fence;

pub mod resize;

mod surface;
pub use surface::SurfaceHandle;

///Swap chain wrapper.
pub mod swapchain;
pub use swapchain::PresentationSurface;

#[cfg(feature = "vulkan")]
pub use ash;

pub use raw_window_handle;

///Default number of frames in flight.
pub const BUFFER_COUNT: u32 = 2;
///Smallest accepted number of frames in flight.
pub const MIN_BUFFER_COUNT: u32 = 2;
