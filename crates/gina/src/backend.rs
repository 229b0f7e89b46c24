//! # Backends
//!
//! gina does not talk to a graphics API directly. Every component is generic over a [Backend], which names the raw
//! objects of one API (instance, adapter, device, queue, command allocator, command list, fence and swapchain). The raw
//! objects only need to provide the handful of operations defined by the `Raw*` traits in this module.
//!
//! Two backends are included:
//!
//! - [sim](crate::backend::sim): a deterministic, in-process GPU. Always compiled. Used for tests, headless runs and for
//!   reasoning about the frame protocol without a driver.
//! - `vulkan`: an [ash](https://crates.io/crates/ash) based implementation. Enabled via the `vulkan` feature.
//!
//! Ownership is always exclusive. The orchestrating [GraphicsDevice](crate::GraphicsDevice) owns the instance and
//! device, the [CommandSubmitter](crate::CommandSubmitter) owns the queue, allocators and list.

use std::time::Duration;

use raw_window_handle::RawDisplayHandle;

use crate::{error::BackendError, surface::SurfaceHandle};

pub mod sim;

#[cfg(feature = "vulkan")]
pub mod vulkan;

///Graphics API abstraction. See the [module level](crate::backend) documentation.
pub trait Backend: Sized + Send + Sync + 'static {
    ///Human readable name, used for diagnostics.
    const NAME: &'static str;

    type Instance: RawInstance<Self>;
    type Adapter: RawAdapter;
    type Device: RawDevice<Self>;
    type Queue: RawQueue<Self>;
    type CommandAllocator: RawCommandAllocator;
    type CommandList: RawCommandList<Self>;
    type Fence: RawFence;
    type Swapchain: RawSwapchain<Self>;

    ///Process wide declarations the platform needs before device removal can be handled. Called once, before the
    /// instance is created.
    fn declare_capabilities() -> Result<(), BackendError> {
        Ok(())
    }
}

///The *factory* of a backend. Enumerates adapters and creates devices and swapchains.
pub trait RawInstance<B: Backend>: Send + Sync + Sized {
    fn create(desc: &InstanceDesc) -> Result<Self, BackendError>;

    ///True if the validation layer was requested *and* could be activated.
    fn validation_enabled(&self) -> bool;

    ///Validation features that are active. Empty if the validation layer is not enabled.
    fn validation_features(&self) -> &ValidationFeatures;

    ///True if [enumerate_adapters](RawInstance::enumerate_adapters) respects [GpuPreference::HighPerformance].
    fn supports_gpu_preference(&self) -> bool;

    ///Lists all adapters. If the preference is supported, they are ordered accordingly, otherwise in declaration order.
    fn enumerate_adapters(&self, preference: GpuPreference) -> Result<Vec<B::Adapter>, BackendError>;

    ///Returns the software (emulated) adapter, if the platform has one.
    fn software_adapter(&self) -> Result<B::Adapter, BackendError>;

    ///Checks that a device of at least `level` could be created on `adapter`, without keeping it.
    fn probe_adapter(&self, adapter: &B::Adapter, level: FeatureLevel) -> Result<(), BackendError>;

    fn create_device(&self, adapter: &B::Adapter, level: FeatureLevel) -> Result<B::Device, BackendError>;

    ///Creates a swapchain that presents through `queue` onto `surface`.
    fn create_swapchain(
        &self,
        device: &B::Device,
        queue: &B::Queue,
        surface: &SurfaceHandle,
        desc: &SwapchainDesc,
    ) -> Result<B::Swapchain, BackendError>;
}

pub trait RawAdapter: Send + Sync {
    fn info(&self) -> Result<AdapterInfo, BackendError>;
}

pub trait RawDevice<B: Backend>: Send + Sync {
    fn create_queue(&self) -> Result<B::Queue, BackendError>;
    fn create_command_allocator(&self) -> Result<B::CommandAllocator, BackendError>;
    ///Creates a command list bound to `allocator`. The list is returned in the *closed* state.
    fn create_command_list(
        &self,
        allocator: &B::CommandAllocator,
    ) -> Result<B::CommandList, BackendError>;
    fn create_fence(&self, initial_value: u64) -> Result<B::Fence, BackendError>;
}

///A single in-order execution stream on the GPU.
pub trait RawQueue<B: Backend>: Send + Sync {
    ///Enqueues closed command lists. They execute after everything enqueued before.
    fn execute(&self, lists: &[&B::CommandList]) -> Result<(), BackendError>;
    ///Enqueues a write of `value` to `fence`, executed once all previously enqueued work finished.
    fn signal(&self, fence: &B::Fence, value: u64) -> Result<(), BackendError>;
    ///Blocks the queue (not the CPU) until `fence` reaches `value`.
    fn wait(&self, fence: &B::Fence, value: u64) -> Result<(), BackendError>;
}

pub trait RawCommandAllocator: Send {
    ///Releases all recorded commands. The caller must make sure the GPU is done with them.
    fn reset(&mut self) -> Result<(), BackendError>;
}

pub trait RawCommandList<B: Backend>: Send {
    ///Rebinds the list to `allocator` and opens it for recording.
    fn reset(&mut self, allocator: &B::CommandAllocator) -> Result<(), BackendError>;
    ///Finishes recording.
    fn close(&mut self) -> Result<(), BackendError>;
}

pub trait RawFence: Send + Sync {
    ///Last value the GPU reached. Reads `u64::MAX` once the device is lost.
    fn completed_value(&self) -> u64;
    ///Blocks the calling thread until `value` is reached. Returns `Ok(false)` if `timeout` elapsed first. `None` waits
    /// forever.
    fn wait(&self, value: u64, timeout: Option<Duration>) -> Result<bool, BackendError>;
}

pub trait RawSwapchain<B: Backend>: Send {
    fn buffer_count(&self) -> u32;
    ///Index of the back buffer the next frame renders into.
    fn current_back_buffer_index(&self) -> u32;
    ///Enqueues presentation of the current back buffer and advances to the next one.
    fn present(&mut self, queue: &B::Queue, mode: PresentMode) -> Result<(), BackendError>;
    ///Recreates all back buffers with the new extent. The GPU must not use any of them anymore.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), BackendError>;
}

///Instance creation parameters.
#[derive(Clone, Debug)]
pub struct InstanceDesc {
    pub app_name: String,
    ///Requests the validation (debug) layer. Failing to activate it is not an error.
    pub validation: bool,
    ///Additional checks of the validation layer. Ignored if `validation` is false.
    pub gpu_validation: ValidationFeatures,
    ///Display the instance must be able to create surfaces for.
    pub display: Option<RawDisplayHandle>,
}

impl Default for InstanceDesc {
    fn default() -> Self {
        InstanceDesc {
            app_name: String::from("gina"),
            validation: cfg!(debug_assertions),
            gpu_validation: ValidationFeatures::all(),
            display: None,
        }
    }
}

///Checks the validation layer can run in addition to API usage validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValidationFeature {
    ///Instruments shaders and validates resource access on the GPU.
    GpuAssisted,
    Synchronization,
    BestPractices,
    ///Shader printf. Can't be combined with [GpuAssisted](ValidationFeature::GpuAssisted).
    DebugPrintf,
}

///Set of [ValidationFeature]s.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationFeatures {
    enabled: Vec<ValidationFeature>,
}

impl ValidationFeatures {
    pub fn none() -> Self {
        ValidationFeatures {
            enabled: Vec::new(),
        }
    }

    ///Enables only shader printf.
    pub fn gpu_printf() -> Self {
        ValidationFeatures {
            enabled: vec![ValidationFeature::DebugPrintf],
        }
    }

    ///Enables GPU assisted, synchronization and best practice validation.
    pub fn all() -> Self {
        ValidationFeatures {
            enabled: vec![
                ValidationFeature::GpuAssisted,
                ValidationFeature::Synchronization,
                ValidationFeature::BestPractices,
            ],
        }
    }

    pub fn with(mut self, feature: ValidationFeature) -> Self {
        if !self.enabled.contains(&feature) {
            self.enabled.push(feature);
        }
        self
    }

    pub fn contains(&self, feature: ValidationFeature) -> bool {
        self.enabled.contains(&feature)
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ValidationFeature> + '_ {
        self.enabled.iter().copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GpuPreference {
    Unspecified,
    HighPerformance,
}

///Minimum API level a device must support. Ordered by `(major, minor)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureLevel {
    pub major: u32,
    pub minor: u32,
}

impl FeatureLevel {
    pub const V1_0: FeatureLevel = FeatureLevel::new(1, 0);
    pub const V1_1: FeatureLevel = FeatureLevel::new(1, 1);
    pub const V1_2: FeatureLevel = FeatureLevel::new(1, 2);
    pub const V1_3: FeatureLevel = FeatureLevel::new(1, 3);

    pub const fn new(major: u32, minor: u32) -> Self {
        FeatureLevel { major, minor }
    }
}

impl Default for FeatureLevel {
    fn default() -> Self {
        FeatureLevel::V1_2
    }
}

impl std::fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    Discrete,
    Integrated,
    Virtual,
    Cpu,
    Other,
}

impl AdapterKind {
    ///Rank used for high-performance ordering. Higher is preferred.
    pub fn performance_rank(&self) -> u32 {
        match self {
            AdapterKind::Discrete => 3,
            AdapterKind::Integrated => 2,
            AdapterKind::Virtual => 1,
            AdapterKind::Cpu | AdapterKind::Other => 0,
        }
    }
}

///Description of a physical GPU. Only valid during adapter selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub kind: AdapterKind,
    ///Set for software rasterizers / emulated adapters.
    pub is_software: bool,
    ///Highest level the adapter reports.
    pub max_feature_level: FeatureLevel,
}

///How back buffers are handed to the display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PresentMode {
    ///Waits for vertical blank.
    Fifo,
    ///Presents right away, tearing allowed.
    Immediate,
}

impl PresentMode {
    pub fn from_vsync(vsync: bool) -> Self {
        if vsync {
            PresentMode::Fifo
        } else {
            PresentMode::Immediate
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub width: u32,
    pub height: u32,
    pub buffer_count: u32,
    pub vsync: bool,
}

impl SwapchainDesc {
    ///Tearing is only allowed when vsync is off.
    pub fn allow_tearing(&self) -> bool {
        !self.vsync
    }

    pub fn present_mode(&self) -> PresentMode {
        PresentMode::from_vsync(self.vsync)
    }
}
