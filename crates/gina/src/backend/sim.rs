//! # Simulated backend
//!
//! A deterministic GPU that lives in-process. It follows the same rules a real driver does: queues retire work strictly in
//! submission order, fence values only become visible once everything enqueued before the signal retired, and CPU
//! waits block on an OS primitive until that happens.
//!
//! Additionally it validates the parts of the protocol a driver would only report through its debug layer. Resetting a
//! command allocator the GPU still reads from, or executing an open command list, fails with
//! [Validation](BackendError::Validation).
//!
//! ```
//! use gina::backend::sim::{ExecutionMode, SimAdapterDesc, SimInstance};
//!
//! let instance = SimInstance::builder()
//!     .with_adapter(SimAdapterDesc::discrete("Test GPU"))
//!     .execution_mode(ExecutionMode::Manual)
//!     .build();
//! ```

use super::{
    AdapterInfo, AdapterKind, Backend, FeatureLevel, GpuPreference, InstanceDesc, RawAdapter,
    RawInstance, SwapchainDesc, ValidationFeature, ValidationFeatures,
};
use crate::{error::BackendError, surface::SurfaceHandle};

mod device;
pub use device::{SimCommandAllocator, SimCommandList, SimDevice, SimFence, SimQueue};

mod gpu;
pub use gpu::{ExecutionMode, GpuEvent, ImmediateOnDrop, SimGpu};

mod swapchain;
pub use swapchain::SimSwapchain;

pub struct SimBackend;

impl Backend for SimBackend {
    const NAME: &'static str = "simulated";

    type Instance = SimInstance;
    type Adapter = SimAdapter;
    type Device = SimDevice;
    type Queue = SimQueue;
    type CommandAllocator = SimCommandAllocator;
    type CommandList = SimCommandList;
    type Fence = SimFence;
    type Swapchain = SimSwapchain;
}

///Describes one adapter the simulated instance reports.
#[derive(Clone, Debug)]
pub struct SimAdapterDesc {
    pub info: AdapterInfo,
    ///If set, every trial or real device creation fails.
    pub broken: bool,
    ///If set, reading the adapter description fails.
    pub hide_description: bool,
}

impl SimAdapterDesc {
    pub fn new(name: &str, kind: AdapterKind) -> Self {
        SimAdapterDesc {
            info: AdapterInfo {
                name: name.to_owned(),
                kind,
                is_software: kind == AdapterKind::Cpu,
                max_feature_level: FeatureLevel::V1_3,
            },
            broken: false,
            hide_description: false,
        }
    }

    pub fn discrete(name: &str) -> Self {
        Self::new(name, AdapterKind::Discrete)
    }

    pub fn integrated(name: &str) -> Self {
        Self::new(name, AdapterKind::Integrated)
    }

    ///A software rasterizer, flagged as such.
    pub fn software(name: &str) -> Self {
        Self::new(name, AdapterKind::Cpu)
    }

    pub fn with_feature_level(mut self, level: FeatureLevel) -> Self {
        self.info.max_feature_level = level;
        self
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    pub fn without_description(mut self) -> Self {
        self.hide_description = true;
        self
    }
}

#[derive(Clone, Debug)]
pub struct SimAdapter {
    desc: SimAdapterDesc,
}

impl RawAdapter for SimAdapter {
    fn info(&self) -> Result<AdapterInfo, BackendError> {
        if self.desc.hide_description {
            return Err(BackendError::Unsupported(
                "adapter description not available".to_owned(),
            ));
        }
        Ok(self.desc.info.clone())
    }
}

impl SimAdapter {
    fn check_level(&self, level: FeatureLevel) -> Result<(), BackendError> {
        if self.desc.broken {
            return Err(BackendError::Unsupported(format!(
                "device creation on {} failed",
                self.desc.info.name
            )));
        }
        if self.desc.info.max_feature_level < level {
            return Err(BackendError::Unsupported(format!(
                "{} supports feature level {}, {} is required",
                self.desc.info.name, self.desc.info.max_feature_level, level
            )));
        }
        Ok(())
    }
}

pub struct SimInstanceBuilder {
    adapters: Vec<SimAdapterDesc>,
    supports_preference: bool,
    validation_available: bool,
    validation_requested: bool,
    validation_features: ValidationFeatures,
    mode: ExecutionMode,
}

impl SimInstanceBuilder {
    ///Adds an adapter. Adapters are reported in the order they are added. If none is added, a discrete GPU and a software
    /// rasterizer are reported.
    pub fn with_adapter(mut self, adapter: SimAdapterDesc) -> Self {
        self.adapters.push(adapter);
        self
    }

    ///Makes [enumerate_adapters](RawInstance::enumerate_adapters) ignore the preference, like platforms without
    /// preference based enumeration.
    pub fn without_gpu_preference(mut self) -> Self {
        self.supports_preference = false;
        self
    }

    ///Simulates a system without installed validation layer.
    pub fn without_validation_layer(mut self) -> Self {
        self.validation_available = false;
        self
    }

    pub fn validation(mut self, requested: bool) -> Self {
        self.validation_requested = requested;
        self
    }

    ///Features requested alongside the validation layer. Defaults to [ValidationFeatures::all].
    pub fn validation_features(mut self, features: ValidationFeatures) -> Self {
        self.validation_features = features;
        self
    }

    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn build(self) -> SimInstance {
        let adapters = if self.adapters.is_empty() {
            vec![
                SimAdapterDesc::discrete("Simulated GPU"),
                SimAdapterDesc::software("Simulated Software Rasterizer"),
            ]
        } else {
            self.adapters
        };

        let validation_enabled = if self.validation_requested {
            if self.validation_available {
                #[cfg(feature = "logging")]
                log::info!("Simulated validation layer enabled");
                true
            } else {
                #[cfg(feature = "logging")]
                log::warn!("Failed to enable validation layer: not available");
                false
            }
        } else {
            false
        };

        let validation_features = if validation_enabled {
            #[cfg(feature = "logging")]
            {
                if self.validation_features.contains(ValidationFeature::GpuAssisted) {
                    log::info!("GPU-based validation enabled");
                }
            }
            self.validation_features
        } else {
            ValidationFeatures::none()
        };

        SimInstance {
            adapters,
            supports_preference: self.supports_preference,
            validation_enabled,
            validation_features,
            mode: self.mode,
        }
    }
}

pub struct SimInstance {
    adapters: Vec<SimAdapterDesc>,
    supports_preference: bool,
    validation_enabled: bool,
    validation_features: ValidationFeatures,
    mode: ExecutionMode,
}

impl SimInstance {
    pub fn builder() -> SimInstanceBuilder {
        SimInstanceBuilder {
            adapters: Vec::new(),
            supports_preference: true,
            validation_available: true,
            validation_requested: false,
            validation_features: ValidationFeatures::all(),
            mode: ExecutionMode::Immediate,
        }
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }
}

impl RawInstance<SimBackend> for SimInstance {
    fn create(desc: &InstanceDesc) -> Result<Self, BackendError> {
        Ok(Self::builder()
            .validation(desc.validation)
            .validation_features(desc.gpu_validation.clone())
            .build())
    }

    fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    fn validation_features(&self) -> &ValidationFeatures {
        &self.validation_features
    }

    fn supports_gpu_preference(&self) -> bool {
        self.supports_preference
    }

    fn enumerate_adapters(&self, preference: GpuPreference) -> Result<Vec<SimAdapter>, BackendError> {
        let mut adapters = self
            .adapters
            .iter()
            .cloned()
            .map(|desc| SimAdapter { desc })
            .collect::<Vec<_>>();

        if self.supports_preference && preference == GpuPreference::HighPerformance {
            //stable, so equally ranked adapters keep their declaration order
            adapters.sort_by_key(|a| std::cmp::Reverse(a.desc.info.kind.performance_rank()));
        }

        Ok(adapters)
    }

    fn software_adapter(&self) -> Result<SimAdapter, BackendError> {
        self.adapters
            .iter()
            .find(|desc| desc.info.is_software)
            .cloned()
            .map(|desc| SimAdapter { desc })
            .ok_or_else(|| BackendError::Unsupported("no software adapter present".to_owned()))
    }

    fn probe_adapter(&self, adapter: &SimAdapter, level: FeatureLevel) -> Result<(), BackendError> {
        adapter.check_level(level)
    }

    fn create_device(&self, adapter: &SimAdapter, level: FeatureLevel) -> Result<SimDevice, BackendError> {
        adapter.check_level(level)?;
        Ok(SimDevice::new(adapter.desc.info.name.clone(), self.mode))
    }

    fn create_swapchain(
        &self,
        _device: &SimDevice,
        _queue: &SimQueue,
        _surface: &SurfaceHandle,
        desc: &SwapchainDesc,
    ) -> Result<SimSwapchain, BackendError> {
        SimSwapchain::new(desc)
    }
}
