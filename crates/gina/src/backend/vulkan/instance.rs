use std::{
    ffi::{CStr, CString, c_char},
    sync::Arc,
};

use ash::vk;

use super::{
    VulkanBackend,
    debugger::Debugger,
    device::{DeviceShared, VkDevice, VkQueue},
    swapchain::VkSwapchain,
    vk_err,
};
use crate::{
    backend::{
        AdapterInfo, AdapterKind, FeatureLevel, GpuPreference, InstanceDesc, RawAdapter,
        RawInstance, SwapchainDesc, ValidationFeature, ValidationFeatures,
    },
    error::BackendError,
    surface::SurfaceHandle,
};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

///Timeline semaphores are core since 1.2.
const MIN_API_LEVEL: FeatureLevel = FeatureLevel::V1_2;

fn to_vk_features(feature: ValidationFeature) -> &'static [vk::ValidationFeatureEnableEXT] {
    match feature {
        ValidationFeature::GpuAssisted => &[
            vk::ValidationFeatureEnableEXT::GPU_ASSISTED,
            vk::ValidationFeatureEnableEXT::GPU_ASSISTED_RESERVE_BINDING_SLOT,
        ],
        ValidationFeature::Synchronization => &[vk::ValidationFeatureEnableEXT::SYNCHRONIZATION_VALIDATION],
        ValidationFeature::BestPractices => &[vk::ValidationFeatureEnableEXT::BEST_PRACTICES],
        ValidationFeature::DebugPrintf => &[vk::ValidationFeatureEnableEXT::DEBUG_PRINTF],
    }
}

pub(crate) struct InstanceShared {
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) surface_loader: ash::khr::surface::Instance,
    debugger: Option<Debugger>,
    validation_enabled: bool,
    validation_features: ValidationFeatures,
}

impl Drop for InstanceShared {
    fn drop(&mut self) {
        //messenger has to go before the instance
        self.debugger.take();
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}

///Loaded Vulkan entry point and instance.
pub struct VkInstance {
    pub(crate) shared: Arc<InstanceShared>,
}

impl VkInstance {
    pub fn entry(&self) -> &ash::Entry {
        &self.shared.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.shared.instance
    }

    fn graphics_family(&self, physical_device: vk::PhysicalDevice) -> Option<u32> {
        let families = unsafe {
            self.shared
                .instance
                .get_physical_device_queue_family_properties(physical_device)
        };
        families
            .iter()
            .position(|f| f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|idx| idx as u32)
    }

    fn supports_timeline_semaphores(&self, physical_device: vk::PhysicalDevice) -> bool {
        let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
        {
            let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut features12);
            unsafe {
                self.shared
                    .instance
                    .get_physical_device_features2(physical_device, &mut features2)
            };
        }
        features12.timeline_semaphore == vk::TRUE
    }
}

impl RawInstance<VulkanBackend> for VkInstance {
    fn create(desc: &InstanceDesc) -> Result<Self, BackendError> {
        let entry =
            unsafe { ash::Entry::load() }.map_err(|e| BackendError::Loading(e.to_string()))?;

        let mut extensions: Vec<*const c_char> = match desc.display {
            Some(display) => ash_window::enumerate_required_extensions(display)?.to_vec(),
            None => Vec::new(),
        };

        let validation_enabled = if desc.validation {
            let layers = unsafe { entry.enumerate_instance_layer_properties()? };
            let available = layers
                .iter()
                .any(|l| l.layer_name_as_c_str() == Ok(VALIDATION_LAYER));
            if available {
                #[cfg(feature = "logging")]
                log::info!("Enabling validation layer");
            } else {
                #[cfg(feature = "logging")]
                log::warn!(
                    "Failed to enable validation layer: {:?} is not installed",
                    VALIDATION_LAYER
                );
            }
            available
        } else {
            false
        };

        let mut layers = Vec::new();
        if validation_enabled {
            layers.push(VALIDATION_LAYER.as_ptr());
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let app_name = CString::new(desc.app_name.as_str()).unwrap_or_default();
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .engine_name(c"gina")
            .api_version(vk::API_VERSION_1_3);

        let validation_features = if validation_enabled {
            desc.gpu_validation.clone()
        } else {
            ValidationFeatures::none()
        };
        let enabled_features = validation_features
            .iter()
            .flat_map(|feature| to_vk_features(feature).iter().copied())
            .collect::<Vec<_>>();
        let mut valext =
            vk::ValidationFeaturesEXT::default().enabled_validation_features(&enabled_features);

        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions);
        if !enabled_features.is_empty() {
            create_info = create_info.push_next(&mut valext);
            #[cfg(feature = "logging")]
            {
                if validation_features.contains(ValidationFeature::GpuAssisted) {
                    log::info!("GPU-based validation enabled");
                }
                log::info!("Validation features: {:?}", enabled_features);
            }
        }

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let debugger = if validation_enabled {
            match Debugger::new(&entry, &instance) {
                Ok(debugger) => Some(debugger),
                Err(_e) => {
                    #[cfg(feature = "logging")]
                    log::warn!("Failed to create debug messenger: {}", _e);
                    None
                }
            }
        } else {
            None
        };

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        Ok(VkInstance {
            shared: Arc::new(InstanceShared {
                entry,
                instance,
                surface_loader,
                debugger,
                validation_enabled,
                validation_features,
            }),
        })
    }

    fn validation_enabled(&self) -> bool {
        self.shared.validation_enabled
    }

    fn validation_features(&self) -> &ValidationFeatures {
        &self.shared.validation_features
    }

    ///Adapters are sorted on the host, so the preference is always honored.
    fn supports_gpu_preference(&self) -> bool {
        true
    }

    fn enumerate_adapters(&self, preference: GpuPreference) -> Result<Vec<VkAdapter>, BackendError> {
        let physical_devices = unsafe { self.shared.instance.enumerate_physical_devices()? };
        let mut adapters = physical_devices
            .into_iter()
            .map(|physical_device| VkAdapter {
                physical_device,
                properties: unsafe {
                    self.shared
                        .instance
                        .get_physical_device_properties(physical_device)
                },
            })
            .collect::<Vec<_>>();

        if preference == GpuPreference::HighPerformance {
            adapters.sort_by_key(|a| std::cmp::Reverse(a.kind().performance_rank()));
        }

        Ok(adapters)
    }

    fn software_adapter(&self) -> Result<VkAdapter, BackendError> {
        self.enumerate_adapters(GpuPreference::Unspecified)?
            .into_iter()
            .find(|a| a.kind() == AdapterKind::Cpu)
            .ok_or_else(|| BackendError::Unsupported("no CPU implementation installed".to_owned()))
    }

    fn probe_adapter(&self, adapter: &VkAdapter, level: FeatureLevel) -> Result<(), BackendError> {
        let required = level.max(MIN_API_LEVEL);
        let version = adapter.api_level();
        if version < required {
            return Err(BackendError::Unsupported(format!(
                "Vulkan {} is supported, {} is required",
                version, required
            )));
        }
        if !self.supports_timeline_semaphores(adapter.physical_device) {
            return Err(BackendError::Unsupported(
                "timeline semaphores are not supported".to_owned(),
            ));
        }
        if self.graphics_family(adapter.physical_device).is_none() {
            return Err(BackendError::Unsupported("no graphics queue".to_owned()));
        }
        Ok(())
    }

    fn create_device(&self, adapter: &VkAdapter, level: FeatureLevel) -> Result<VkDevice, BackendError> {
        self.probe_adapter(adapter, level)?;
        let queue_family = self
            .graphics_family(adapter.physical_device)
            .ok_or_else(|| BackendError::Unsupported("no graphics queue".to_owned()))?;

        let priorities = [1.0f32];
        let queue_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family)
            .queue_priorities(&priorities)];
        let extensions = [ash::khr::swapchain::NAME.as_ptr()];
        let mut features12 = vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .push_next(&mut features12);

        let device = unsafe {
            self.shared
                .instance
                .create_device(adapter.physical_device, &create_info, None)
                .map_err(vk_err)?
        };

        Ok(VkDevice {
            shared: Arc::new(DeviceShared::new(
                self.shared.clone(),
                adapter.physical_device,
                queue_family,
                device,
            )),
        })
    }

    fn create_swapchain(
        &self,
        device: &VkDevice,
        _queue: &VkQueue,
        surface: &SurfaceHandle,
        desc: &SwapchainDesc,
    ) -> Result<VkSwapchain, BackendError> {
        VkSwapchain::new(self.shared.clone(), device.shared.clone(), surface, desc)
    }
}

///A physical device and its properties.
#[derive(Clone, Copy)]
pub struct VkAdapter {
    pub physical_device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
}

impl VkAdapter {
    fn kind(&self) -> AdapterKind {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => AdapterKind::Discrete,
            vk::PhysicalDeviceType::INTEGRATED_GPU => AdapterKind::Integrated,
            vk::PhysicalDeviceType::VIRTUAL_GPU => AdapterKind::Virtual,
            vk::PhysicalDeviceType::CPU => AdapterKind::Cpu,
            _ => AdapterKind::Other,
        }
    }

    fn api_level(&self) -> FeatureLevel {
        FeatureLevel::new(
            vk::api_version_major(self.properties.api_version),
            vk::api_version_minor(self.properties.api_version),
        )
    }
}

impl RawAdapter for VkAdapter {
    fn info(&self) -> Result<AdapterInfo, BackendError> {
        let name = self
            .properties
            .device_name_as_c_str()
            .map_err(|e| BackendError::Unsupported(format!("unreadable device name: {}", e)))?
            .to_string_lossy()
            .into_owned();
        let kind = self.kind();

        Ok(AdapterInfo {
            name,
            kind,
            is_software: kind == AdapterKind::Cpu,
            max_feature_level: self.api_level(),
        })
    }
}
