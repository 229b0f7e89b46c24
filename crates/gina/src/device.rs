//! # Graphics device
//!
//! [GraphicsDevice] creates and owns everything a frame needs: the backend instance, the logical device on the chosen
//! adapter, the [CommandSubmitter], the [PresentationSurface] and the [Fence].
//!
//! Frames can be driven in two ways. The *raw* protocol hands out the components, and the caller is responsible for
//! waiting on a slot's fence value before resetting its allocator:
//!
//! ```
//! # use gina::{GraphicsDevice, DeviceDesc, SurfaceHandle, backend::sim::SimBackend};
//! # use raw_window_handle::{RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle};
//! # let handle = SurfaceHandle::new(
//! #     RawWindowHandle::Xlib(XlibWindowHandle::new(1)),
//! #     RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
//! # );
//! let mut device = GraphicsDevice::<SimBackend>::new(&handle, DeviceDesc::new(1280, 720)).unwrap();
//! let mut slot_values = vec![0; device.buffer_count()];
//!
//! let slot = device.current_back_buffer_index();
//! device.fence().wait_on_cpu(slot_values[slot]).unwrap();
//! device.command_submitter_mut().reset_command_list(slot).unwrap();
//! device.recorder().unwrap().record("clear").unwrap();
//! device.command_submitter_mut().close_command_list().unwrap();
//! device.execute_command_list().unwrap();
//! device.present().unwrap();
//! slot_values[slot] = device.signal().unwrap();
//! ```
//!
//! The *safe* protocol, [begin_frame](GraphicsDevice::begin_frame) and [end_frame](GraphicsDevice::end_frame), does the
//! same and keeps track of the per-slot values itself.

use smallvec::{SmallVec, smallvec};

use crate::{
    BUFFER_COUNT, MIN_BUFFER_COUNT,
    adapter::{Adapter, AdapterSelector},
    backend::{
        AdapterInfo, Backend, FeatureLevel, GpuPreference, InstanceDesc, RawInstance, SwapchainDesc,
        ValidationFeatures,
    },
    command::{CommandList, CommandSubmitter},
    error::{AdapterError, CommandError, DeviceError, FenceError, GinaError, InitStage, SwapchainError},
    fence::Fence,
    resize::ResizeEvents,
    surface::SurfaceHandle,
    swapchain::PresentationSurface,
};

///Configuration of a [GraphicsDevice].
#[derive(Clone, Debug)]
pub struct DeviceDesc {
    pub app_name: String,
    ///Initial client extent of the surface.
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    ///Requests the validation layer. If it is not installed, a warning is logged and creation continues.
    pub validation: bool,
    ///GPU assisted checks enabled together with the validation layer.
    pub gpu_validation: ValidationFeatures,
    ///Skips adapter selection and creates the device on the software adapter.
    pub use_software_device: bool,
    ///Uses the software adapter if no hardware adapter qualifies.
    pub fallback_to_software: bool,
    pub gpu_preference: GpuPreference,
    pub min_feature_level: FeatureLevel,
    ///Requested number of frames in flight. The surface might end up with more.
    pub buffer_count: u32,
}

impl DeviceDesc {
    pub fn new(width: u32, height: u32) -> Self {
        DeviceDesc {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_gpu_validation(mut self, features: ValidationFeatures) -> Self {
        self.gpu_validation = features;
        self
    }

    pub fn with_software_device(mut self) -> Self {
        self.use_software_device = true;
        self
    }

    pub fn with_software_fallback(mut self) -> Self {
        self.fallback_to_software = true;
        self
    }

    pub fn with_gpu_preference(mut self, preference: GpuPreference) -> Self {
        self.gpu_preference = preference;
        self
    }

    pub fn with_min_feature_level(mut self, level: FeatureLevel) -> Self {
        self.min_feature_level = level;
        self
    }

    pub fn with_buffer_count(mut self, count: u32) -> Self {
        self.buffer_count = count;
        self
    }

    ///Changes the description in place. Useful for conditional configuration.
    pub fn with(mut self, mut mapping: impl FnMut(&mut DeviceDesc)) -> Self {
        mapping(&mut self);
        self
    }

    fn validate(&self) -> Result<(), DeviceError> {
        if self.width == 0 || self.height == 0 {
            return Err(DeviceError::InvalidSurfaceSize {
                width: self.width,
                height: self.height,
            });
        }
        if self.buffer_count < MIN_BUFFER_COUNT {
            return Err(DeviceError::InvalidBufferCount(self.buffer_count));
        }
        Ok(())
    }

    fn swapchain_desc(&self) -> SwapchainDesc {
        SwapchainDesc {
            width: self.width,
            height: self.height,
            buffer_count: self.buffer_count,
            vsync: self.vsync,
        }
    }
}

impl Default for DeviceDesc {
    fn default() -> Self {
        DeviceDesc {
            app_name: String::from("gina"),
            width: 1280,
            height: 720,
            vsync: true,
            validation: cfg!(debug_assertions),
            gpu_validation: ValidationFeatures::all(),
            use_software_device: false,
            fallback_to_software: false,
            gpu_preference: GpuPreference::HighPerformance,
            min_feature_level: FeatureLevel::default(),
            buffer_count: BUFFER_COUNT,
        }
    }
}

///Owns the device and all components of the frame loop.
///
/// Dropping the device drains the command queue first, so no component is destroyed while the GPU still uses it.
pub struct GraphicsDevice<B: Backend> {
    //NOTE: Drop order matters. Everything created from the device has to go before the device, the device before
    //      the instance.
    fence: Fence<B>,
    surface: PresentationSurface<B>,
    submitter: CommandSubmitter<B>,
    device: B::Device,
    adapter: AdapterInfo,
    instance: B::Instance,

    desc: DeviceDesc,
    ///Fence value signaled after the last submission of each slot.
    frame_values: SmallVec<[u64; 3]>,
    active_frame: Option<usize>,
}

impl<B: Backend> GraphicsDevice<B> {
    ///Creates the instance for `surface`'s display and everything else on top of it.
    pub fn new(surface: &SurfaceHandle, desc: DeviceDesc) -> Result<Self, DeviceError> {
        desc.validate()?;

        B::declare_capabilities().map_err(DeviceError::init(InitStage::DeclareCapabilities))?;

        let instance = B::Instance::create(&InstanceDesc {
            app_name: desc.app_name.clone(),
            validation: desc.validation,
            gpu_validation: desc.gpu_validation.clone(),
            display: Some(surface.display),
        })
        .map_err(DeviceError::init(InitStage::CreateFactory))?;

        Self::new_from_instance(instance, surface, desc)
    }

    ///Like [new](GraphicsDevice::new), but on an already created instance. `desc.app_name`, `desc.validation` and
    /// `desc.gpu_validation` are ignored.
    pub fn new_from_instance(
        instance: B::Instance,
        surface: &SurfaceHandle,
        desc: DeviceDesc,
    ) -> Result<Self, DeviceError> {
        desc.validate()?;

        let adapter = Self::select_adapter(&instance, &desc)?;

        let device = instance
            .create_device(adapter.raw(), desc.min_feature_level)
            .map_err(DeviceError::init(InitStage::CreateDevice))?;

        #[cfg(feature = "logging")]
        log::info!(
            "Created {} device on {} (feature level {})",
            B::NAME,
            adapter.name(),
            desc.min_feature_level
        );

        let mut submitter = CommandSubmitter::new(&device, desc.buffer_count as usize)?;
        let presentation = PresentationSurface::new(
            &instance,
            &device,
            submitter.queue(),
            surface,
            desc.swapchain_desc(),
        )?;
        //every back buffer index has to be a valid allocator slot
        let buffer_count = presentation.buffer_count() as usize;
        submitter.set_buffer_count(&device, buffer_count)?;

        let fence = Fence::new(&device)?;

        Ok(GraphicsDevice {
            fence,
            surface: presentation,
            submitter,
            device,
            adapter: adapter.info().clone(),
            instance,
            desc,
            frame_values: smallvec![0; buffer_count],
            active_frame: None,
        })
    }

    fn select_adapter(instance: &B::Instance, desc: &DeviceDesc) -> Result<Adapter<B>, DeviceError> {
        if desc.use_software_device {
            return Self::software_adapter(instance);
        }

        let selected = AdapterSelector::<B>::new(instance)
            .min_feature_level(desc.min_feature_level)
            .find_adapter(desc.gpu_preference == GpuPreference::HighPerformance);

        match selected {
            Ok(adapter) => Ok(adapter),
            Err(AdapterError::NotFound) if desc.fallback_to_software => {
                #[cfg(feature = "logging")]
                log::warn!("No hardware adapter found, falling back to software device");
                Self::software_adapter(instance)
            }
            Err(AdapterError::NotFound) => Err(DeviceError::NoAdapter),
            Err(AdapterError::Backend(e)) => Err(DeviceError::init(InitStage::SelectAdapter)(e)),
        }
    }

    fn software_adapter(instance: &B::Instance) -> Result<Adapter<B>, DeviceError> {
        let raw = instance
            .software_adapter()
            .map_err(DeviceError::init(InitStage::SelectAdapter))?;
        match Adapter::from_raw(raw) {
            Ok(adapter) => {
                #[cfg(feature = "logging")]
                log::info!("Using software adapter: {}", adapter.name());
                Ok(adapter)
            }
            Err(AdapterError::Backend(e)) => Err(DeviceError::init(InitStage::SelectAdapter)(e)),
            Err(AdapterError::NotFound) => Err(DeviceError::NoAdapter),
        }
    }

    ///Signals the fence and blocks until the GPU reached the value. Returns the value.
    ///
    /// This serializes CPU and GPU. Use it before resizing or tearing down, not per frame.
    pub fn flush_command_queue(&mut self) -> Result<u64, FenceError> {
        let value = self.fence.signal(self.submitter.queue())?;
        self.fence.wait_on_cpu(value)?;
        Ok(value)
    }

    ///Recreates the back buffers with a new extent. Drains the queue first.
    ///
    /// A zero extent (minimized window) and the current extent are ignored. Returns true if the back buffers were
    /// recreated.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool, GinaError> {
        if width == 0 || height == 0 {
            #[cfg(feature = "logging")]
            log::trace!("Ignoring resize to {}x{}", width, height);
            return Ok(false);
        }
        if (width, height) == self.surface.extent() {
            return Ok(false);
        }
        if let Some(slot) = self.active_frame {
            return Err(CommandError::FrameInProgress(slot).into());
        }

        let drained = self.flush_command_queue()?;
        self.surface.resize(width, height)?;

        let buffer_count = self.surface.buffer_count() as usize;
        self.submitter.set_buffer_count(&self.device, buffer_count)?;
        self.frame_values = smallvec![drained; buffer_count];

        self.desc.width = width;
        self.desc.height = height;
        Ok(true)
    }

    ///Applies the most recent pending resize notification, if any. Call once per frame, outside of
    /// [begin_frame](GraphicsDevice::begin_frame) / [end_frame](GraphicsDevice::end_frame).
    pub fn handle_resize_events(&mut self, events: &ResizeEvents) -> Result<bool, GinaError> {
        match events.latest() {
            Some((width, height)) => self.resize(width, height),
            None => Ok(false),
        }
    }

    ///Starts a frame on the current back buffer's slot. Waits until the GPU retired the slot's previous frame, then
    /// resets its allocator and opens the command list. Returns the slot.
    pub fn begin_frame(&mut self) -> Result<usize, GinaError> {
        if let Some(slot) = self.active_frame {
            return Err(CommandError::FrameInProgress(slot).into());
        }

        let slot = self.surface.current_back_buffer_index() as usize;
        self.fence.wait_on_cpu(self.frame_values[slot])?;
        self.submitter.reset_command_list(slot)?;
        self.active_frame = Some(slot);
        Ok(slot)
    }

    ///Closes and submits the command list, presents and signals the fence. Returns the value that marks the end of
    /// this frame's GPU work.
    ///
    /// The fence is signaled even if closing, submitting or presenting fails. The slot's value then still covers
    /// whatever reached the queue, and the next [begin_frame](GraphicsDevice::begin_frame) on it waits for that work.
    pub fn end_frame(&mut self) -> Result<u64, GinaError> {
        let slot = self.active_frame.take().ok_or(CommandError::NoFrameInProgress)?;

        let submitted = self.submit_frame();
        let signaled = self.fence.signal(self.submitter.queue());
        if let Ok(value) = signaled {
            self.frame_values[slot] = value;
        }

        submitted?;
        Ok(signaled?)
    }

    fn submit_frame(&mut self) -> Result<(), GinaError> {
        self.submitter.close_command_list()?;
        self.submitter.execute_command_list()?;
        self.surface.present(self.submitter.queue())?;
        Ok(())
    }

    ///Slot of the frame between [begin_frame](GraphicsDevice::begin_frame) and [end_frame](GraphicsDevice::end_frame).
    pub fn active_frame(&self) -> Option<usize> {
        self.active_frame
    }

    ///Fence value the given slot has to reach before it can be reused.
    ///
    /// # Panics
    ///
    /// If `slot` is not smaller than [buffer_count](GraphicsDevice::buffer_count).
    pub fn frame_value(&self, slot: usize) -> u64 {
        assert!(
            slot < self.frame_values.len(),
            "Frame slot {} out of bounds ({} slots)",
            slot,
            self.frame_values.len()
        );
        self.frame_values[slot]
    }

    ///Access to the command list for recording.
    pub fn recorder(&mut self) -> Result<&mut B::CommandList, CommandError> {
        self.submitter.command_list_mut().recorder()
    }

    pub fn command_list(&self) -> &CommandList<B> {
        self.submitter.command_list()
    }

    ///Submits the closed command list.
    pub fn execute_command_list(&self) -> Result<(), CommandError> {
        self.submitter.execute_command_list()
    }

    ///Presents the current back buffer on the device's queue.
    pub fn present(&mut self) -> Result<(), SwapchainError> {
        self.surface.present(self.submitter.queue())
    }

    ///Signals the fence on the device's queue.
    pub fn signal(&mut self) -> Result<u64, FenceError> {
        self.fence.signal(self.submitter.queue())
    }

    pub fn current_back_buffer_index(&self) -> usize {
        self.surface.current_back_buffer_index() as usize
    }

    ///Number of frames in flight. Equals the number of back buffers and of command allocators.
    pub fn buffer_count(&self) -> usize {
        self.submitter.buffer_count()
    }

    pub fn instance(&self) -> &B::Instance {
        &self.instance
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.adapter
    }

    pub fn queue(&self) -> &B::Queue {
        self.submitter.queue()
    }

    pub fn command_submitter(&self) -> &CommandSubmitter<B> {
        &self.submitter
    }

    pub fn command_submitter_mut(&mut self) -> &mut CommandSubmitter<B> {
        &mut self.submitter
    }

    pub fn presentation_surface(&self) -> &PresentationSurface<B> {
        &self.surface
    }

    pub fn fence(&self) -> &Fence<B> {
        &self.fence
    }

    pub fn desc(&self) -> &DeviceDesc {
        &self.desc
    }
}

impl<B: Backend> Drop for GraphicsDevice<B> {
    fn drop(&mut self) {
        #[cfg(feature = "logging")]
        log::trace!("Draining command queue before destroying device");

        if let Err(_e) = self.flush_command_queue() {
            #[cfg(feature = "logging")]
            log::error!("Failed to drain command queue on drop: {}", _e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        ValidationFeature,
        sim::{ExecutionMode, GpuEvent, SimAdapterDesc, SimBackend, SimInstance},
    };
    use raw_window_handle::{RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle};
    use static_assertions::assert_impl_all;

    fn handle() -> SurfaceHandle {
        SurfaceHandle::new(
            RawWindowHandle::Xlib(XlibWindowHandle::new(7)),
            RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
        )
    }

    fn commands(device: &GraphicsDevice<SimBackend>) -> usize {
        device
            .device()
            .gpu()
            .timeline()
            .iter()
            .filter(|event| matches!(event, GpuEvent::Command(_)))
            .count()
    }

    #[test]
    fn impl_send() {
        assert_impl_all!(GraphicsDevice<SimBackend>: Send);
        assert_impl_all!(DeviceDesc: Send, Sync);
    }

    #[test]
    fn desc_defaults() {
        let desc = DeviceDesc::default();
        assert!(desc.vsync);
        assert_eq!(desc.buffer_count, BUFFER_COUNT);
        assert!(!desc.use_software_device);
        assert_eq!(desc.min_feature_level, FeatureLevel::V1_2);

        let desc = DeviceDesc::new(640, 480).with(|d| d.vsync = false);
        assert_eq!((desc.width, desc.height, desc.vsync), (640, 480, false));
    }

    #[test]
    fn invalid_desc_is_rejected() {
        assert!(matches!(
            GraphicsDevice::<SimBackend>::new(&handle(), DeviceDesc::new(0, 720)),
            Err(DeviceError::InvalidSurfaceSize { width: 0, height: 720 })
        ));
        assert!(matches!(
            GraphicsDevice::<SimBackend>::new(&handle(), DeviceDesc::new(1280, 720).with_buffer_count(1)),
            Err(DeviceError::InvalidBufferCount(1))
        ));
    }

    #[test]
    fn initial_state() {
        let device = GraphicsDevice::<SimBackend>::new(&handle(), DeviceDesc::new(1280, 720)).unwrap();
        assert_eq!(device.buffer_count(), 2);
        assert_eq!(device.presentation_surface().buffer_count(), 2);
        assert_eq!(device.fence().current_value(), 0);
        assert_eq!(device.fence().completed_value(), 0);
        assert_eq!(device.current_back_buffer_index(), 0);
        assert!(!device.adapter_info().is_software);
    }

    #[test]
    fn no_hardware_adapter() {
        let software_only = || {
            SimInstance::builder()
                .with_adapter(SimAdapterDesc::software("warp"))
                .build()
        };

        assert!(matches!(
            GraphicsDevice::<SimBackend>::new_from_instance(
                software_only(),
                &handle(),
                DeviceDesc::default()
            ),
            Err(DeviceError::NoAdapter)
        ));

        let device = GraphicsDevice::<SimBackend>::new_from_instance(
            software_only(),
            &handle(),
            DeviceDesc::default().with_software_fallback(),
        )
        .unwrap();
        assert!(device.adapter_info().is_software);
    }

    #[test]
    fn forced_software_device() {
        let device = GraphicsDevice::<SimBackend>::new(
            &handle(),
            DeviceDesc::default().with_software_device(),
        )
        .unwrap();
        assert!(device.adapter_info().is_software);

        let no_software = SimInstance::builder()
            .with_adapter(SimAdapterDesc::discrete("dgpu"))
            .build();
        assert!(matches!(
            GraphicsDevice::<SimBackend>::new_from_instance(
                no_software,
                &handle(),
                DeviceDesc::default().with_software_device()
            ),
            Err(DeviceError::Init {
                stage: InitStage::SelectAdapter,
                ..
            })
        ));
    }

    #[test]
    fn flush_is_idempotent() {
        let mut device = GraphicsDevice::<SimBackend>::new(&handle(), DeviceDesc::default()).unwrap();
        device.begin_frame().unwrap();
        device.recorder().unwrap().record("draw").unwrap();
        device.end_frame().unwrap();

        let first = device.flush_command_queue().unwrap();
        assert_eq!(device.fence().completed_value(), first);
        let executed = commands(&device);

        let second = device.flush_command_queue().unwrap();
        assert_eq!(device.fence().completed_value(), second);
        assert_eq!(device.fence().current_value(), second);
        assert_eq!(commands(&device), executed);
    }

    #[test]
    fn frames_are_paired() {
        let mut device = GraphicsDevice::<SimBackend>::new(&handle(), DeviceDesc::default()).unwrap();
        assert!(matches!(
            device.end_frame(),
            Err(GinaError::CommandError(CommandError::NoFrameInProgress))
        ));

        let slot = device.begin_frame().unwrap();
        assert!(matches!(
            device.begin_frame(),
            Err(GinaError::CommandError(CommandError::FrameInProgress(s))) if s == slot
        ));
        assert_eq!(device.active_frame(), Some(slot));
        device.end_frame().unwrap();
        assert_eq!(device.active_frame(), None);
    }

    #[test]
    fn begin_frame_waits_for_slot() {
        let instance = SimInstance::builder()
            .execution_mode(ExecutionMode::Manual)
            .build();
        let mut device =
            GraphicsDevice::<SimBackend>::new_from_instance(instance, &handle(), DeviceDesc::default())
                .unwrap();
        let gpu = device.device().gpu().clone();
        let _immediate = gpu.immediate_on_drop();

        for _ in 0..2 {
            device.begin_frame().unwrap();
            device.end_frame().unwrap();
        }
        assert_eq!(device.frame_value(0), 1);
        assert_eq!(device.frame_value(1), 2);

        //slot 0 is reused by the third frame, its value has to retire first
        std::thread::scope(|s| {
            s.spawn(|| {
                std::thread::sleep(std::time::Duration::from_millis(20));
                gpu.run_until_stalled();
            });
            assert_eq!(device.begin_frame().unwrap(), 0);
            assert!(device.fence().is_complete(1));
        });
        device.end_frame().unwrap();
    }

    #[test]
    fn failed_end_frame_still_guards_slot() {
        let instance = SimInstance::builder()
            .execution_mode(ExecutionMode::Manual)
            .build();
        let mut device =
            GraphicsDevice::<SimBackend>::new_from_instance(instance, &handle(), DeviceDesc::default())
                .unwrap();
        let gpu = device.device().gpu().clone();
        let _immediate = gpu.immediate_on_drop();

        let slot = device.begin_frame().unwrap();
        device.recorder().unwrap().record("draw").unwrap();
        //submitted behind the protocol's back, so end_frame fails after the work reached the queue
        device.command_submitter_mut().close_command_list().unwrap();
        device.execute_command_list().unwrap();
        assert!(matches!(
            device.end_frame(),
            Err(GinaError::CommandError(CommandError::ListNotRecording))
        ));

        assert_eq!(device.active_frame(), None);
        assert_eq!(device.frame_value(slot), device.fence().current_value());
        assert!(!device.fence().is_complete(device.frame_value(slot)));

        //nothing was presented, so the next frame reuses the slot and has to wait for the submitted work
        std::thread::scope(|s| {
            s.spawn(|| {
                std::thread::sleep(std::time::Duration::from_millis(20));
                gpu.run_until_stalled();
            });
            assert_eq!(device.begin_frame().unwrap(), slot);
        });
        assert_eq!(commands(&device), 1);
        device.end_frame().unwrap();
    }

    #[test]
    #[should_panic]
    fn frame_value_out_of_range_panics() {
        let device = GraphicsDevice::<SimBackend>::new(&handle(), DeviceDesc::default()).unwrap();
        device.frame_value(device.buffer_count());
    }

    #[test]
    fn gpu_validation_is_forwarded() {
        let device = GraphicsDevice::<SimBackend>::new(
            &handle(),
            DeviceDesc::default().with_validation(true),
        )
        .unwrap();
        assert!(device.instance().validation_enabled());
        assert!(device
            .instance()
            .validation_features()
            .contains(ValidationFeature::GpuAssisted));

        let device = GraphicsDevice::<SimBackend>::new(
            &handle(),
            DeviceDesc::default()
                .with_validation(true)
                .with_gpu_validation(ValidationFeatures::none()),
        )
        .unwrap();
        assert!(device.instance().validation_enabled());
        assert!(device.instance().validation_features().is_empty());
    }

    #[test]
    fn resize_recreates_surface() {
        let mut device = GraphicsDevice::<SimBackend>::new(&handle(), DeviceDesc::default()).unwrap();
        device.begin_frame().unwrap();
        device.end_frame().unwrap();

        assert!(!device.resize(0, 0).unwrap());
        assert!(!device.resize(1280, 720).unwrap());
        assert!(device.resize(800, 600).unwrap());
        assert_eq!(device.presentation_surface().extent(), (800, 600));
        assert_eq!(device.current_back_buffer_index(), 0);
        assert_eq!(device.fence().completed_value(), device.fence().current_value());

        device.begin_frame().unwrap();
        assert!(matches!(
            device.resize(640, 480),
            Err(GinaError::CommandError(CommandError::FrameInProgress(_)))
        ));
        device.end_frame().unwrap();
    }

    #[test]
    fn resize_events_apply_latest() {
        let mut device = GraphicsDevice::<SimBackend>::new(&handle(), DeviceDesc::default()).unwrap();
        let (notifier, events) = crate::resize::channel();

        assert!(!device.handle_resize_events(&events).unwrap());
        notifier.on_resize(300, 200);
        notifier.on_resize(1024, 768);
        assert!(device.handle_resize_events(&events).unwrap());
        assert_eq!(device.presentation_surface().extent(), (1024, 768));
        assert_eq!(device.desc().width, 1024);
    }

    #[test]
    fn drop_survives_lost_device() {
        let device = GraphicsDevice::<SimBackend>::new(&handle(), DeviceDesc::default()).unwrap();
        device.device().gpu().lose_device();
        drop(device);
    }
}
