use crate::{
    backend::{Backend, RawInstance, RawSwapchain, SwapchainDesc},
    error::{DeviceError, InitStage, SwapchainError},
    surface::SurfaceHandle,
};

///Owns the back buffers of a native surface and hands them to the display.
///
/// The current back buffer index is advanced by [present](PresentationSurface::present), never by the application. It
/// selects both the render target and the command allocator slot of a frame.
pub struct PresentationSurface<B: Backend> {
    inner: B::Swapchain,
    desc: SwapchainDesc,
}

impl<B: Backend> PresentationSurface<B> {
    ///Creates `desc.buffer_count` back buffers for `surface` that present through `queue`. Tearing is allowed if vsync
    /// is disabled.
    pub fn new(
        instance: &B::Instance,
        device: &B::Device,
        queue: &B::Queue,
        surface: &SurfaceHandle,
        desc: SwapchainDesc,
    ) -> Result<Self, DeviceError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(DeviceError::InvalidSurfaceSize {
                width: desc.width,
                height: desc.height,
            });
        }

        let inner = instance
            .create_swapchain(device, queue, surface, &desc)
            .map_err(DeviceError::init(InitStage::CreateSwapchain))?;

        #[cfg(feature = "logging")]
        log::info!(
            "Swap chain initialized ({}x{}, {} buffers, VSync: {})",
            desc.width,
            desc.height,
            inner.buffer_count(),
            if desc.vsync { "On" } else { "Off" }
        );

        Ok(PresentationSurface { inner, desc })
    }

    pub fn current_back_buffer_index(&self) -> u32 {
        self.inner.current_back_buffer_index()
    }

    ///Number of back buffers the backend actually created. Can differ from the requested count.
    pub fn buffer_count(&self) -> u32 {
        self.inner.buffer_count()
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    pub fn vsync(&self) -> bool {
        self.desc.vsync
    }

    pub fn desc(&self) -> &SwapchainDesc {
        &self.desc
    }

    ///Enqueues presentation of the current back buffer on `queue`, which has to be the queue the surface was created
    /// with.
    pub fn present(&mut self, queue: &B::Queue) -> Result<(), SwapchainError> {
        self.inner
            .present(queue, self.desc.present_mode())
            .map_err(|e| {
                #[cfg(feature = "logging")]
                log::error!("Error while presenting back buffer: {}", e);
                SwapchainError::from(e)
            })
    }

    ///Recreates the back buffers for a new extent. All GPU work referencing them must be drained.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), SwapchainError> {
        if width == 0 || height == 0 {
            return Err(SwapchainError::InvalidSize { width, height });
        }

        self.inner.resize(width, height)?;
        self.desc.width = width;
        self.desc.height = height;

        #[cfg(feature = "logging")]
        log::info!("Resized swap chain to {}x{}", width, height);

        Ok(())
    }

    pub fn raw(&self) -> &B::Swapchain {
        &self.inner
    }

    pub fn raw_mut(&mut self) -> &mut B::Swapchain {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        GpuPreference, RawDevice,
        sim::{ExecutionMode, GpuEvent, SimBackend, SimInstance},
    };
    use raw_window_handle::{RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle};

    fn surface_handle() -> SurfaceHandle {
        SurfaceHandle::new(
            RawWindowHandle::Xlib(XlibWindowHandle::new(1)),
            RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
        )
    }

    fn desc(buffer_count: u32, vsync: bool) -> SwapchainDesc {
        SwapchainDesc {
            width: 1280,
            height: 720,
            buffer_count,
            vsync,
        }
    }

    #[test]
    fn index_cycles_with_buffer_count() {
        let instance = SimInstance::builder()
            .execution_mode(ExecutionMode::Immediate)
            .build();
        let adapter = instance
            .enumerate_adapters(GpuPreference::HighPerformance)
            .unwrap()
            .remove(0);
        let device = instance.create_device(&adapter, Default::default()).unwrap();
        let queue = device.create_queue().unwrap();

        for count in [2u32, 3] {
            let mut surface = PresentationSurface::<SimBackend>::new(
                &instance,
                &device,
                &queue,
                &surface_handle(),
                desc(count, true),
            )
            .unwrap();
            assert_eq!(surface.buffer_count(), count);

            let seen = (0..count * 2)
                .map(|_| {
                    let index = surface.current_back_buffer_index();
                    surface.present(&queue).unwrap();
                    index
                })
                .collect::<Vec<_>>();
            let expected = (0..count * 2).map(|i| i % count).collect::<Vec<_>>();
            assert_eq!(seen, expected);
        }

        assert!(
            device
                .gpu()
                .timeline()
                .iter()
                .all(|event| matches!(event, GpuEvent::Present(_)))
        );
    }

    #[test]
    fn tearing_follows_vsync() {
        let instance = SimInstance::builder().build();
        let adapter = instance
            .enumerate_adapters(GpuPreference::HighPerformance)
            .unwrap()
            .remove(0);
        let device = instance.create_device(&adapter, Default::default()).unwrap();
        let queue = device.create_queue().unwrap();

        let vsync = PresentationSurface::<SimBackend>::new(
            &instance,
            &device,
            &queue,
            &surface_handle(),
            desc(2, true),
        )
        .unwrap();
        assert!(!vsync.raw().allows_tearing());

        let mut tearing = PresentationSurface::<SimBackend>::new(
            &instance,
            &device,
            &queue,
            &surface_handle(),
            desc(2, false),
        )
        .unwrap();
        assert!(tearing.raw().allows_tearing());
        tearing.present(&queue).unwrap();
    }

    #[test]
    fn zero_sized_surface_is_rejected() {
        let instance = SimInstance::builder().build();
        let adapter = instance
            .enumerate_adapters(GpuPreference::HighPerformance)
            .unwrap()
            .remove(0);
        let device = instance.create_device(&adapter, Default::default()).unwrap();
        let queue = device.create_queue().unwrap();

        let mut zero = desc(2, true);
        zero.height = 0;
        assert!(matches!(
            PresentationSurface::<SimBackend>::new(&instance, &device, &queue, &surface_handle(), zero),
            Err(DeviceError::InvalidSurfaceSize { width: 1280, height: 0 })
        ));

        let mut surface = PresentationSurface::<SimBackend>::new(
            &instance,
            &device,
            &queue,
            &surface_handle(),
            desc(2, true),
        )
        .unwrap();
        assert!(matches!(
            surface.resize(0, 10),
            Err(SwapchainError::InvalidSize { .. })
        ));
        surface.resize(640, 480).unwrap();
        assert_eq!(surface.extent(), (640, 480));
        assert_eq!(surface.current_back_buffer_index(), 0);
    }
}
