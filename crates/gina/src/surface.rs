use raw_window_handle::{
    HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle,
};

///Native window and display a [PresentationSurface](crate::PresentationSurface) presents to. Usually taken from the
/// windowing layer via [from_window](SurfaceHandle::from_window).
///
/// The handles are only borrowed for surface creation. The window has to outlive the graphics device.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceHandle {
    pub window: RawWindowHandle,
    pub display: RawDisplayHandle,
}

impl SurfaceHandle {
    pub fn new(window: RawWindowHandle, display: RawDisplayHandle) -> Self {
        SurfaceHandle { window, display }
    }

    pub fn from_window<T>(window: &T) -> Result<Self, HandleError>
    where
        T: HasWindowHandle + HasDisplayHandle,
    {
        Ok(SurfaceHandle {
            window: window.window_handle()?.as_raw(),
            display: window.display_handle()?.as_raw(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{XlibDisplayHandle, XlibWindowHandle};

    #[test]
    fn keeps_raw_handles() {
        let handle = SurfaceHandle::new(
            RawWindowHandle::Xlib(XlibWindowHandle::new(42)),
            RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
        );
        match handle.window {
            RawWindowHandle::Xlib(h) => assert_eq!(h.window, 42),
            _ => panic!("unexpected window handle"),
        }
    }
}
