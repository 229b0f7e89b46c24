//! # Resize notifications
//!
//! The device does not poll the window for its size. The windowing side holds a [ResizeNotifier] and reports every
//! new client extent, the device drains the matching [ResizeEvents] once per frame via
//! [GraphicsDevice::handle_resize_events](crate::GraphicsDevice::handle_resize_events).
//!
//! ```
//! let (notifier, events) = gina::resize::channel();
//! notifier.on_resize(800, 600);
//! notifier.on_resize(1024, 768);
//! assert_eq!(events.latest(), Some((1024, 768)));
//! assert_eq!(events.latest(), None);
//! ```

///Creates a connected notifier / receiver pair.
pub fn channel() -> (ResizeNotifier, ResizeEvents) {
    let (sender, receiver) = flume::unbounded();
    (ResizeNotifier { sender }, ResizeEvents { receiver })
}

///Window side of the channel. Cheap to clone, one clone per observer.
#[derive(Clone, Debug)]
pub struct ResizeNotifier {
    sender: flume::Sender<(u32, u32)>,
}

impl ResizeNotifier {
    ///Reports a new client extent. Returns false if the receiving side was dropped.
    pub fn on_resize(&self, width: u32, height: u32) -> bool {
        self.sender.send((width, height)).is_ok()
    }
}

///Device side of the channel.
#[derive(Debug)]
pub struct ResizeEvents {
    receiver: flume::Receiver<(u32, u32)>,
}

impl ResizeEvents {
    ///Drains all pending notifications and returns the most recent one. Intermediate sizes of a drag are dropped.
    pub fn latest(&self) -> Option<(u32, u32)> {
        self.receiver.try_iter().last()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    #[test]
    fn impl_send_sync() {
        assert_impl_all!(ResizeNotifier: Send, Sync, Clone);
        assert_impl_all!(ResizeEvents: Send, Sync);
    }

    #[test]
    fn notifications_cross_threads() {
        let (notifier, events) = channel();
        std::thread::scope(|s| {
            for i in 1..=4u32 {
                let notifier = notifier.clone();
                s.spawn(move || assert!(notifier.on_resize(i * 100, i * 50)));
            }
        });

        assert!(!events.is_empty());
        assert!(events.latest().is_some());
        assert!(events.is_empty());
    }

    #[test]
    fn dropped_receiver_is_reported() {
        let (notifier, events) = channel();
        drop(events);
        assert!(!notifier.on_resize(1, 1));
    }
}
