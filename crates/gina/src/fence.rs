//! # Fence
//!
//! A fence is a single monotonically increasing 64 bit counter shared by CPU and GPU. The CPU hands out values via
//! [signal](Fence::signal), which also enqueues a GPU side write of that value on a queue. Since the queue executes in
//! order, the value becomes visible through [completed_value](Fence::completed_value) only after everything submitted
//! before the signal finished.
//!
//! That gives the two ordering primitives the frame loop is built on:
//!
//! - [wait_on_cpu](Fence::wait_on_cpu): block the calling thread until the GPU reached a value. The only blocking operation
//!   of the crate.
//! - [wait_on_gpu](Fence::wait_on_gpu): let a queue wait for a value without involving the CPU. Used to order work
//!   between two queues.
//!
//! Note that a lost device never reaches any value. [wait_on_cpu](Fence::wait_on_cpu) relies on the backend to report
//! the loss. Use [wait_on_cpu_timeout](Fence::wait_on_cpu_timeout) where a hung GPU must not stall the caller.

use std::time::Duration;

use crate::{
    backend::{Backend, RawDevice, RawFence, RawQueue},
    error::{BackendError, DeviceError, FenceError, InitStage},
};

pub struct Fence<B: Backend> {
    inner: B::Fence,
    ///Last value handed out by `signal`.
    current_value: u64,
}

impl<B: Backend> Fence<B> {
    ///Creates the fence with a counter of 0.
    pub fn new(device: &B::Device) -> Result<Self, DeviceError> {
        let inner = device
            .create_fence(0)
            .map_err(DeviceError::init(InitStage::CreateFence))?;
        let fence = Fence {
            inner,
            current_value: 0,
        };

        #[cfg(feature = "logging")]
        log::info!("Fence initialized (current value: {})", fence.current_value);

        Ok(fence)
    }

    ///Increments the counter and enqueues the write of the new value on `queue`. Returns the new value.
    ///
    /// If enqueuing fails the counter is left untouched, so values stay gapless.
    pub fn signal(&mut self, queue: &B::Queue) -> Result<u64, FenceError> {
        let value = self.current_value + 1;
        queue
            .signal(&self.inner, value)
            .map_err(|e| Self::map_err(e, value))?;
        self.current_value = value;
        Ok(value)
    }

    ///Blocks until the GPU reached `value`. Returns immediately if it already did.
    ///
    /// # Note
    ///
    /// There is no timeout. If the GPU hangs without the backend reporting a device loss, this never returns.
    pub fn wait_on_cpu(&self, value: u64) -> Result<(), FenceError> {
        //NOTE: no shortcut via completed_value, it reads u64::MAX on a lost device. The backend reports the loss.
        match self.inner.wait(value, None) {
            Ok(_) => Ok(()),
            Err(e) => Err(Self::map_err(e, value)),
        }
    }

    ///Same as [wait_on_cpu](Fence::wait_on_cpu), but gives up after `timeout`.
    pub fn wait_on_cpu_timeout(&self, value: u64, timeout: Duration) -> Result<(), FenceError> {
        match self.inner.wait(value, Some(timeout)) {
            Ok(true) => Ok(()),
            Ok(false) => {
                let completed = self.completed_value();
                #[cfg(feature = "logging")]
                log::warn!(
                    "Timed out after {:?} waiting for fence value {} (completed: {})",
                    timeout,
                    value,
                    completed
                );
                Err(FenceError::Timeout { value, completed })
            }
            Err(e) => Err(Self::map_err(e, value)),
        }
    }

    ///Makes `queue` wait until the fence reached `value` before it executes anything enqueued after this call. Does
    /// not block the CPU.
    pub fn wait_on_gpu(&self, queue: &B::Queue, value: u64) -> Result<(), FenceError> {
        queue
            .wait(&self.inner, value)
            .map_err(|e| Self::map_err(e, value))
    }

    ///The last value the GPU confirmed. Never decreases. Reads `u64::MAX` once the device is lost.
    pub fn completed_value(&self) -> u64 {
        self.inner.completed_value()
    }

    ///The last value returned by [signal](Fence::signal).
    pub fn current_value(&self) -> u64 {
        self.current_value
    }

    pub fn is_complete(&self, value: u64) -> bool {
        self.completed_value() >= value
    }

    pub fn raw(&self) -> &B::Fence {
        &self.inner
    }

    fn map_err(error: BackendError, value: u64) -> FenceError {
        match error {
            BackendError::DeviceLost => {
                #[cfg(feature = "logging")]
                log::error!("Device lost while waiting for fence value {}", value);
                FenceError::DeviceLost(value)
            }
            e => {
                #[cfg(feature = "logging")]
                log::error!("Fence operation for value {} failed: {}", value, e);
                FenceError::Backend(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        GpuPreference, RawInstance,
        sim::{ExecutionMode, SimBackend, SimDevice, SimInstance, SimQueue},
    };
    use static_assertions::assert_impl_all;

    fn device(mode: ExecutionMode) -> (SimDevice, SimQueue) {
        let instance = SimInstance::builder().execution_mode(mode).build();
        let adapter = instance
            .enumerate_adapters(GpuPreference::HighPerformance)
            .unwrap()
            .remove(0);
        let device = instance
            .create_device(&adapter, Default::default())
            .unwrap();
        let queue = device.create_queue().unwrap();
        (device, queue)
    }

    #[test]
    fn impl_send_sync() {
        assert_impl_all!(Fence<SimBackend>: Send, Sync);
    }

    #[test]
    fn signal_is_gapless() {
        let (device, queue) = device(ExecutionMode::Manual);
        let mut fence = Fence::<SimBackend>::new(&device).unwrap();
        assert_eq!(fence.current_value(), 0);
        assert_eq!(fence.completed_value(), 0);

        let values = (0..3)
            .map(|_| fence.signal(&queue).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(values, [1, 2, 3]);
        //nothing retired yet
        assert_eq!(fence.completed_value(), 0);

        device.gpu().run_until_stalled();
        assert_eq!(fence.completed_value(), 3);
    }

    #[test]
    fn failed_signal_keeps_counter() {
        let (device, queue) = device(ExecutionMode::Immediate);
        let mut fence = Fence::<SimBackend>::new(&device).unwrap();
        assert_eq!(fence.signal(&queue).unwrap(), 1);

        device.gpu().lose_device();
        assert!(matches!(fence.signal(&queue), Err(FenceError::DeviceLost(2))));
        assert_eq!(fence.current_value(), 1);
    }

    #[test]
    fn wait_on_completed_value_returns() {
        let (device, queue) = device(ExecutionMode::Immediate);
        let mut fence = Fence::<SimBackend>::new(&device).unwrap();
        let value = fence.signal(&queue).unwrap();
        fence.wait_on_cpu(value).unwrap();
        assert!(fence.is_complete(value));
    }

    #[test]
    fn timeout_reports_completed_value() {
        let (device, queue) = device(ExecutionMode::Manual);
        let mut fence = Fence::<SimBackend>::new(&device).unwrap();
        fence.signal(&queue).unwrap();
        fence.signal(&queue).unwrap();
        device.gpu().step();

        match fence.wait_on_cpu_timeout(2, Duration::from_millis(5)) {
            Err(FenceError::Timeout { value, completed }) => {
                assert_eq!(value, 2);
                assert_eq!(completed, 1);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn gpu_wait_orders_queues() {
        let (device, producer) = device(ExecutionMode::Manual);
        let consumer = device.create_queue().unwrap();
        let mut fence = Fence::<SimBackend>::new(&device).unwrap();
        let mut consumer_fence = Fence::<SimBackend>::new(&device).unwrap();

        fence.wait_on_gpu(&consumer, 1).unwrap();
        let done = consumer_fence.signal(&consumer).unwrap();
        //the consumer can't make progress before the producer signaled
        device.gpu().run_until_stalled();
        assert!(!consumer_fence.is_complete(done));

        fence.signal(&producer).unwrap();
        device.gpu().run_until_stalled();
        assert!(consumer_fence.is_complete(done));
    }
}
