use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use crate::error::BackendError;

///When queued work retires on the simulated GPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    ///Work retires as soon as it is runnable, i.e. during the call that enqueued it.
    Immediate,
    ///Work only retires when the harness calls [SimGpu::step] or [SimGpu::run_until_stalled].
    Manual,
}

///Something the simulated GPU finished. See [SimGpu::timeline].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GpuEvent {
    ///A recorded command of an executed command list.
    Command(String),
    Signal { fence: usize, value: u64 },
    Present(u32),
}

pub(crate) enum GpuOp {
    Execute {
        allocators: Vec<usize>,
        commands: Vec<String>,
    },
    Signal {
        fence: usize,
        value: u64,
    },
    Wait {
        fence: usize,
        value: u64,
    },
    Present {
        buffer: u32,
    },
}

pub(crate) struct GpuState {
    mode: ExecutionMode,
    lost: bool,
    queues: Vec<VecDeque<GpuOp>>,
    fences: Vec<u64>,
    allocators_in_flight: Vec<u32>,
    timeline: Vec<GpuEvent>,
}

impl GpuState {
    fn is_runnable(&self, queue: usize) -> bool {
        match self.queues[queue].front() {
            None => false,
            Some(GpuOp::Wait { fence, value }) => self.fences[*fence] >= *value,
            Some(_) => true,
        }
    }

    fn retire_front(&mut self, queue: usize) -> bool {
        if !self.is_runnable(queue) {
            return false;
        }
        let Some(op) = self.queues[queue].pop_front() else {
            return false;
        };

        match op {
            GpuOp::Execute {
                allocators,
                commands,
            } => {
                for allocator in allocators {
                    self.allocators_in_flight[allocator] -= 1;
                }
                self.timeline
                    .extend(commands.into_iter().map(GpuEvent::Command));
            }
            GpuOp::Signal { fence, value } => {
                self.fences[fence] = self.fences[fence].max(value);
                self.timeline.push(GpuEvent::Signal { fence, value });
            }
            GpuOp::Wait { .. } => {}
            GpuOp::Present { buffer } => self.timeline.push(GpuEvent::Present(buffer)),
        }
        true
    }

    ///Retires everything that can be retired. A queue stalled on a wait is revisited once another queue made progress.
    fn pump(&mut self) -> usize {
        let mut retired = 0;
        loop {
            let mut progress = false;
            for queue in 0..self.queues.len() {
                while self.retire_front(queue) {
                    retired += 1;
                    progress = true;
                }
            }
            if !progress {
                return retired;
            }
        }
    }

    fn step(&mut self) -> bool {
        (0..self.queues.len()).any(|queue| self.retire_front(queue))
    }
}

struct GpuShared {
    state: Mutex<GpuState>,
    retired: Condvar,
}

///Handle to the simulated GPU of one [SimDevice](super::SimDevice). Cloning the handle refers to the same GPU.
///
/// Queues, fences and allocators of the device register themselves here. Each queue is a FIFO of operations that
/// retire strictly in order. A queue-side wait only blocks its own queue.
#[derive(Clone)]
pub struct SimGpu {
    shared: Arc<GpuShared>,
}

///See [SimGpu::immediate_on_drop].
#[must_use = "the GPU switches to immediate execution as soon as the guard is dropped"]
pub struct ImmediateOnDrop {
    gpu: SimGpu,
}

impl Drop for ImmediateOnDrop {
    fn drop(&mut self) {
        self.gpu.set_mode(ExecutionMode::Immediate);
    }
}

impl SimGpu {
    pub(crate) fn new(mode: ExecutionMode) -> Self {
        SimGpu {
            shared: Arc::new(GpuShared {
                state: Mutex::new(GpuState {
                    mode,
                    lost: false,
                    queues: Vec::new(),
                    fences: Vec::new(),
                    allocators_in_flight: Vec::new(),
                    timeline: Vec::new(),
                }),
                retired: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GpuState> {
        //Note: the state stays consistent across a panicking holder, so poisoning is ignored.
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register_queue(&self) -> usize {
        let mut state = self.lock();
        state.queues.push(VecDeque::new());
        state.queues.len() - 1
    }

    pub(crate) fn register_fence(&self, initial_value: u64) -> usize {
        let mut state = self.lock();
        state.fences.push(initial_value);
        state.fences.len() - 1
    }

    pub(crate) fn register_allocator(&self) -> usize {
        let mut state = self.lock();
        state.allocators_in_flight.push(0);
        state.allocators_in_flight.len() - 1
    }

    pub(crate) fn enqueue(&self, queue: usize, op: GpuOp) -> Result<(), BackendError> {
        let mut state = self.lock();
        if state.lost {
            return Err(BackendError::DeviceLost);
        }
        if let GpuOp::Execute { allocators, .. } = &op {
            for allocator in allocators {
                state.allocators_in_flight[*allocator] += 1;
            }
        }
        state.queues[queue].push_back(op);

        if state.mode == ExecutionMode::Immediate && state.pump() > 0 {
            self.shared.retired.notify_all();
        }
        Ok(())
    }

    pub(crate) fn allocator_in_flight(&self, allocator: usize) -> u32 {
        self.lock().allocators_in_flight[allocator]
    }

    pub(crate) fn fence_value(&self, fence: usize) -> u64 {
        let state = self.lock();
        if state.lost {
            u64::MAX
        } else {
            state.fences[fence]
        }
    }

    pub(crate) fn wait_fence(
        &self,
        fence: usize,
        value: u64,
        timeout: Option<Duration>,
    ) -> Result<bool, BackendError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();
        loop {
            if state.lost {
                return Err(BackendError::DeviceLost);
            }
            if state.fences[fence] >= value {
                return Ok(true);
            }

            state = match deadline {
                None => self
                    .shared
                    .retired
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    self.shared
                        .retired
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.lock().mode
    }

    ///Switches the execution mode. Switching to [Immediate](ExecutionMode::Immediate) retires everything runnable right
    /// away.
    pub fn set_mode(&self, mode: ExecutionMode) {
        let mut state = self.lock();
        state.mode = mode;
        if mode == ExecutionMode::Immediate && !state.lost && state.pump() > 0 {
            self.shared.retired.notify_all();
        }
    }

    ///Returns a guard that switches this GPU to [Immediate](ExecutionMode::Immediate) when it is dropped, including
    /// while unwinding. Declare it after the device that drives a [Manual](ExecutionMode::Manual) GPU, so the device's
    /// drop flush finds everything retired.
    pub fn immediate_on_drop(&self) -> ImmediateOnDrop {
        ImmediateOnDrop { gpu: self.clone() }
    }

    ///Retires the next runnable operation of the first queue that has one. Returns false if every queue is empty or
    /// stalled.
    pub fn step(&self) -> bool {
        let mut state = self.lock();
        if state.lost {
            return false;
        }
        let stepped = state.step();
        if stepped {
            self.shared.retired.notify_all();
        }
        stepped
    }

    ///Retires operations until no queue can make progress. Returns how many were retired.
    pub fn run_until_stalled(&self) -> usize {
        let mut state = self.lock();
        if state.lost {
            return 0;
        }
        let retired = state.pump();
        if retired > 0 {
            self.shared.retired.notify_all();
        }
        retired
    }

    ///Number of operations that are queued but not retired yet, over all queues.
    pub fn pending(&self) -> usize {
        self.lock().queues.iter().map(VecDeque::len).sum()
    }

    ///Everything the GPU retired so far, in retirement order.
    pub fn timeline(&self) -> Vec<GpuEvent> {
        self.lock().timeline.clone()
    }

    ///Simulates device removal. Queued work is dropped, every later operation fails with
    /// [DeviceLost](BackendError::DeviceLost) and blocked CPU waits return.
    pub fn lose_device(&self) {
        let mut state = self.lock();
        state.lost = true;
        state.queues.iter_mut().for_each(VecDeque::clear);
        self.shared.retired.notify_all();
    }

    pub fn is_lost(&self) -> bool {
        self.lock().lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_retires_pending_work_on_unwind() {
        let gpu = SimGpu::new(ExecutionMode::Manual);
        let queue = gpu.register_queue();
        let fence = gpu.register_fence(0);
        gpu.enqueue(queue, GpuOp::Signal { fence, value: 1 })
            .unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _immediate = gpu.immediate_on_drop();
            panic!("failing assertion");
        }));
        assert!(result.is_err());
        assert_eq!(gpu.mode(), ExecutionMode::Immediate);
        assert_eq!(gpu.pending(), 0);
    }

    #[test]
    fn queue_retires_in_order() {
        let gpu = SimGpu::new(ExecutionMode::Manual);
        let queue = gpu.register_queue();
        let fence = gpu.register_fence(0);
        gpu.enqueue(
            queue,
            GpuOp::Execute {
                allocators: Vec::new(),
                commands: vec!["draw".to_owned()],
            },
        )
        .unwrap();
        gpu.enqueue(queue, GpuOp::Signal { fence, value: 1 })
            .unwrap();

        assert_eq!(gpu.pending(), 2);
        assert!(gpu.timeline().is_empty());
        assert_eq!(gpu.run_until_stalled(), 2);
        assert_eq!(
            gpu.timeline(),
            vec![
                GpuEvent::Command("draw".to_owned()),
                GpuEvent::Signal { fence, value: 1 }
            ]
        );
    }

    #[test]
    fn wait_stalls_only_its_queue() {
        let gpu = SimGpu::new(ExecutionMode::Manual);
        let waiting = gpu.register_queue();
        let signaling = gpu.register_queue();
        let fence = gpu.register_fence(0);

        gpu.enqueue(waiting, GpuOp::Wait { fence, value: 1 }).unwrap();
        gpu.enqueue(waiting, GpuOp::Present { buffer: 0 }).unwrap();
        assert!(!gpu.step());

        gpu.enqueue(signaling, GpuOp::Signal { fence, value: 1 })
            .unwrap();
        assert_eq!(gpu.run_until_stalled(), 3);
        assert_eq!(gpu.timeline().last(), Some(&GpuEvent::Present(0)));
    }

    #[test]
    fn lost_device_fails_everything() {
        let gpu = SimGpu::new(ExecutionMode::Immediate);
        let queue = gpu.register_queue();
        let fence = gpu.register_fence(0);
        gpu.lose_device();

        assert!(matches!(
            gpu.enqueue(queue, GpuOp::Signal { fence, value: 1 }),
            Err(BackendError::DeviceLost)
        ));
        assert_eq!(gpu.fence_value(fence), u64::MAX);
        assert!(matches!(
            gpu.wait_fence(fence, 1, None),
            Err(BackendError::DeviceLost)
        ));
    }

    #[test]
    fn wait_times_out() {
        let gpu = SimGpu::new(ExecutionMode::Manual);
        let fence = gpu.register_fence(0);
        assert!(!gpu
            .wait_fence(fence, 1, Some(Duration::from_millis(10)))
            .unwrap());
    }
}
