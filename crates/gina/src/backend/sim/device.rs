use std::time::Duration;

use super::{
    SimBackend,
    gpu::{ExecutionMode, GpuOp, SimGpu},
};
use crate::{
    backend::{RawCommandAllocator, RawCommandList, RawDevice, RawFence, RawQueue},
    error::BackendError,
};

///Logical device on a simulated adapter. Owns the [SimGpu] all of its objects execute on.
pub struct SimDevice {
    pub(crate) gpu: SimGpu,
    pub(crate) adapter_name: String,
}

impl SimDevice {
    pub(crate) fn new(adapter_name: String, mode: ExecutionMode) -> Self {
        SimDevice {
            gpu: SimGpu::new(mode),
            adapter_name,
        }
    }

    ///The simulated GPU. Use it to retire work in [Manual](ExecutionMode::Manual) mode or to inspect what was executed.
    pub fn gpu(&self) -> &SimGpu {
        &self.gpu
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }
}

impl RawDevice<SimBackend> for SimDevice {
    fn create_queue(&self) -> Result<SimQueue, BackendError> {
        Ok(SimQueue {
            gpu: self.gpu.clone(),
            id: self.gpu.register_queue(),
        })
    }

    fn create_command_allocator(&self) -> Result<SimCommandAllocator, BackendError> {
        Ok(SimCommandAllocator {
            gpu: self.gpu.clone(),
            id: self.gpu.register_allocator(),
        })
    }

    fn create_command_list(
        &self,
        allocator: &SimCommandAllocator,
    ) -> Result<SimCommandList, BackendError> {
        Ok(SimCommandList {
            allocator: allocator.id,
            recording: false,
            commands: Vec::new(),
        })
    }

    fn create_fence(&self, initial_value: u64) -> Result<SimFence, BackendError> {
        Ok(SimFence {
            gpu: self.gpu.clone(),
            id: self.gpu.register_fence(initial_value),
        })
    }
}

pub struct SimQueue {
    gpu: SimGpu,
    id: usize,
}

impl SimQueue {
    pub(crate) fn enqueue(&self, op: GpuOp) -> Result<(), BackendError> {
        self.gpu.enqueue(self.id, op)
    }
}

impl RawQueue<SimBackend> for SimQueue {
    fn execute(&self, lists: &[&SimCommandList]) -> Result<(), BackendError> {
        if lists.iter().any(|list| list.recording) {
            return Err(BackendError::Validation(
                "command list executed while still recording".to_owned(),
            ));
        }

        self.enqueue(GpuOp::Execute {
            allocators: lists.iter().map(|list| list.allocator).collect(),
            commands: lists
                .iter()
                .flat_map(|list| list.commands.iter().cloned())
                .collect(),
        })
    }

    fn signal(&self, fence: &SimFence, value: u64) -> Result<(), BackendError> {
        self.enqueue(GpuOp::Signal {
            fence: fence.id,
            value,
        })
    }

    fn wait(&self, fence: &SimFence, value: u64) -> Result<(), BackendError> {
        self.enqueue(GpuOp::Wait {
            fence: fence.id,
            value,
        })
    }
}

pub struct SimCommandAllocator {
    gpu: SimGpu,
    id: usize,
}

impl SimCommandAllocator {
    ///Number of executed command lists recorded into this allocator the GPU has not retired yet.
    pub fn in_flight(&self) -> u32 {
        self.gpu.allocator_in_flight(self.id)
    }
}

impl RawCommandAllocator for SimCommandAllocator {
    fn reset(&mut self) -> Result<(), BackendError> {
        let in_flight = self.in_flight();
        if in_flight > 0 {
            return Err(BackendError::Validation(format!(
                "command allocator {} reset while {} submission(s) are still executing",
                self.id, in_flight
            )));
        }
        Ok(())
    }
}

///Command list that records labels. Executing it appends them to the [timeline](SimGpu::timeline) as
/// [Command](super::GpuEvent::Command) events.
pub struct SimCommandList {
    allocator: usize,
    recording: bool,
    commands: Vec<String>,
}

impl SimCommandList {
    pub fn record(&mut self, label: impl Into<String>) -> Result<(), BackendError> {
        if !self.recording {
            return Err(BackendError::Validation(
                "recording into a closed command list".to_owned(),
            ));
        }
        self.commands.push(label.into());
        Ok(())
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }
}

impl RawCommandList<SimBackend> for SimCommandList {
    fn reset(&mut self, allocator: &SimCommandAllocator) -> Result<(), BackendError> {
        if self.recording {
            return Err(BackendError::Validation(
                "command list reset while still recording".to_owned(),
            ));
        }
        self.allocator = allocator.id;
        self.commands.clear();
        self.recording = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        if !self.recording {
            return Err(BackendError::Validation(
                "command list closed twice".to_owned(),
            ));
        }
        self.recording = false;
        Ok(())
    }
}

pub struct SimFence {
    gpu: SimGpu,
    id: usize,
}

impl SimFence {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl RawFence for SimFence {
    fn completed_value(&self) -> u64 {
        self.gpu.fence_value(self.id)
    }

    fn wait(&self, value: u64, timeout: Option<Duration>) -> Result<bool, BackendError> {
        self.gpu.wait_fence(self.id, value, timeout)
    }
}
