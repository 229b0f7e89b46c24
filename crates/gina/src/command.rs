//! # Command submission
//!
//! The [CommandSubmitter] owns the one command queue, one command allocator per frame in flight and a single command
//! list. The list is shared by all frames: each frame rebinds it to that frame's allocator via
//! [reset_command_list](CommandSubmitter::reset_command_list), records, closes and submits it.
//!
//! # Safety contract
//!
//! An allocator must not be reset while the GPU still executes commands recorded into it. The submitter does **not**
//! check that. The caller has to wait for the fence value that was signaled after the slot's last submission, as
//! [GraphicsDevice::begin_frame](crate::GraphicsDevice::begin_frame) does.

use smallvec::SmallVec;

use crate::{
    backend::{Backend, RawCommandAllocator, RawCommandList, RawDevice, RawQueue},
    error::{CommandError, DeviceError, InitStage},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandListState {
    ///Can be submitted, or reset for the next recording.
    Closed,
    ///Accepts commands.
    Recording,
}

///The shared recording buffer. Tracks its open/closed state and the allocator slot it records into.
pub struct CommandList<B: Backend> {
    inner: B::CommandList,
    state: CommandListState,
    slot: usize,
}

impl<B: Backend> CommandList<B> {
    pub fn state(&self) -> CommandListState {
        self.state
    }

    ///Allocator slot the list is currently bound to.
    pub fn slot(&self) -> usize {
        self.slot
    }

    ///Access to the raw list for recording. Fails if the list is closed.
    pub fn recorder(&mut self) -> Result<&mut B::CommandList, CommandError> {
        match self.state {
            CommandListState::Recording => Ok(&mut self.inner),
            CommandListState::Closed => Err(CommandError::ListNotRecording),
        }
    }

    pub fn raw(&self) -> &B::CommandList {
        &self.inner
    }

    ///Finishes recording. The list can be submitted afterwards.
    pub fn close(&mut self) -> Result<(), CommandError> {
        if self.state != CommandListState::Recording {
            return Err(CommandError::ListNotRecording);
        }
        self.inner.close()?;
        self.state = CommandListState::Closed;
        Ok(())
    }
}

pub struct CommandSubmitter<B: Backend> {
    //NOTE: The list is declared first so it is dropped before the allocators it records into.
    list: CommandList<B>,
    allocators: SmallVec<[B::CommandAllocator; 3]>,
    queue: B::Queue,
}

impl<B: Backend> CommandSubmitter<B> {
    ///Creates the queue, `buffer_count` allocators and the command list. The list starts closed and bound to
    /// allocator 0.
    pub fn new(device: &B::Device, buffer_count: usize) -> Result<Self, DeviceError> {
        if buffer_count == 0 {
            return Err(DeviceError::InvalidBufferCount(0));
        }

        let queue = device
            .create_queue()
            .map_err(DeviceError::init(InitStage::CreateCommandQueue))?;

        let allocators = (0..buffer_count)
            .map(|_| device.create_command_allocator())
            .collect::<Result<SmallVec<_>, _>>()
            .map_err(DeviceError::init(InitStage::CreateCommandAllocator))?;

        let list = device
            .create_command_list(&allocators[0])
            .map_err(DeviceError::init(InitStage::CreateCommandList))?;

        #[cfg(feature = "logging")]
        log::info!(
            "Command system initialized ({} allocators)",
            allocators.len()
        );

        Ok(CommandSubmitter {
            list: CommandList {
                inner: list,
                state: CommandListState::Closed,
                slot: 0,
            },
            allocators,
            queue,
        })
    }

    pub fn queue(&self) -> &B::Queue {
        &self.queue
    }

    pub fn command_list(&self) -> &CommandList<B> {
        &self.list
    }

    pub fn command_list_mut(&mut self) -> &mut CommandList<B> {
        &mut self.list
    }

    ///Number of allocators, one per frame in flight.
    pub fn buffer_count(&self) -> usize {
        self.allocators.len()
    }

    ///Returns the allocator of slot `index`.
    ///
    /// # Panics
    ///
    /// If `index` is out of range.
    pub fn command_allocator(&self, index: usize) -> &B::CommandAllocator {
        assert!(
            index < self.allocators.len(),
            "Command allocator index {} out of bounds ({} allocators)",
            index,
            self.allocators.len()
        );
        &self.allocators[index]
    }

    ///Resets allocator `frame_index` and reopens the command list on it.
    ///
    /// The GPU must have finished all work previously recorded into that allocator. This is not checked, see the
    /// [module documentation](crate::command).
    ///
    /// # Panics
    ///
    /// If `frame_index` is out of range.
    pub fn reset_command_list(&mut self, frame_index: usize) -> Result<(), CommandError> {
        assert!(
            frame_index < self.allocators.len(),
            "Frame index {} out of bounds ({} allocators)",
            frame_index,
            self.allocators.len()
        );

        //A list that is still open is implicitly closed. Its commands are dropped with the allocator reset.
        if self.list.state == CommandListState::Recording {
            #[cfg(feature = "logging")]
            log::warn!(
                "Resetting command list that was still recording on slot {}",
                self.list.slot
            );
            self.list.close()?;
        }

        self.allocators[frame_index].reset()?;
        self.list.inner.reset(&self.allocators[frame_index])?;
        self.list.state = CommandListState::Recording;
        self.list.slot = frame_index;
        Ok(())
    }

    ///Closes the command list if it is still recording.
    pub fn close_command_list(&mut self) -> Result<(), CommandError> {
        self.list.close()
    }

    ///Submits the closed command list to the queue.
    pub fn execute_command_list(&self) -> Result<(), CommandError> {
        if self.list.state != CommandListState::Closed {
            return Err(CommandError::ListNotClosed);
        }
        self.queue.execute(&[&self.list.inner])?;
        Ok(())
    }

    ///Grows or shrinks the allocator set to `count` slots. Used when the presentation surface ended up with a different
    /// number of back buffers than requested.
    ///
    /// All GPU work must be drained, since dropped allocators might still be referenced otherwise.
    pub fn set_buffer_count(&mut self, device: &B::Device, count: usize) -> Result<(), DeviceError> {
        if count == 0 {
            return Err(DeviceError::InvalidBufferCount(0));
        }
        if count == self.allocators.len() {
            return Ok(());
        }

        #[cfg(feature = "logging")]
        log::info!(
            "Changing command allocator count from {} to {}",
            self.allocators.len(),
            count
        );

        if count < self.allocators.len() {
            if self.list.slot >= count {
                //rebind, so the list does not point into a dropped allocator
                let list = &mut self.list;
                if list.state == CommandListState::Recording {
                    list.inner
                        .close()
                        .map_err(DeviceError::init(InitStage::CreateCommandList))?;
                    list.state = CommandListState::Closed;
                }
                list.inner
                    .reset(&self.allocators[0])
                    .and_then(|_| list.inner.close())
                    .map_err(DeviceError::init(InitStage::CreateCommandList))?;
                list.slot = 0;
            }
            self.allocators.truncate(count);
        } else {
            while self.allocators.len() < count {
                let allocator = device
                    .create_command_allocator()
                    .map_err(DeviceError::init(InitStage::CreateCommandAllocator))?;
                self.allocators.push(allocator);
            }
        }
        Ok(())
    }
}
