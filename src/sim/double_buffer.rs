use glam::Vec4;

use crate::error::Result;
use crate::grid::{ChannelFormat, Grid};
use crate::sim::pass::RenderTargets;

/// Ping-pong pair of render targets. Slot 0 is read, slot 1 is written.
#[derive(Debug, Clone)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    released: bool,
}

impl<T: Copy + PartialEq> DoubleBuffer<T> {
    pub fn new(current: T, next: T) -> Self {
        Self {
            slots: [current, next],
            released: false,
        }
    }

    pub fn create<B>(backend: &mut B, grid: Grid, format: ChannelFormat) -> Result<Self>
    where
        B: RenderTargets<Target = T> + ?Sized,
    {
        let current = backend.allocate(grid, format)?;
        let next = match backend.allocate(grid, format) {
            Ok(next) => next,
            Err(err) => {
                backend.destroy(current);
                return Err(err);
            }
        };
        let buffer = Self::new(current, next);
        buffer.clear(backend)?;
        Ok(buffer)
    }

    pub fn current(&self) -> T {
        self.slots[0]
    }

    pub fn next(&self) -> T {
        self.slots[1]
    }

    pub fn swap(&mut self) {
        self.slots.swap(0, 1);
    }

    /// Runs `pass(current, next)` and swaps once, only if it succeeded.
    pub fn write<E>(
        &mut self,
        pass: impl FnOnce(T, T) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        pass(self.current(), self.next())?;
        self.swap();
        Ok(())
    }

    pub fn clear<B>(&self, backend: &mut B) -> Result<()>
    where
        B: RenderTargets<Target = T> + ?Sized,
    {
        for slot in self.slots {
            backend.clear(slot, Vec4::ZERO)?;
        }
        Ok(())
    }

    /// Frees both slots. Calling it twice does nothing.
    pub fn release<B>(&mut self, backend: &mut B)
    where
        B: RenderTargets<Target = T> + ?Sized,
    {
        if self.released {
            return;
        }
        for slot in self.slots {
            backend.destroy(slot);
        }
        self.released = true;
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}
