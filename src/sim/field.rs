use glam::Vec4;

use crate::error::{FluidError, Result};
use crate::grid::{ChannelFormat, Grid};
use crate::sim::double_buffer::DoubleBuffer;
use crate::sim::pass::RenderTargets;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    Velocity,
    Pressure,
    Divergence,
    Dye,
    ParticlePosition,
    ParticleVelocity,
}

impl FieldRole {
    pub fn format(self) -> ChannelFormat {
        match self {
            FieldRole::Pressure | FieldRole::Divergence => ChannelFormat::R,
            FieldRole::Dye => ChannelFormat::Rgba,
            FieldRole::Velocity | FieldRole::ParticlePosition | FieldRole::ParticleVelocity => {
                ChannelFormat::Rg
            }
        }
    }
}

/// A double buffer tied to what it stores.
#[derive(Debug, Clone)]
pub struct GridField<T> {
    role: FieldRole,
    grid: Grid,
    buffer: DoubleBuffer<T>,
}

impl<T: Copy + PartialEq> GridField<T> {
    pub fn create<B>(backend: &mut B, role: FieldRole, grid: Grid) -> Result<Self>
    where
        B: RenderTargets<Target = T> + ?Sized,
    {
        Ok(Self {
            role,
            grid,
            buffer: DoubleBuffer::create(backend, grid, role.format())?,
        })
    }

    pub fn role(&self) -> FieldRole {
        self.role
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn format(&self) -> ChannelFormat {
        self.role.format()
    }

    /// Read slot. Do not hold on to it across a swap.
    pub fn current(&self) -> T {
        self.buffer.current()
    }

    pub fn next(&self) -> T {
        self.buffer.next()
    }

    // undoes a write whose tick was rolled back
    pub(crate) fn swap(&mut self) {
        self.buffer.swap();
    }

    pub fn write(&mut self, pass: impl FnOnce(T, T) -> Result<()>) -> Result<()> {
        if self.buffer.is_released() {
            return Err(FluidError::Released);
        }
        self.buffer.write(pass)
    }

    pub fn clear<B>(&self, backend: &mut B) -> Result<()>
    where
        B: RenderTargets<Target = T> + ?Sized,
    {
        self.buffer.clear(backend)
    }

    pub fn release<B>(&mut self, backend: &mut B)
    where
        B: RenderTargets<Target = T> + ?Sized,
    {
        self.buffer.release(backend);
    }

    pub fn is_released(&self) -> bool {
        self.buffer.is_released()
    }
}

/// Single target, overwritten in full every tick (divergence).
#[derive(Debug, Clone)]
pub struct ScratchField<T> {
    role: FieldRole,
    grid: Grid,
    target: T,
    released: bool,
}

impl<T: Copy + PartialEq> ScratchField<T> {
    pub fn create<B>(backend: &mut B, role: FieldRole, grid: Grid) -> Result<Self>
    where
        B: RenderTargets<Target = T> + ?Sized,
    {
        let target = backend.allocate(grid, role.format())?;
        backend.clear(target, Vec4::ZERO)?;
        Ok(Self {
            role,
            grid,
            target,
            released: false,
        })
    }

    pub fn role(&self) -> FieldRole {
        self.role
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn target(&self) -> T {
        self.target
    }

    pub fn clear<B>(&self, backend: &mut B) -> Result<()>
    where
        B: RenderTargets<Target = T> + ?Sized,
    {
        backend.clear(self.target, Vec4::ZERO)
    }

    pub fn release<B>(&mut self, backend: &mut B)
    where
        B: RenderTargets<Target = T> + ?Sized,
    {
        if !self.released {
            backend.destroy(self.target);
            self.released = true;
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}
