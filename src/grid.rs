use glam::Vec2;

use crate::error::{FluidError, Result};

/// Fixed resolution of a field. Set once at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Grid {
    width: u32,
    height: u32,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(FluidError::InvalidGrid { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn square(side: u32) -> Result<Self> {
        Self::new(side, side)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    // reciprocal of the grid spacing, square domain assumed
    pub fn rdx(&self) -> f32 {
        1.0 / self.width as f32
    }

    pub fn inv_resolution(&self) -> Vec2 {
        Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32)
    }

    pub fn fits(&self, max_texture_size: u32) -> bool {
        self.width <= max_texture_size && self.height <= max_texture_size
    }
}

/// How many channels of a texel a field actually carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelFormat {
    R,
    Rg,
    Rgba,
}

impl ChannelFormat {
    pub fn channels(self) -> usize {
        match self {
            ChannelFormat::R => 1,
            ChannelFormat::Rg => 2,
            ChannelFormat::Rgba => 4,
        }
    }
}
