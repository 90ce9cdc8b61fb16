pub mod config;
pub mod error;
pub mod grid;

pub mod sim {
    pub mod double_buffer;
    pub mod field;
    pub mod input;
    pub mod pass;
    pub mod particles;
    pub mod solver;
}

pub mod cpu {
    pub mod backend;
    pub mod kernels;
    pub mod particle_kernels;
    pub mod texture;
}

pub mod app {
    pub mod display;
    pub mod ffi;
    pub mod plugin;
}

pub use app::plugin::Fluid2dPlugin;
pub use config::{DragModel, FluidConfig, ParticleConfig};
pub use cpu::backend::{CpuBackend, TargetId};
pub use error::{FluidError, Result, Stage};
pub use grid::{ChannelFormat, Grid};
pub use sim::input::InputState;
pub use sim::particles::ParticleField;
pub use sim::solver::FluidSolver;
