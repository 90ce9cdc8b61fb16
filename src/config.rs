use bevy::prelude::Resource;
use glam::Vec4;

use crate::error::{FluidError, Result};
use crate::grid::Grid;

pub const MAX_SOLVER_ITERATIONS: u32 = 50;

// hard vertex ceiling of a single point batch
pub const PARTICLES_PER_BATCH: u32 = 65535;

#[derive(Resource, Clone, Debug, PartialEq)]
pub struct FluidConfig {
    pub width: u32,
    pub height: u32,
    pub solver_iterations: u32, // Jacobi iterations per tick, 0..=50
    pub apply_force: bool,      // request the pointer force pass
    pub update_dye: bool,       // request the dye injection pass
    pub time_scale: f32,        // fraction of the frame delta fed to the fluid
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            solver_iterations: MAX_SOLVER_ITERATIONS,
            apply_force: true,
            update_dye: true,
            time_scale: 0.5,
        }
    }
}

impl FluidConfig {
    pub fn validate(&self) -> Result<Grid> {
        if self.solver_iterations > MAX_SOLVER_ITERATIONS {
            return Err(FluidError::SolverIterations {
                value: self.solver_iterations,
                max: MAX_SOLVER_ITERATIONS,
            });
        }
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(FluidError::InvalidTimeStep(self.time_scale));
        }
        Grid::new(self.width, self.height)
    }

    // demo function ----------------------------------------------
    // sized so the CPU backend keeps up at interactive rates
    pub fn demo_small() -> Self {
        Self {
            width: 128,
            height: 128,
            solver_iterations: 20,
            ..Self::default()
        }
    }
    // ------------------------------------------------------------
}

/// Blend used when a particle's velocity relaxes toward the sampled flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DragModel {
    /// `v = drag * v_old + (1 - drag) * v_flow`, once per tick.
    #[default]
    Linear,
    /// `v = v_flow + (v_old - v_flow) * drag^(dt * 60)`, frame-rate independent.
    Exponential,
}

impl DragModel {
    pub(crate) fn code(self) -> i32 {
        match self {
            DragModel::Linear => 0,
            DragModel::Exponential => 1,
        }
    }

    pub(crate) fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(DragModel::Linear),
            1 => Some(DragModel::Exponential),
            _ => None,
        }
    }
}

#[derive(Resource, Clone, Debug, PartialEq)]
pub struct ParticleConfig {
    pub count: u32, // rounded up to a perfect square at setup
    pub throttle: f32, // fraction of particles allowed to respawn
    pub lifetime_min: f32, // seconds
    pub lifetime_max: f32,
    pub tint: Vec4,
    pub drag: f32,
    pub drag_model: DragModel,
    pub seed: Option<u64>, // None draws from the OS
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 120_000,
            throttle: 1.0,
            lifetime_min: 1.0,
            lifetime_max: 5.0,
            tint: Vec4::ONE,
            drag: 0.5,
            drag_model: DragModel::Linear,
            seed: None,
        }
    }
}

impl ParticleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(FluidError::EmptyParticleField);
        }
        if !(0.0..=1.0).contains(&self.throttle) {
            return Err(FluidError::InvalidThrottle(self.throttle));
        }
        let lifetime_ok = self.lifetime_min.is_finite()
            && self.lifetime_max.is_finite()
            && self.lifetime_min > 0.0
            && self.lifetime_min <= self.lifetime_max;
        if !lifetime_ok {
            return Err(FluidError::InvalidLifetime {
                min: self.lifetime_min,
                max: self.lifetime_max,
            });
        }
        if !(0.0..=1.0).contains(&self.drag) {
            return Err(FluidError::InvalidDrag(self.drag));
        }
        Ok(())
    }

    pub fn demo_small() -> Self {
        Self {
            count: 20_000,
            ..Self::default()
        }
    }
}
