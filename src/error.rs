use thiserror::Error;

use crate::sim::pass::{Kernel, Sampler, Uniform};

/// Which part of a tick was running when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AdvectVelocity,
    ApplyForce,
    Divergence,
    PressureSolve,
    GradientSubtract,
    UpdateDye,
    AdvectDye,
    ParticleVelocity,
    ParticleIntegrate,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FluidError {
    #[error("grid dimensions must be positive, got {width}x{height}")]
    InvalidGrid { width: u32, height: u32 },

    #[error("grid {width}x{height} exceeds the maximum texture size {max}")]
    GridTooLarge { width: u32, height: u32, max: u32 },

    #[error("solver iterations {value} out of range 0..={max}")]
    SolverIterations { value: u32, max: u32 },

    #[error("time step must be finite and non-negative, got {0}")]
    InvalidTimeStep(f32),

    #[error("particle count must be at least 1")]
    EmptyParticleField,

    #[error(
        "{count} particles need a {side}x{side} texture, above the maximum texture size {max}"
    )]
    ParticleTextureTooLarge { count: u32, side: u32, max: u32 },

    #[error("throttle must lie in [0, 1], got {0}")]
    InvalidThrottle(f32),

    #[error("particle lifetime range {min}..{max} is invalid")]
    InvalidLifetime { min: f32, max: f32 },

    #[error("drag coefficient must lie in [0, 1], got {0}")]
    InvalidDrag(f32),

    #[error("kernel {0:?} is required but the backend does not provide it")]
    MissingKernel(Kernel),

    #[error("{kernel:?} pass has no texture bound to {sampler:?}")]
    MissingTexture { kernel: Kernel, sampler: Sampler },

    #[error("{kernel:?} pass has no value for uniform {uniform:?}")]
    MissingUniform { kernel: Kernel, uniform: Uniform },

    #[error("{kernel:?} pass got an out of range value for uniform {uniform:?}")]
    InvalidUniform { kernel: Kernel, uniform: Uniform },

    #[error("{0:?} pass reads from its own output target")]
    AliasedOutput(Kernel),

    #[error("render target is not allocated")]
    UnknownTarget,

    #[error("expected {expected} texels, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("field resources were already released")]
    Released,

    #[error("{stage:?} pass failed: {source}")]
    StepAborted {
        stage: Stage,
        #[source]
        source: Box<FluidError>,
    },
}

impl FluidError {
    pub(crate) fn at(stage: Stage) -> impl FnOnce(FluidError) -> FluidError {
        move |source| FluidError::StepAborted {
            stage,
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, FluidError>;
