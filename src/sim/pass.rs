use std::fmt::Debug;

use glam::{Vec2, Vec4};

use crate::error::{FluidError, Result};
use crate::grid::{ChannelFormat, Grid};

/// Full-screen kernels the orchestration knows how to sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    Advect,
    ApplyForce,
    Divergence,
    PressureJacobi,
    GradientSubtract,
    UpdateDye,
    ParticleSpawn,
    ParticleVelocity,
    ParticleIntegrate,
}

/// Texture slots a kernel reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sampler {
    Target, // the quantity being advected
    Velocity,
    Pressure,
    Divergence,
    Dye,
    Position,
    ParticleVelocity,
    FlowVelocity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uniform {
    Dt,
    Rdx,
    HalfRdx,
    InvResolution,
    Alpha,
    Dx,
    MouseDown,
    Mouse,
    LastMouse,
    FlowScale,
    DragCoefficient,
    DragModel,
    RandomSeed,
    Throttle,
    InvLifeTimeMin,
    InvLifeTimeMax,
    Time,
    LastTime,
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
}

/// Allocates, clears and frees the render targets fields live in.
pub trait RenderTargets {
    type Target: Copy + PartialEq + Debug;

    /// New target, zero-initialised.
    fn allocate(&mut self, grid: Grid, format: ChannelFormat) -> Result<Self::Target>;

    fn clear(&mut self, target: Self::Target, color: Vec4) -> Result<()>;

    fn copy(&mut self, source: Self::Target, destination: Self::Target) -> Result<()>;

    /// Freeing an already freed target must be a no-op.
    fn destroy(&mut self, target: Self::Target);

    fn max_texture_size(&self) -> u32;
}

/// Runs one full-screen kernel. Blocking, writes every texel of `output`.
pub trait PassExecutor: RenderTargets {
    fn supports(&self, kernel: Kernel) -> bool;

    fn execute(&mut self, pass: &Pass<Self::Target>, output: Self::Target) -> Result<()>;
}

pub trait FluidBackend: PassExecutor {}

impl<B: PassExecutor> FluidBackend for B {}

/// One kernel invocation: bound textures plus uniforms.
#[derive(Debug, Clone)]
pub struct Pass<T> {
    kernel: Kernel,
    textures: Vec<(Sampler, T)>,
    uniforms: Vec<(Uniform, UniformValue)>,
}

impl<T: Copy + PartialEq + Debug> Pass<T> {
    pub fn new(kernel: Kernel) -> Self {
        Self {
            kernel,
            textures: Vec::new(),
            uniforms: Vec::new(),
        }
    }

    pub fn bind(mut self, sampler: Sampler, target: T) -> Self {
        self.textures.retain(|(s, _)| *s != sampler);
        self.textures.push((sampler, target));
        self
    }

    pub fn set(mut self, uniform: Uniform, value: UniformValue) -> Self {
        self.uniforms.retain(|(u, _)| *u != uniform);
        self.uniforms.push((uniform, value));
        self
    }

    pub fn set_float(self, uniform: Uniform, value: f32) -> Self {
        self.set(uniform, UniformValue::Float(value))
    }

    pub fn set_int(self, uniform: Uniform, value: i32) -> Self {
        self.set(uniform, UniformValue::Int(value))
    }

    pub fn set_flag(self, uniform: Uniform, value: bool) -> Self {
        self.set_int(uniform, i32::from(value))
    }

    pub fn set_vec2(self, uniform: Uniform, value: Vec2) -> Self {
        self.set(uniform, UniformValue::Vec2(value))
    }

    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    pub fn textures(&self) -> impl Iterator<Item = (Sampler, T)> + '_ {
        self.textures.iter().copied()
    }

    pub fn texture(&self, sampler: Sampler) -> Result<T> {
        self.textures
            .iter()
            .find(|(s, _)| *s == sampler)
            .map(|(_, t)| *t)
            .ok_or(FluidError::MissingTexture {
                kernel: self.kernel,
                sampler,
            })
    }

    fn uniform(&self, uniform: Uniform) -> Result<UniformValue> {
        self.uniforms
            .iter()
            .find(|(u, _)| *u == uniform)
            .map(|(_, v)| *v)
            .ok_or(FluidError::MissingUniform {
                kernel: self.kernel,
                uniform,
            })
    }

    // ints widen to floats, anything else is a binding mistake
    pub fn float(&self, uniform: Uniform) -> Result<f32> {
        match self.uniform(uniform)? {
            UniformValue::Float(v) => Ok(v),
            UniformValue::Int(v) => Ok(v as f32),
            _ => Err(self.missing(uniform)),
        }
    }

    pub fn int(&self, uniform: Uniform) -> Result<i32> {
        match self.uniform(uniform)? {
            UniformValue::Int(v) => Ok(v),
            _ => Err(self.missing(uniform)),
        }
    }

    pub fn flag(&self, uniform: Uniform) -> Result<bool> {
        Ok(self.int(uniform)? != 0)
    }

    pub fn vec2(&self, uniform: Uniform) -> Result<Vec2> {
        match self.uniform(uniform)? {
            UniformValue::Vec2(v) => Ok(v),
            _ => Err(self.missing(uniform)),
        }
    }

    fn missing(&self, uniform: Uniform) -> FluidError {
        FluidError::MissingUniform {
            kernel: self.kernel,
            uniform,
        }
    }

    pub fn run<B>(&self, backend: &mut B, output: T) -> Result<()>
    where
        B: PassExecutor<Target = T> + ?Sized,
    {
        if self.textures.iter().any(|(_, t)| *t == output) {
            return Err(FluidError::AliasedOutput(self.kernel));
        }
        backend.execute(self, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebinding_replaces_the_slot() {
        let pass = Pass::new(Kernel::Advect)
            .bind(Sampler::Velocity, 1u32)
            .bind(Sampler::Velocity, 2u32)
            .set_float(Uniform::Dt, 0.5)
            .set_float(Uniform::Dt, 0.25);
        assert_eq!(pass.texture(Sampler::Velocity), Ok(2));
        assert_eq!(pass.textures().count(), 1);
        assert_eq!(pass.float(Uniform::Dt), Ok(0.25));
    }

    #[test]
    fn missing_bindings_name_the_slot() {
        let pass: Pass<u32> = Pass::new(Kernel::Divergence).set_flag(Uniform::MouseDown, true);
        assert_eq!(
            pass.texture(Sampler::Velocity),
            Err(FluidError::MissingTexture {
                kernel: Kernel::Divergence,
                sampler: Sampler::Velocity
            })
        );
        assert_eq!(pass.flag(Uniform::MouseDown), Ok(true));
        assert!(pass.vec2(Uniform::MouseDown).is_err());
    }
}
