use std::collections::HashSet;

use bevy::log::debug;
use glam::Vec4;

use crate::cpu::texture::Texture;
use crate::cpu::{kernels, particle_kernels};
use crate::error::{FluidError, Result};
use crate::grid::{ChannelFormat, Grid};
use crate::sim::pass::{Kernel, Pass, PassExecutor, RenderTargets, Sampler};

pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 8192;

/// Handle to a texture owned by a [`CpuBackend`]. Indices are never reused,
/// so a stale handle stays invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u32);

/// Reference backend: every render target is a host texture and every kernel
/// runs on the CPU, texel by texel.
#[derive(Debug)]
pub struct CpuBackend {
    textures: Vec<Option<Texture>>,
    disabled: HashSet<Kernel>,
    max_texture_size: u32,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self {
            textures: Vec::new(),
            disabled: HashSet::new(),
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
        }
    }
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that reports the given kernels as unavailable.
    pub fn without_kernels(kernels: &[Kernel]) -> Self {
        Self {
            disabled: kernels.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn with_max_texture_size(mut self, max: u32) -> Self {
        self.max_texture_size = max;
        self
    }

    pub fn live_targets(&self) -> usize {
        self.textures.iter().filter(|t| t.is_some()).count()
    }

    pub fn texture(&self, target: TargetId) -> Option<&Texture> {
        self.textures.get(target.0 as usize)?.as_ref()
    }

    pub fn texels(&self, target: TargetId) -> Option<&[Vec4]> {
        self.texture(target).map(Texture::texels)
    }

    pub fn upload(&mut self, target: TargetId, data: &[Vec4]) -> Result<()> {
        self.texture_mut(target)?.upload(data)
    }

    fn texture_mut(&mut self, target: TargetId) -> Result<&mut Texture> {
        self.textures
            .get_mut(target.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(FluidError::UnknownTarget)
    }

    // output leaves the slab while the kernel runs so inputs can be borrowed freely
    fn take(&mut self, target: TargetId) -> Result<Texture> {
        self.textures
            .get_mut(target.0 as usize)
            .and_then(Option::take)
            .ok_or(FluidError::UnknownTarget)
    }

    fn restore(&mut self, target: TargetId, texture: Texture) {
        self.textures[target.0 as usize] = Some(texture);
    }
}

/// Input textures of one pass, resolved against the backend.
pub struct Bindings<'a> {
    backend: &'a CpuBackend,
}

impl Bindings<'_> {
    pub fn texture(&self, pass: &Pass<TargetId>, sampler: Sampler) -> Result<&Texture> {
        let target = pass.texture(sampler)?;
        self.backend.texture(target).ok_or(FluidError::UnknownTarget)
    }
}

impl RenderTargets for CpuBackend {
    type Target = TargetId;

    fn allocate(&mut self, grid: Grid, format: ChannelFormat) -> Result<TargetId> {
        if !grid.fits(self.max_texture_size) {
            return Err(FluidError::GridTooLarge {
                width: grid.width(),
                height: grid.height(),
                max: self.max_texture_size,
            });
        }
        let id = TargetId(self.textures.len() as u32);
        self.textures.push(Some(Texture::new(grid, format)));
        debug!("allocated {:?} {}x{} {:?}", id, grid.width(), grid.height(), format);
        Ok(id)
    }

    fn clear(&mut self, target: TargetId, color: Vec4) -> Result<()> {
        self.texture_mut(target)?.clear(color);
        Ok(())
    }

    fn copy(&mut self, source: TargetId, destination: TargetId) -> Result<()> {
        if source == destination {
            return Ok(());
        }
        let src = self.take(source)?;
        let result = self.texture_mut(destination).and_then(|dst| dst.copy_from(&src));
        self.restore(source, src);
        result
    }

    fn destroy(&mut self, target: TargetId) {
        if let Some(slot) = self.textures.get_mut(target.0 as usize) {
            if slot.take().is_some() {
                debug!("destroyed {:?}", target);
            }
        }
    }

    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }
}

impl PassExecutor for CpuBackend {
    fn supports(&self, kernel: Kernel) -> bool {
        !self.disabled.contains(&kernel)
    }

    fn execute(&mut self, pass: &Pass<TargetId>, output: TargetId) -> Result<()> {
        let kernel = pass.kernel();
        if !self.supports(kernel) {
            return Err(FluidError::MissingKernel(kernel));
        }
        if pass.textures().any(|(_, t)| t == output) {
            return Err(FluidError::AliasedOutput(kernel));
        }

        let mut out = self.take(output)?;
        let inputs = Bindings { backend: &*self };
        let result = match kernel {
            Kernel::Advect => kernels::advect(pass, &inputs, &mut out),
            Kernel::ApplyForce => kernels::apply_force(pass, &inputs, &mut out),
            Kernel::Divergence => kernels::divergence(pass, &inputs, &mut out),
            Kernel::PressureJacobi => kernels::pressure_jacobi(pass, &inputs, &mut out),
            Kernel::GradientSubtract => kernels::gradient_subtract(pass, &inputs, &mut out),
            Kernel::UpdateDye => kernels::update_dye(pass, &inputs, &mut out),
            Kernel::ParticleSpawn => particle_kernels::spawn(pass, &inputs, &mut out),
            Kernel::ParticleVelocity => particle_kernels::sample_velocity(pass, &inputs, &mut out),
            Kernel::ParticleIntegrate => particle_kernels::integrate(pass, &inputs, &mut out),
        };
        self.restore(output, out);
        result
    }
}
