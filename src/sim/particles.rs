use std::ops::Range;

use bevy::log::info;
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{PARTICLES_PER_BATCH, ParticleConfig};
use crate::error::{FluidError, Result, Stage};
use crate::grid::Grid;
use crate::sim::field::{FieldRole, GridField};
use crate::sim::pass::{FluidBackend, Kernel, Pass, Sampler, Uniform};
use crate::sim::solver::{FluidSolver, check_time_step};

const PARTICLE_KERNELS: [Kernel; 3] = [
    Kernel::ParticleSpawn,
    Kernel::ParticleVelocity,
    Kernel::ParticleIntegrate,
];

// kernel time wraps here so f32 keeps sub-frame resolution; at each wrap the
// field takes a new random seed and every eligible particle respawns once
pub const CLOCK_PERIOD: f64 = 4096.0;

fn kernel_time(elapsed: f64) -> f32 {
    (elapsed % CLOCK_PERIOD) as f32
}

/// Side of the smallest square texture holding `count` particles.
pub fn particle_side(count: u32) -> u32 {
    let mut side = (count as f64).sqrt() as u32;
    while (side as u64) * (side as u64) < count as u64 {
        side += 1;
    }
    while side > 0 && ((side - 1) as u64) * ((side - 1) as u64) >= count as u64 {
        side -= 1;
    }
    side
}

/// Point particles packed into a square texture and advected through the
/// fluid velocity. Lifetimes are not stored: each tick derives them from a
/// hash of the texel, the field's random seed and the elapsed time.
#[derive(Debug)]
pub struct ParticleField<T> {
    config: ParticleConfig,
    grid: Grid,
    count: u32,
    position: GridField<T>,
    velocity: GridField<T>,
    rng: StdRng,
    random_seed: f32,
    elapsed: f64,
}

impl<T: Copy + PartialEq + std::fmt::Debug> ParticleField<T> {
    pub fn setup<B>(backend: &mut B, config: ParticleConfig) -> Result<Self>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        config.validate()?;
        let side = particle_side(config.count);
        // side * side must still fit the u32 particle index
        let max = backend.max_texture_size().min(u16::MAX as u32);
        if side > max {
            return Err(FluidError::ParticleTextureTooLarge {
                count: config.count,
                side,
                max,
            });
        }
        if let Some(kernel) = PARTICLE_KERNELS.into_iter().find(|k| !backend.supports(*k)) {
            return Err(FluidError::MissingKernel(kernel));
        }

        let grid = Grid::square(side)?;
        let position = GridField::create(backend, FieldRole::ParticlePosition, grid)?;
        let velocity = GridField::create(backend, FieldRole::ParticleVelocity, grid)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut field = Self {
            config,
            grid,
            count: side * side,
            position,
            velocity,
            rng,
            random_seed: 0.0,
            elapsed: 0.0,
        };
        field.spawn(backend)?;

        info!(
            "particle field ready: {} requested -> {} particles ({side}x{side} texture, {} draw batches)",
            field.config.count,
            field.count,
            field.draw_batches().count(),
        );
        Ok(field)
    }

    // fresh seed, random positions, then both slots hold the same state
    fn spawn<B>(&mut self, backend: &mut B) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        self.random_seed = self.rng.random::<f32>();
        self.elapsed = 0.0;
        let pass = Pass::new(Kernel::ParticleSpawn)
            .set_float(Uniform::RandomSeed, self.random_seed)
            .set_float(Uniform::Throttle, self.config.throttle);
        self.position.write(|_, next| pass.run(backend, next))?;
        backend.copy(self.position.current(), self.position.next())
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Actual particle count, a perfect square.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn side(&self) -> u32 {
        self.grid.width()
    }

    pub fn random_seed(&self) -> f32 {
        self.random_seed
    }

    /// Seconds stepped since the last spawn.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn position(&self) -> &GridField<T> {
        &self.position
    }

    pub fn velocity(&self) -> &GridField<T> {
        &self.velocity
    }

    pub fn is_released(&self) -> bool {
        self.position.is_released()
    }

    /// Index ranges for point batches, none longer than the vertex ceiling.
    pub fn draw_batches(&self) -> impl Iterator<Item = Range<u32>> + use<T> {
        let count = self.count;
        (0..count)
            .step_by(PARTICLES_PER_BATCH as usize)
            .map(move |start| start..count.min(start + PARTICLES_PER_BATCH))
    }

    /// Texel centre a point uses to look itself up in the position texture.
    pub fn particle_uv(&self, index: u32) -> Vec2 {
        let side = self.side();
        let x = index % side;
        let y = index / side;
        Vec2::new(
            (x as f32 + 0.5) / side as f32,
            (y as f32 + 0.5) / side as f32,
        )
    }

    /// Samples the fluid velocity, then integrates and respawns.
    /// Run it after the fluid step of the same frame. If integration fails
    /// the velocity written this tick is dropped again.
    pub fn step<B>(&mut self, backend: &mut B, fluid: &FluidSolver<T>, dt: f32) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        check_time_step(dt)?;
        if self.is_released() || fluid.is_released() {
            return Err(FluidError::Released);
        }

        let flow = fluid.velocity().current();
        let sample = Pass::new(Kernel::ParticleVelocity)
            .bind(Sampler::Position, self.position.current())
            .bind(Sampler::ParticleVelocity, self.velocity.current())
            .bind(Sampler::FlowVelocity, flow)
            .set_vec2(Uniform::FlowScale, fluid.grid().inv_resolution())
            .set_float(Uniform::DragCoefficient, self.config.drag)
            .set_int(Uniform::DragModel, self.config.drag_model.code())
            .set_float(Uniform::Dt, dt);
        self.velocity
            .write(|_, next| sample.run(backend, next))
            .map_err(FluidError::at(Stage::ParticleVelocity))?;

        let elapsed = self.elapsed + f64::from(dt);
        let wrapped = (elapsed / CLOCK_PERIOD).floor() > (self.elapsed / CLOCK_PERIOD).floor();
        let random_seed = if wrapped {
            self.rng.random::<f32>()
        } else {
            self.random_seed
        };
        let integrate = Pass::new(Kernel::ParticleIntegrate)
            .bind(Sampler::Position, self.position.current())
            .bind(Sampler::ParticleVelocity, self.velocity.current())
            .set_float(Uniform::RandomSeed, random_seed)
            .set_float(Uniform::Throttle, self.config.throttle)
            .set_float(Uniform::InvLifeTimeMin, 1.0 / self.config.lifetime_min)
            .set_float(Uniform::InvLifeTimeMax, 1.0 / self.config.lifetime_max)
            .set_float(Uniform::Dt, dt)
            .set_float(Uniform::LastTime, kernel_time(self.elapsed))
            .set_float(Uniform::Time, kernel_time(elapsed))
            .set_flag(Uniform::Refresh, wrapped);
        if let Err(err) = self.position.write(|_, next| integrate.run(backend, next)) {
            self.velocity.swap();
            return Err(FluidError::at(Stage::ParticleIntegrate)(err));
        }

        self.random_seed = random_seed;
        self.elapsed = elapsed;
        Ok(())
    }

    /// Clears both fields and spawns a new population in the same allocation.
    pub fn reset<B>(&mut self, backend: &mut B) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        if self.is_released() {
            return Err(FluidError::Released);
        }
        self.position.clear(backend)?;
        self.velocity.clear(backend)?;
        self.spawn(backend)
    }

    pub fn release<B>(&mut self, backend: &mut B)
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        self.position.release(backend);
        self.velocity.release(backend);
    }
}
