use bevy::log::{error, info, warn};

use crate::config::FluidConfig;
use crate::error::{FluidError, Result, Stage};
use crate::grid::Grid;
use crate::sim::field::{FieldRole, GridField, ScratchField};
use crate::sim::input::InputState;
use crate::sim::pass::{FluidBackend, Kernel, Pass, Sampler, Uniform};

const REQUIRED_KERNELS: [Kernel; 4] = [
    Kernel::Advect,
    Kernel::Divergence,
    Kernel::PressureJacobi,
    Kernel::GradientSubtract,
];

pub(crate) fn check_time_step(dt: f32) -> Result<()> {
    if !dt.is_finite() || dt < 0.0 {
        return Err(FluidError::InvalidTimeStep(dt));
    }
    Ok(())
}

/// Copies of the carried-over fields, taken before the first pass of a tick.
#[derive(Debug)]
struct Checkpoint<T> {
    velocity: ScratchField<T>,
    pressure: ScratchField<T>,
    dye: ScratchField<T>,
}

impl<T: Copy + PartialEq> Checkpoint<T> {
    fn create<B>(backend: &mut B, grid: Grid) -> Result<Self>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        Ok(Self {
            velocity: ScratchField::create(backend, FieldRole::Velocity, grid)?,
            pressure: ScratchField::create(backend, FieldRole::Pressure, grid)?,
            dye: ScratchField::create(backend, FieldRole::Dye, grid)?,
        })
    }

    fn release<B>(&mut self, backend: &mut B)
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        self.velocity.release(backend);
        self.pressure.release(backend);
        self.dye.release(backend);
    }
}

/// Grid based incompressible solver. Owns every fluid field and runs the
/// six passes of a tick in a fixed order.
#[derive(Debug)]
pub struct FluidSolver<T> {
    config: FluidConfig,
    grid: Grid,
    force_kernel: Option<Kernel>,
    dye_kernel: Option<Kernel>,
    velocity: GridField<T>,
    pressure: GridField<T>,
    divergence: ScratchField<T>,
    dye: GridField<T>,
    checkpoint: Checkpoint<T>,
}

impl<T: Copy + PartialEq + std::fmt::Debug> FluidSolver<T> {
    pub fn setup<B>(backend: &mut B, config: FluidConfig) -> Result<Self>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        let grid = config.validate()?;
        let max = backend.max_texture_size();
        if !grid.fits(max) {
            return Err(FluidError::GridTooLarge {
                width: grid.width(),
                height: grid.height(),
                max,
            });
        }
        if let Some(kernel) = REQUIRED_KERNELS.into_iter().find(|k| !backend.supports(*k)) {
            return Err(FluidError::MissingKernel(kernel));
        }

        // optional passes are resolved here once; a missing one just no-ops later
        let force_kernel = resolve_optional(&*backend, config.apply_force, Kernel::ApplyForce);
        let dye_kernel = resolve_optional(&*backend, config.update_dye, Kernel::UpdateDye);

        let velocity = GridField::create(backend, FieldRole::Velocity, grid)?;
        let pressure = GridField::create(backend, FieldRole::Pressure, grid)?;
        let divergence = ScratchField::create(backend, FieldRole::Divergence, grid)?;
        let dye = GridField::create(backend, FieldRole::Dye, grid)?;
        let checkpoint = Checkpoint::create(backend, grid)?;

        info!(
            "fluid solver ready: {}x{} grid, {} pressure iterations, force {}, dye {}",
            grid.width(),
            grid.height(),
            config.solver_iterations,
            if force_kernel.is_some() { "on" } else { "off" },
            if dye_kernel.is_some() { "on" } else { "off" },
        );

        Ok(Self {
            config,
            grid,
            force_kernel,
            dye_kernel,
            velocity,
            pressure,
            divergence,
            dye,
            checkpoint,
        })
    }

    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn velocity(&self) -> &GridField<T> {
        &self.velocity
    }

    pub fn pressure(&self) -> &GridField<T> {
        &self.pressure
    }

    pub fn divergence(&self) -> &ScratchField<T> {
        &self.divergence
    }

    pub fn dye(&self) -> &GridField<T> {
        &self.dye
    }

    pub fn has_force_pass(&self) -> bool {
        self.force_kernel.is_some()
    }

    pub fn has_dye_pass(&self) -> bool {
        self.dye_kernel.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.velocity.is_released()
    }

    /// One tick: advect, force, divergence, pressure, projection, dye.
    /// The first failing pass aborts the tick and is reported; velocity,
    /// pressure and dye are then restored to what they held before it.
    pub fn step<B>(&mut self, backend: &mut B, dt: f32, input: &InputState) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        check_time_step(dt)?;
        if self.is_released() {
            return Err(FluidError::Released);
        }

        self.save_checkpoint(backend)?;
        let result = self.run_passes(backend, dt, input);
        if result.is_err() {
            self.restore_checkpoint(backend);
        }
        result
    }

    fn run_passes<B>(&mut self, backend: &mut B, dt: f32, input: &InputState) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        self.advect_velocity(backend, dt)
            .map_err(FluidError::at(Stage::AdvectVelocity))?;
        self.apply_force(backend, dt, input)
            .map_err(FluidError::at(Stage::ApplyForce))?;
        self.compute_divergence(backend)
            .map_err(FluidError::at(Stage::Divergence))?;
        self.solve_pressure(backend)
            .map_err(FluidError::at(Stage::PressureSolve))?;
        self.subtract_pressure_gradient(backend)
            .map_err(FluidError::at(Stage::GradientSubtract))?;
        self.update_dye(backend, dt, input)
            .map_err(FluidError::at(Stage::UpdateDye))?;
        // dye rides on the projected velocity
        self.advect_dye(backend, dt)
            .map_err(FluidError::at(Stage::AdvectDye))?;
        Ok(())
    }

    fn save_checkpoint<B>(&self, backend: &mut B) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        backend.copy(self.velocity.current(), self.checkpoint.velocity.target())?;
        backend.copy(self.pressure.current(), self.checkpoint.pressure.target())?;
        backend.copy(self.dye.current(), self.checkpoint.dye.target())
    }

    // the read slots get the saved texels back, whichever handle they are now
    fn restore_checkpoint<B>(&self, backend: &mut B)
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        let saved = [
            (FieldRole::Velocity, self.checkpoint.velocity.target(), self.velocity.current()),
            (FieldRole::Pressure, self.checkpoint.pressure.target(), self.pressure.current()),
            (FieldRole::Dye, self.checkpoint.dye.target(), self.dye.current()),
        ];
        for (role, source, destination) in saved {
            if let Err(err) = backend.copy(source, destination) {
                error!("could not roll back {role:?} after a failed tick: {err}");
            }
        }
    }

    fn advect_pass(&self, target: T, dt: f32) -> Pass<T> {
        Pass::new(Kernel::Advect)
            .bind(Sampler::Target, target)
            .bind(Sampler::Velocity, self.velocity.current())
            .set_float(Uniform::Dt, dt)
            .set_float(Uniform::Rdx, self.grid.rdx())
            .set_vec2(Uniform::InvResolution, self.grid.inv_resolution())
    }

    pub fn advect_velocity<B>(&mut self, backend: &mut B, dt: f32) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        let pass = self.advect_pass(self.velocity.current(), dt);
        self.velocity.write(|_, next| pass.run(backend, next))
    }

    pub fn apply_force<B>(&mut self, backend: &mut B, dt: f32, input: &InputState) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        let Some(kernel) = self.force_kernel else {
            return Ok(());
        };
        let pass = Pass::new(kernel)
            .bind(Sampler::Velocity, self.velocity.current())
            .set_float(Uniform::Dt, dt)
            .set_float(Uniform::Dx, self.grid.width() as f32)
            .set_flag(Uniform::MouseDown, input.is_button_down())
            .set_vec2(Uniform::Mouse, input.current())
            .set_vec2(Uniform::LastMouse, input.previous());
        self.velocity.write(|_, next| pass.run(backend, next))
    }

    pub fn compute_divergence<B>(&mut self, backend: &mut B) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        if self.divergence.is_released() {
            return Err(FluidError::Released);
        }
        Pass::new(Kernel::Divergence)
            .bind(Sampler::Velocity, self.velocity.current())
            .set_float(Uniform::HalfRdx, 0.5 * self.grid.rdx())
            .set_vec2(Uniform::InvResolution, self.grid.inv_resolution())
            .run(backend, self.divergence.target())
    }

    /// Jacobi relaxation. Zero iterations leaves last tick's pressure in place.
    pub fn solve_pressure<B>(&mut self, backend: &mut B) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        let width = self.grid.width() as f32;
        let base = Pass::new(Kernel::PressureJacobi)
            .bind(Sampler::Divergence, self.divergence.target())
            .set_float(Uniform::Alpha, -(width * width))
            .set_vec2(Uniform::InvResolution, self.grid.inv_resolution());

        for _ in 0..self.config.solver_iterations {
            let pass = base.clone().bind(Sampler::Pressure, self.pressure.current());
            self.pressure.write(|_, next| pass.run(backend, next))?;
        }
        Ok(())
    }

    pub fn subtract_pressure_gradient<B>(&mut self, backend: &mut B) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        let pass = Pass::new(Kernel::GradientSubtract)
            .bind(Sampler::Pressure, self.pressure.current())
            .bind(Sampler::Velocity, self.velocity.current())
            .set_float(Uniform::HalfRdx, 0.5 * self.grid.rdx())
            .set_vec2(Uniform::InvResolution, self.grid.inv_resolution());
        self.velocity.write(|_, next| pass.run(backend, next))
    }

    pub fn update_dye<B>(&mut self, backend: &mut B, dt: f32, input: &InputState) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        let Some(kernel) = self.dye_kernel else {
            return Ok(());
        };
        let pass = Pass::new(kernel)
            .bind(Sampler::Dye, self.dye.current())
            .set_float(Uniform::Dt, dt)
            .set_flag(Uniform::MouseDown, input.is_button_down())
            .set_vec2(Uniform::Mouse, input.current())
            .set_vec2(Uniform::LastMouse, input.previous());
        self.dye.write(|_, next| pass.run(backend, next))
    }

    pub fn advect_dye<B>(&mut self, backend: &mut B, dt: f32) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        let pass = self.advect_pass(self.dye.current(), dt);
        self.dye.write(|_, next| pass.run(backend, next))
    }

    /// Zeroes every field, keeping the allocation.
    pub fn reset<B>(&mut self, backend: &mut B) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        if self.is_released() {
            return Err(FluidError::Released);
        }
        self.velocity.clear(backend)?;
        self.pressure.clear(backend)?;
        self.divergence.clear(backend)?;
        self.dye.clear(backend)
    }

    /// Reallocates every field at a new resolution, cleared to zero.
    pub fn resize<B>(&mut self, backend: &mut B, width: u32, height: u32) -> Result<()>
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        let config = FluidConfig {
            width,
            height,
            ..self.config.clone()
        };
        // build first so a rejected size keeps the running fields intact
        let resized = Self::setup(backend, config)?;
        self.release(backend);
        *self = resized;
        Ok(())
    }

    /// Frees every field. Safe to call more than once.
    pub fn release<B>(&mut self, backend: &mut B)
    where
        B: FluidBackend<Target = T> + ?Sized,
    {
        self.velocity.release(backend);
        self.pressure.release(backend);
        self.divergence.release(backend);
        self.dye.release(backend);
        self.checkpoint.release(backend);
    }
}

fn resolve_optional<B>(backend: &B, requested: bool, kernel: Kernel) -> Option<Kernel>
where
    B: FluidBackend + ?Sized,
{
    if !requested {
        return None;
    }
    if !backend.supports(kernel) {
        warn!("{kernel:?} kernel unavailable, pass disabled");
        return None;
    }
    Some(kernel)
}
