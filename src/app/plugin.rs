use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use bevy::window::PrimaryWindow;

use crate::app::display::{ParticleLayer, compose_frame};
use crate::app::ffi::DisplayPixel;
use crate::config::{FluidConfig, ParticleConfig};
use crate::cpu::backend::{CpuBackend, TargetId};
use crate::sim::input::{InputState, PointerSource, normalize_pointer};
use crate::sim::particles::ParticleField;
use crate::sim::solver::FluidSolver;

// ==================== resources ======================================

#[derive(Resource)]
pub struct FluidSimulation {
    pub backend: CpuBackend,
    pub fluid: FluidSolver<TargetId>,
    pub particles: Option<ParticleField<TargetId>>, // None if the particle setup failed
}

#[derive(Resource)]
pub struct FluidDisplay {
    pub image: Handle<Image>,
}

#[derive(Component)]
pub struct FluidSurface;

/// Left mouse button + primary window cursor as a pointer source.
pub struct WindowPointer<'a> {
    pub buttons: &'a ButtonInput<MouseButton>,
    pub window: &'a Window,
}

impl PointerSource for WindowPointer<'_> {
    fn just_pressed(&self) -> bool {
        self.buttons.just_pressed(MouseButton::Left)
    }

    fn just_released(&self) -> bool {
        self.buttons.just_released(MouseButton::Left)
    }

    fn position(&self) -> Option<glam::Vec2> {
        let cursor = self.window.cursor_position()?;
        let size = self.window.size();
        // bevy's cursor origin is top-left, the fluid's is bottom-left
        Some(normalize_pointer(
            glam::Vec2::new(cursor.x, size.y - cursor.y),
            glam::Vec2::new(size.x, size.y),
        ))
    }
}

// =====================================================================

// ========================== systems ==================================

// Startup systems that have to run only once

fn setup_simulation(
    mut commands: Commands,
    fluid_config: Res<FluidConfig>,
    particle_config: Res<ParticleConfig>,
    mut images: ResMut<Assets<Image>>,
) {
    let mut backend = CpuBackend::new();
    let fluid = match FluidSolver::setup(&mut backend, fluid_config.clone()) {
        Ok(fluid) => fluid,
        Err(err) => {
            error!("fluid setup failed: {err}");
            return;
        }
    };
    let particles = match ParticleField::setup(&mut backend, particle_config.clone()) {
        Ok(particles) => Some(particles),
        Err(err) => {
            warn!("particles disabled: {err}");
            None
        }
    };

    let grid = fluid.grid();
    let image = Image::new_fill(
        Extent3d {
            width: grid.width(),
            height: grid.height(),
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        &DisplayPixel::BLACK.rgba,
        TextureFormat::Rgba8Unorm,
        RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    );
    let image = images.add(image);

    commands.spawn(Camera2d);
    commands.spawn((Sprite::from_image(image.clone()), FluidSurface));
    commands.insert_resource(FluidDisplay { image });
    commands.insert_resource(FluidSimulation {
        backend,
        fluid,
        particles,
    });
}

// Update systems that have to run per frame

fn poll_pointer(
    mut input: ResMut<InputState>,
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    input.poll(&WindowPointer {
        buttons: &buttons,
        window,
    });
}

fn reset_on_key(keys: Res<ButtonInput<KeyCode>>, sim: Option<ResMut<FluidSimulation>>) {
    let Some(mut sim) = sim else { return };
    if !keys.just_released(KeyCode::KeyR) {
        return;
    }
    let FluidSimulation {
        backend,
        fluid,
        particles,
    } = &mut *sim;
    if let Err(err) = fluid.reset(backend) {
        error!("fluid reset failed: {err}");
    }
    if let Some(particles) = particles {
        if let Err(err) = particles.reset(backend) {
            error!("particle reset failed: {err}");
        }
    }
    info!("simulation reset");
}

fn step_simulation(
    sim: Option<ResMut<FluidSimulation>>,
    input: Res<InputState>,
    time: Res<Time>,
) {
    let Some(mut sim) = sim else { return };
    let dt = time.delta_secs();
    let FluidSimulation {
        backend,
        fluid,
        particles,
    } = &mut *sim;

    let fluid_dt = dt * fluid.config().time_scale;
    if let Err(err) = fluid.step(backend, fluid_dt, &input) {
        error!("fluid step failed: {err}");
        return;
    }
    // particles sample the velocity written above, never last frame's
    if let Some(particles) = particles {
        if let Err(err) = particles.step(backend, fluid, dt) {
            error!("particle step failed: {err}");
        }
    }
}

// the fluid domain is square and spans the window height, anchored left
fn fit_surface(
    windows: Query<&Window, With<PrimaryWindow>>,
    mut surfaces: Query<(&mut Sprite, &mut Transform), With<FluidSurface>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let size = window.size();
    for (mut sprite, mut transform) in surfaces.iter_mut() {
        sprite.custom_size = Some(Vec2::splat(size.y));
        transform.translation.x = -0.5 * size.x + 0.5 * size.y;
        transform.translation.y = 0.0;
    }
}

fn upload_display(
    sim: Option<Res<FluidSimulation>>,
    display: Option<Res<FluidDisplay>>,
    particle_config: Res<ParticleConfig>,
    mut images: ResMut<Assets<Image>>,
) {
    let (Some(sim), Some(display)) = (sim, display) else {
        return;
    };
    let Some(dye) = sim.backend.texels(sim.fluid.dye().current()) else {
        return;
    };

    let layer = sim.particles.as_ref().and_then(|particles| {
        let positions = sim.backend.texels(particles.position().current())?;
        Some(ParticleLayer {
            positions,
            batches: particles.draw_batches(),
            tint: particle_config.tint,
        })
    });
    let pixels = compose_frame(dye, sim.fluid.grid(), layer);

    let Some(image) = images.get_mut(&display.image) else {
        return;
    };
    image.data = Some(bytemuck::cast_slice(&pixels).to_vec());
}

// =====================================================================

// Plugin

pub struct Fluid2dPlugin;

impl Plugin for Fluid2dPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FluidConfig>()
            .init_resource::<ParticleConfig>()
            .init_resource::<InputState>()
            .add_systems(Startup, setup_simulation)
            .add_systems(
                Update,
                (
                    poll_pointer,
                    reset_on_key,
                    step_simulation,
                    fit_surface,
                    upload_display,
                )
                    .chain(),
            );
    }
}
