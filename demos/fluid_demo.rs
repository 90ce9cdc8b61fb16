use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_fluid2d::{Fluid2dPlugin, FluidConfig, ParticleConfig};

fn main() {
    App::new()
        .add_plugins((DefaultPlugins, FrameTimeDiagnosticsPlugin::default()))
        .insert_resource(ClearColor(Color::BLACK))
        // 128x128 grid, 20k particles. drag with the left button, R resets
        .insert_resource(FluidConfig::demo_small())
        .insert_resource(ParticleConfig::demo_small())
        .add_plugins(Fluid2dPlugin)
        .add_systems(Update, log_fps)
        .run();
}

fn log_fps(diagnostics: Res<DiagnosticsStore>, mut counter: Local<u32>) {
    *counter += 1;
    if *counter >= 120 {
        *counter = 0;

        if let Some(fps_diag) = diagnostics.get(&FrameTimeDiagnosticsPlugin::FPS) {
            if let Some(avg) = fps_diag.average() {
                info!("==== Average FPS over last ~2 s: {:.1} ====", avg);
            }
        }
    }
}
