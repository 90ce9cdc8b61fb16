use bevy_fluid2d::{CpuBackend, FluidConfig, FluidSolver, InputState, ParticleConfig, ParticleField};
use criterion::{Criterion, criterion_group, criterion_main};

fn bench_fluid_step(c: &mut Criterion) {
    let mut backend = CpuBackend::new();
    let mut fluid = FluidSolver::setup(&mut backend, FluidConfig::demo_small()).unwrap();

    // a steady drag so the force and dye passes do real work
    let mut input = InputState::default();
    input.move_to(glam::Vec2::new(0.4, 0.5));
    input.move_to(glam::Vec2::new(0.6, 0.5));
    input.press();

    c.bench_function("fluid_step_128", |b| {
        b.iter(|| fluid.step(&mut backend, 1.0 / 120.0, &input).unwrap())
    });
}

fn bench_particle_step(c: &mut Criterion) {
    let mut backend = CpuBackend::new();
    let fluid = FluidSolver::setup(&mut backend, FluidConfig::demo_small()).unwrap();
    let config = ParticleConfig {
        seed: Some(7),
        ..ParticleConfig::demo_small()
    };
    let mut particles = ParticleField::setup(&mut backend, config).unwrap();

    c.bench_function("particle_step_20k", |b| {
        b.iter(|| particles.step(&mut backend, &fluid, 1.0 / 60.0).unwrap())
    });
}

criterion_group!(benches, bench_fluid_step, bench_particle_step);
criterion_main!(benches);
