use std::f32::consts::PI;

use bevy_fluid2d::sim::pass::{Kernel, RenderTargets};
use bevy_fluid2d::{CpuBackend, FluidConfig, FluidError, FluidSolver, InputState, Stage};
use glam::{Vec2, Vec4};

const DT: f32 = 1.0 / 60.0;

fn config(size: u32, solver_iterations: u32) -> FluidConfig {
    FluidConfig {
        width: size,
        height: size,
        solver_iterations,
        ..FluidConfig::default()
    }
}

fn dragging() -> InputState {
    let mut input = InputState::default();
    input.move_to(Vec2::new(0.4, 0.5));
    input.move_to(Vec2::new(0.6, 0.5));
    input.press();
    input
}

fn all_zero(texels: &[Vec4]) -> bool {
    texels.iter().all(|t| *t == Vec4::ZERO)
}

fn mean_abs_divergence(backend: &CpuBackend, fluid: &FluidSolver<bevy_fluid2d::TargetId>) -> f32 {
    let texels = backend.texels(fluid.divergence().target()).unwrap();
    texels.iter().map(|t| t.x.abs()).sum::<f32>() / texels.len() as f32
}

#[test]
fn still_fluid_stays_still() {
    let mut backend = CpuBackend::new();
    let mut fluid = FluidSolver::setup(&mut backend, config(16, 20)).unwrap();
    let input = InputState::default();
    for _ in 0..10 {
        fluid.step(&mut backend, DT, &input).unwrap();
    }
    assert!(all_zero(backend.texels(fluid.velocity().current()).unwrap()));
    assert!(all_zero(backend.texels(fluid.pressure().current()).unwrap()));
    assert!(all_zero(backend.texels(fluid.divergence().target()).unwrap()));
    assert!(all_zero(backend.texels(fluid.dye().current()).unwrap()));
}

#[test]
fn more_iterations_remove_more_divergence() {
    let n = 32;
    let field: Vec<Vec4> = (0..n * n)
        .map(|i| {
            let (x, y) = ((i % n) as f32, (i / n) as f32);
            let vx = (PI * (x + 0.5) / n as f32).sin();
            let vy = (PI * (y + 0.5) / n as f32).sin();
            Vec4::new(vx, vy, 0.0, 0.0)
        })
        .collect();

    let mut residuals = Vec::new();
    for k in [0, 1, 5, 20, 50] {
        let mut backend = CpuBackend::new();
        let mut fluid = FluidSolver::setup(&mut backend, config(n, k)).unwrap();
        backend.upload(fluid.velocity().current(), &field).unwrap();

        fluid.compute_divergence(&mut backend).unwrap();
        let initial = mean_abs_divergence(&backend, &fluid);
        fluid.solve_pressure(&mut backend).unwrap();
        fluid.subtract_pressure_gradient(&mut backend).unwrap();
        fluid.compute_divergence(&mut backend).unwrap();
        residuals.push(mean_abs_divergence(&backend, &fluid) / initial);
    }

    // no pressure means no correction
    assert!((residuals[0] - 1.0).abs() < 1e-4);
    for pair in residuals.windows(2) {
        assert!(pair[1] < pair[0], "residuals not decreasing: {residuals:?}");
    }
    assert!(residuals[4] < 0.95);
}

#[test]
fn zero_iterations_keep_last_pressure() {
    let mut backend = CpuBackend::new();
    let mut fluid = FluidSolver::setup(&mut backend, config(8, 0)).unwrap();
    let pressure = vec![Vec4::new(0.25, 0.0, 0.0, 0.0); 64];
    backend.upload(fluid.pressure().current(), &pressure).unwrap();
    let handle = fluid.pressure().current();

    fluid.step(&mut backend, DT, &InputState::default()).unwrap();
    assert_eq!(fluid.pressure().current(), handle);
    assert_eq!(backend.texels(handle).unwrap(), pressure.as_slice());
}

#[test]
fn pointer_drag_injects_force_and_dye() {
    let mut backend = CpuBackend::new();
    let mut fluid = FluidSolver::setup(&mut backend, config(32, 10)).unwrap();
    assert!(fluid.has_force_pass() && fluid.has_dye_pass());

    fluid.step(&mut backend, DT, &dragging()).unwrap();
    assert!(!all_zero(backend.texels(fluid.velocity().current()).unwrap()));
    assert!(!all_zero(backend.texels(fluid.dye().current()).unwrap()));
}

#[test]
fn released_button_injects_nothing() {
    let mut backend = CpuBackend::new();
    let mut fluid = FluidSolver::setup(&mut backend, config(16, 10)).unwrap();
    let mut input = dragging();
    input.release();

    fluid.step(&mut backend, DT, &input).unwrap();
    assert!(all_zero(backend.texels(fluid.velocity().current()).unwrap()));
    assert!(all_zero(backend.texels(fluid.dye().current()).unwrap()));
}

#[test]
fn disabled_passes_are_skipped() {
    let mut backend = CpuBackend::new();
    let off = FluidConfig {
        apply_force: false,
        update_dye: false,
        ..config(16, 10)
    };
    let mut fluid = FluidSolver::setup(&mut backend, off).unwrap();
    assert!(!fluid.has_force_pass() && !fluid.has_dye_pass());

    fluid.step(&mut backend, DT, &dragging()).unwrap();
    assert!(all_zero(backend.texels(fluid.velocity().current()).unwrap()));
    assert!(all_zero(backend.texels(fluid.dye().current()).unwrap()));
}

#[test]
fn unavailable_optional_kernels_are_skipped() {
    let mut backend = CpuBackend::without_kernels(&[Kernel::ApplyForce, Kernel::UpdateDye]);
    let mut fluid = FluidSolver::setup(&mut backend, config(16, 10)).unwrap();
    assert!(!fluid.has_force_pass() && !fluid.has_dye_pass());

    fluid.step(&mut backend, DT, &dragging()).unwrap();
    assert!(all_zero(backend.texels(fluid.velocity().current()).unwrap()));
}

#[test]
fn missing_required_kernel_fails_setup() {
    let mut backend = CpuBackend::without_kernels(&[Kernel::PressureJacobi]);
    let result = FluidSolver::setup(&mut backend, config(16, 10));
    assert_eq!(result.err(), Some(FluidError::MissingKernel(Kernel::PressureJacobi)));
    assert_eq!(backend.live_targets(), 0);
}

#[test]
fn bad_configs_are_rejected() {
    let mut backend = CpuBackend::new();
    assert_eq!(
        FluidSolver::setup(&mut backend, config(0, 10)).err(),
        Some(FluidError::InvalidGrid { width: 0, height: 0 })
    );
    assert_eq!(
        FluidSolver::setup(&mut backend, config(16, 51)).err(),
        Some(FluidError::SolverIterations { value: 51, max: 50 })
    );

    let mut small = CpuBackend::new().with_max_texture_size(64);
    assert_eq!(
        FluidSolver::setup(&mut small, config(128, 10)).err(),
        Some(FluidError::GridTooLarge { width: 128, height: 128, max: 64 })
    );
}

#[test]
fn bad_time_steps_change_nothing() {
    let mut backend = CpuBackend::new();
    let mut fluid = FluidSolver::setup(&mut backend, config(8, 5)).unwrap();
    let velocity = fluid.velocity().current();

    assert_eq!(
        fluid.step(&mut backend, -1.0, &dragging()),
        Err(FluidError::InvalidTimeStep(-1.0))
    );
    assert!(matches!(
        fluid.step(&mut backend, f32::NAN, &dragging()),
        Err(FluidError::InvalidTimeStep(_))
    ));
    assert_eq!(fluid.velocity().current(), velocity);
    assert!(all_zero(backend.texels(velocity).unwrap()));
}

#[test]
fn zero_time_step_is_allowed() {
    let mut backend = CpuBackend::new();
    let mut fluid = FluidSolver::setup(&mut backend, config(8, 5)).unwrap();
    assert!(fluid.step(&mut backend, 0.0, &dragging()).is_ok());
}

#[test]
fn failing_pass_names_its_stage() {
    let mut backend = CpuBackend::new();
    let mut fluid = FluidSolver::setup(&mut backend, config(8, 5)).unwrap();
    backend.destroy(fluid.divergence().target());

    let err = fluid.step(&mut backend, DT, &InputState::default()).unwrap_err();
    assert_eq!(
        err,
        FluidError::StepAborted {
            stage: Stage::Divergence,
            source: Box::new(FluidError::UnknownTarget),
        }
    );
}

#[test]
fn aborted_tick_restores_every_field() {
    let mut backend = CpuBackend::new();
    let mut fluid = FluidSolver::setup(&mut backend, config(8, 5)).unwrap();
    let velocity: Vec<Vec4> = (0..64)
        .map(|i| Vec4::new((i % 8) as f32 * 0.1, (i / 8) as f32 * -0.05, 0.0, 0.0))
        .collect();
    let pressure: Vec<Vec4> = (0..64).map(|i| Vec4::new(i as f32, 0.0, 0.0, 0.0)).collect();
    let dye = vec![Vec4::new(0.5, 0.25, 0.125, 1.0); 64];
    backend.upload(fluid.velocity().current(), &velocity).unwrap();
    backend.upload(fluid.pressure().current(), &pressure).unwrap();
    backend.upload(fluid.dye().current(), &dye).unwrap();

    // advect and force run, then the divergence pass fails
    backend.destroy(fluid.divergence().target());
    assert!(fluid.step(&mut backend, DT, &dragging()).is_err());

    assert_eq!(backend.texels(fluid.velocity().current()).unwrap(), velocity.as_slice());
    assert_eq!(backend.texels(fluid.pressure().current()).unwrap(), pressure.as_slice());
    assert_eq!(backend.texels(fluid.dye().current()).unwrap(), dye.as_slice());
}

#[test]
fn reset_clears_every_field() {
    let mut backend = CpuBackend::new();
    let mut fluid = FluidSolver::setup(&mut backend, config(16, 10)).unwrap();
    fluid.step(&mut backend, DT, &dragging()).unwrap();
    fluid.reset(&mut backend).unwrap();

    assert!(all_zero(backend.texels(fluid.velocity().current()).unwrap()));
    assert!(all_zero(backend.texels(fluid.velocity().next()).unwrap()));
    assert!(all_zero(backend.texels(fluid.pressure().current()).unwrap()));
    assert!(all_zero(backend.texels(fluid.divergence().target()).unwrap()));
    assert!(all_zero(backend.texels(fluid.dye().current()).unwrap()));
}

#[test]
fn resize_swaps_allocations() {
    let mut backend = CpuBackend::new();
    let mut fluid = FluidSolver::setup(&mut backend, config(16, 10)).unwrap();
    let live = backend.live_targets();

    fluid.resize(&mut backend, 32, 24).unwrap();
    assert_eq!((fluid.grid().width(), fluid.grid().height()), (32, 24));
    assert_eq!(backend.live_targets(), live);
    assert_eq!(backend.texels(fluid.dye().current()).unwrap().len(), 32 * 24);

    // a rejected size leaves the running solver alone
    assert!(fluid.resize(&mut backend, 0, 24).is_err());
    assert_eq!(fluid.grid().width(), 32);
    fluid.step(&mut backend, DT, &InputState::default()).unwrap();
}

#[test]
fn release_frees_everything_once() {
    let mut backend = CpuBackend::new();
    let mut fluid = FluidSolver::setup(&mut backend, config(8, 5)).unwrap();
    // two slots each for velocity, pressure and dye, divergence, three checkpoints
    assert_eq!(backend.live_targets(), 10);

    fluid.release(&mut backend);
    fluid.release(&mut backend);
    assert!(fluid.is_released());
    assert_eq!(backend.live_targets(), 0);
    assert_eq!(
        fluid.step(&mut backend, DT, &InputState::default()),
        Err(FluidError::Released)
    );
}
