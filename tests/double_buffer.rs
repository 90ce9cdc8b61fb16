use bevy_fluid2d::cpu::backend::CpuBackend;
use bevy_fluid2d::grid::{ChannelFormat, Grid};
use bevy_fluid2d::sim::double_buffer::DoubleBuffer;
use bevy_fluid2d::sim::field::{FieldRole, GridField};
use bevy_fluid2d::sim::pass::RenderTargets;
use bevy_fluid2d::FluidError;
use glam::Vec4;

#[test]
fn swap_moves_written_data_into_the_read_slot() {
    let mut backend = CpuBackend::new();
    let grid = Grid::new(3, 2).unwrap();
    let mut buffer = DoubleBuffer::create(&mut backend, grid, ChannelFormat::Rgba).unwrap();
    assert_eq!(backend.live_targets(), 2);

    let data: Vec<Vec4> = (0..6).map(|i| Vec4::splat(i as f32)).collect();
    backend.upload(buffer.next(), &data).unwrap();
    buffer.swap();
    assert_eq!(backend.texels(buffer.current()).unwrap(), data.as_slice());
    // the old read slot is still zeroed
    assert!(backend.texels(buffer.next()).unwrap().iter().all(|t| *t == Vec4::ZERO));
}

#[test]
fn release_is_idempotent() {
    let mut backend = CpuBackend::new();
    let grid = Grid::square(4).unwrap();
    let mut buffer = DoubleBuffer::create(&mut backend, grid, ChannelFormat::R).unwrap();
    buffer.release(&mut backend);
    assert!(buffer.is_released());
    assert_eq!(backend.live_targets(), 0);
    buffer.release(&mut backend);
    assert_eq!(backend.live_targets(), 0);
}

#[test]
fn allocation_failure_leaks_nothing() {
    let mut backend = CpuBackend::new().with_max_texture_size(8);
    let grid = Grid::square(16).unwrap();
    let result = DoubleBuffer::create(&mut backend, grid, ChannelFormat::Rg);
    assert!(matches!(result, Err(FluidError::GridTooLarge { .. })));
    assert_eq!(backend.live_targets(), 0);
}

#[test]
fn released_field_refuses_writes() {
    let mut backend = CpuBackend::new();
    let grid = Grid::square(2).unwrap();
    let mut field = GridField::create(&mut backend, FieldRole::Velocity, grid).unwrap();
    assert_eq!(field.format(), ChannelFormat::Rg);

    let before = field.current();
    field.release(&mut backend);
    let result = field.write(|current, next| backend.copy(current, next));
    assert_eq!(result, Err(FluidError::Released));
    assert_eq!(field.current(), before);
}

#[test]
fn field_write_swaps_after_the_pass() {
    let mut backend = CpuBackend::new();
    let grid = Grid::square(2).unwrap();
    let mut field = GridField::create(&mut backend, FieldRole::Dye, grid).unwrap();
    let data = vec![Vec4::new(0.1, 0.2, 0.3, 1.0); 4];
    backend.upload(field.current(), &data).unwrap();

    let (old_current, old_next) = (field.current(), field.next());
    field.write(|current, next| backend.copy(current, next)).unwrap();
    assert_eq!(field.current(), old_next);
    assert_eq!(field.next(), old_current);
    assert_eq!(backend.texels(field.current()).unwrap(), data.as_slice());
}
