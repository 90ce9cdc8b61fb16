use glam::{Vec2, Vec4, Vec4Swizzles};

use crate::config::DragModel;
use crate::cpu::texture::Texture;
use crate::error::{FluidError, Result};
use crate::sim::pass::{Pass, Sampler, Uniform};

use super::backend::{Bindings, TargetId};

// hash salts, one per independent random quantity
const SALT_SPAWN_X: u32 = 0x68e3_1da4;
const SALT_SPAWN_Y: u32 = 0xb529_7a4d;
const SALT_LIFE: u32 = 0x1b56_c4e9;
const SALT_PHASE: u32 = 0x7f4a_7c15;
const SALT_THROTTLE: u32 = 0x2545_f491;

const REFERENCE_FPS: f32 = 60.0;

fn pcg(value: u32) -> u32 {
    let state = value.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Deterministic value in [0, 1) for a texel, a seed and a salt.
pub(crate) fn hash(x: u32, y: u32, seed: u32, salt: u32) -> f32 {
    let h = pcg(x ^ pcg(y ^ pcg(seed ^ salt)));
    (h >> 8) as f32 / (1u32 << 24) as f32
}

fn seed_bits(seed: f32) -> u32 {
    (seed.clamp(0.0, 1.0) * u32::MAX as f32) as u32
}

fn random_position(x: u32, y: u32, seed: u32) -> Vec2 {
    Vec2::new(
        hash(x, y, seed, SALT_SPAWN_X),
        hash(x, y, seed, SALT_SPAWN_Y),
    )
}

pub(crate) fn spawn(pass: &Pass<TargetId>, _inputs: &Bindings, out: &mut Texture) -> Result<()> {
    let seed = seed_bits(pass.float(Uniform::RandomSeed)?);
    out.fill_with(|x, y| random_position(x as u32, y as u32, seed).extend(0.0).extend(0.0));
    Ok(())
}

pub(crate) fn sample_velocity(
    pass: &Pass<TargetId>,
    inputs: &Bindings,
    out: &mut Texture,
) -> Result<()> {
    let position = inputs.texture(pass, Sampler::Position)?;
    let velocity = inputs.texture(pass, Sampler::ParticleVelocity)?;
    let flow = inputs.texture(pass, Sampler::FlowVelocity)?;
    let flow_scale = pass.vec2(Uniform::FlowScale)?;
    let drag = pass.float(Uniform::DragCoefficient)?;
    let model = DragModel::from_code(pass.int(Uniform::DragModel)?).ok_or(
        FluidError::InvalidUniform {
            kernel: pass.kernel(),
            uniform: Uniform::DragModel,
        },
    )?;
    let dt = pass.float(Uniform::Dt)?;

    let keep = match model {
        DragModel::Linear => drag,
        DragModel::Exponential => drag.powf(dt * REFERENCE_FPS),
    };
    out.fill_with(|x, y| {
        let p = position.fetch(x, y).xy();
        let target = flow.sample(p).xy() * flow_scale;
        let v = velocity.fetch(x, y).xy();
        (target + (v - target) * keep).extend(0.0).extend(0.0)
    });
    Ok(())
}

/// Lifetimes come from a hash of the texel, not from a stored age: each
/// particle gets a rate in [1/max, 1/min] and a phase, and dies whenever
/// `time * rate + phase` crosses an integer during the tick. `Refresh`
/// marks the tick the clock wrapped on, which respawns every eligible particle.
pub(crate) fn integrate(
    pass: &Pass<TargetId>,
    inputs: &Bindings,
    out: &mut Texture,
) -> Result<()> {
    let position = inputs.texture(pass, Sampler::Position)?;
    let velocity = inputs.texture(pass, Sampler::ParticleVelocity)?;
    let seed = seed_bits(pass.float(Uniform::RandomSeed)?);
    let throttle = pass.float(Uniform::Throttle)?;
    let inv_min = pass.float(Uniform::InvLifeTimeMin)?;
    let inv_max = pass.float(Uniform::InvLifeTimeMax)?;
    let dt = pass.float(Uniform::Dt)?;
    let time = pass.float(Uniform::Time)?;
    let last_time = pass.float(Uniform::LastTime)?;
    let refresh = pass.flag(Uniform::Refresh)?;

    out.fill_with(|x, y| {
        let (ux, uy) = (x as u32, y as u32);
        let rate = inv_max + (inv_min - inv_max) * hash(ux, uy, seed, SALT_LIFE);
        let phase = hash(ux, uy, seed, SALT_PHASE);
        let before = (last_time * rate + phase).floor();
        let after = (time * rate + phase).floor();
        let eligible = hash(ux, uy, seed, SALT_THROTTLE) < throttle;

        if eligible && (refresh || after > before) {
            // a new generation gets a new spot
            let generation = after as u32;
            return random_position(ux, uy, seed ^ pcg(generation)).extend(0.0).extend(0.0);
        }
        let p = position.fetch(x, y).xy() + velocity.fetch(x, y).xy() * dt;
        Vec4::new(p.x.clamp(0.0, 1.0), p.y.clamp(0.0, 1.0), 0.0, 0.0)
    });
    Ok(())
}
