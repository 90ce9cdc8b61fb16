// fluid kernels, one function per full-screen pass
use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::cpu::texture::Texture;
use crate::error::Result;
use crate::sim::pass::{Pass, Sampler, Uniform};

use super::backend::{Bindings, TargetId};

const FORCE_RADIUS: f32 = 0.015;
const DYE_RADIUS: f32 = 0.025;
const TAPER: f32 = 0.6;
const FORCE_GAIN: f32 = 1.4;
const DYE_DECAY: Vec3 = Vec3::new(0.9797, 0.9494, 0.9696);
const REFERENCE_FPS: f32 = 60.0;

/// Distance from `p` to the segment `a -> b`, and how far along it `p` projects
/// (0 at `a`, 1 at `b`).
pub(crate) fn distance_to_segment(a: Vec2, b: Vec2, p: Vec2) -> (f32, f32) {
    let d = p - a;
    let x = b - a;
    let lx = x.length();
    if lx <= 1e-4 {
        return (d.length(), 0.0);
    }
    let projection = d.dot(x / lx);
    let fraction = projection / lx;
    let distance = if projection < 0.0 {
        d.length()
    } else if projection > lx {
        (p - b).length()
    } else {
        (d.length_squared() - projection * projection).abs().sqrt()
    };
    (distance, fraction)
}

// no-slip walls: outside the grid the normal component flips sign
fn boundary_velocity(velocity: &Texture, x: i32, y: i32) -> Vec2 {
    let mut multiplier = Vec2::ONE;
    if x < 0 || x >= velocity.width() {
        multiplier.x = -1.0;
    }
    if y < 0 || y >= velocity.height() {
        multiplier.y = -1.0;
    }
    multiplier * velocity.fetch(x, y).xy()
}

pub(crate) fn advect(pass: &Pass<TargetId>, inputs: &Bindings, out: &mut Texture) -> Result<()> {
    let target = inputs.texture(pass, Sampler::Target)?;
    let velocity = inputs.texture(pass, Sampler::Velocity)?;
    let dt = pass.float(Uniform::Dt)?;
    let rdx = pass.float(Uniform::Rdx)?;

    let step = dt * rdx;
    out.fill_with(|x, y| {
        let uv = target.uv(x, y);
        let v = velocity.sample(uv).xy();
        target.sample(uv - step * v)
    });
    Ok(())
}

pub(crate) fn apply_force(
    pass: &Pass<TargetId>,
    inputs: &Bindings,
    out: &mut Texture,
) -> Result<()> {
    let velocity = inputs.texture(pass, Sampler::Velocity)?;
    let dt = pass.float(Uniform::Dt)?;
    let dx = pass.float(Uniform::Dx)?;
    let mouse_down = pass.flag(Uniform::MouseDown)?;
    let mouse = pass.vec2(Uniform::Mouse)?;
    let last_mouse = pass.vec2(Uniform::LastMouse)?;

    if !mouse_down || dt <= 0.0 {
        out.fill_with(|x, y| velocity.fetch(x, y));
        return Ok(());
    }

    let target_velocity = (mouse - last_mouse) / dt * dx * FORCE_GAIN;
    out.fill_with(|x, y| {
        let v = velocity.fetch(x, y).xy();
        let (l, projection) = distance_to_segment(mouse, last_mouse, velocity.uv(x, y));
        let taper = 1.0 - projection.clamp(0.0, 1.0) * TAPER;
        let m = (-l / FORCE_RADIUS).exp() * taper * taper;
        (v + (target_velocity - v) * m).extend(0.0).extend(0.0)
    });
    Ok(())
}

pub(crate) fn divergence(
    pass: &Pass<TargetId>,
    inputs: &Bindings,
    out: &mut Texture,
) -> Result<()> {
    let velocity = inputs.texture(pass, Sampler::Velocity)?;
    let half_rdx = pass.float(Uniform::HalfRdx)?;

    out.fill_with(|x, y| {
        let l = boundary_velocity(velocity, x - 1, y).x;
        let r = boundary_velocity(velocity, x + 1, y).x;
        let b = boundary_velocity(velocity, x, y - 1).y;
        let t = boundary_velocity(velocity, x, y + 1).y;
        Vec4::new(half_rdx * ((r - l) + (t - b)), 0.0, 0.0, 0.0)
    });
    Ok(())
}

pub(crate) fn pressure_jacobi(
    pass: &Pass<TargetId>,
    inputs: &Bindings,
    out: &mut Texture,
) -> Result<()> {
    let pressure = inputs.texture(pass, Sampler::Pressure)?;
    let divergence = inputs.texture(pass, Sampler::Divergence)?;
    let alpha = pass.float(Uniform::Alpha)?;

    out.fill_with(|x, y| {
        let l = pressure.fetch(x - 1, y).x;
        let r = pressure.fetch(x + 1, y).x;
        let b = pressure.fetch(x, y - 1).x;
        let t = pressure.fetch(x, y + 1).x;
        let div = divergence.fetch(x, y).x;
        Vec4::new((l + r + b + t + alpha * div) * 0.25, 0.0, 0.0, 0.0)
    });
    Ok(())
}

pub(crate) fn gradient_subtract(
    pass: &Pass<TargetId>,
    inputs: &Bindings,
    out: &mut Texture,
) -> Result<()> {
    let pressure = inputs.texture(pass, Sampler::Pressure)?;
    let velocity = inputs.texture(pass, Sampler::Velocity)?;
    let half_rdx = pass.float(Uniform::HalfRdx)?;

    out.fill_with(|x, y| {
        let l = pressure.fetch(x - 1, y).x;
        let r = pressure.fetch(x + 1, y).x;
        let b = pressure.fetch(x, y - 1).x;
        let t = pressure.fetch(x, y + 1).x;
        let v = velocity.fetch(x, y).xy() - half_rdx * Vec2::new(r - l, t - b);
        v.extend(0.0).extend(0.0)
    });
    Ok(())
}

pub(crate) fn update_dye(
    pass: &Pass<TargetId>,
    inputs: &Bindings,
    out: &mut Texture,
) -> Result<()> {
    let dye = inputs.texture(pass, Sampler::Dye)?;
    let dt = pass.float(Uniform::Dt)?;
    let mouse_down = pass.flag(Uniform::MouseDown)?;
    let mouse = pass.vec2(Uniform::Mouse)?;
    let last_mouse = pass.vec2(Uniform::LastMouse)?;

    let decay = DYE_DECAY.powf(dt * REFERENCE_FPS);
    let inject = mouse_down && dt > 0.0;
    let speed = if inject {
        ((mouse - last_mouse) / dt).length()
    } else {
        0.0
    };

    out.fill_with(|x, y| {
        let color = dye.fetch(x, y);
        let mut rgb = color.xyz() * decay;
        if inject {
            let (l, projection) = distance_to_segment(mouse, last_mouse, dye.uv(x, y));
            let taper = 1.0 - projection.clamp(0.0, 1.0) * TAPER;
            let m = (-l / DYE_RADIUS).exp();
            // slow strokes lay down deep blue, fast ones bright cyan and white
            let heat = ((speed * speed * 0.02 - l * 5.0) * taper).clamp(0.0, 1.0);
            let slow = Vec3::new(2.4, 0.0, 5.9) / 60.0;
            let fast = Vec3::new(0.2, 51.8, 100.0) / 30.0;
            let tint = slow.lerp(fast, heat);
            rgb += m * (tint + Vec3::ONE * heat.powi(9));
        }
        rgb.extend(color.w)
    });
    Ok(())
}
