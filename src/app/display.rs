// turns the current dye and particle slots into image rows
use glam::{Vec4, Vec4Swizzles};

use crate::app::ffi::DisplayPixel;
use crate::grid::Grid;

// a point adds a faint splat, so dense regions saturate instead of clipping at once
const PARTICLE_ALPHA: f32 = 0.35;

pub struct ParticleLayer<'a, I> {
    pub positions: &'a [Vec4],
    pub batches: I,
    pub tint: Vec4,
}

/// Dye texels (row 0 at the bottom) to image pixels (row 0 at the top),
/// with particles splatted on top one draw batch at a time.
pub fn compose_frame<I>(
    dye: &[Vec4],
    grid: Grid,
    particles: Option<ParticleLayer<'_, I>>,
) -> Vec<DisplayPixel>
where
    I: Iterator<Item = std::ops::Range<u32>>,
{
    let width = grid.width() as usize;
    let height = grid.height() as usize;
    let mut pixels = vec![DisplayPixel::BLACK; width * height];

    for (row, texels) in dye.chunks_exact(width).take(height).enumerate() {
        let flipped = height - 1 - row;
        for (x, texel) in texels.iter().enumerate() {
            pixels[flipped * width + x] = DisplayPixel::from_linear(*texel);
        }
    }

    let Some(layer) = particles else {
        return pixels;
    };
    let splat = layer.tint * PARTICLE_ALPHA;
    for batch in layer.batches {
        for index in batch {
            let Some(position) = layer.positions.get(index as usize) else {
                break;
            };
            let p = position.xy().clamp(glam::Vec2::ZERO, glam::Vec2::splat(0.999_999));
            let x = (p.x * width as f32) as usize;
            let y = height - 1 - (p.y * height as f32) as usize;
            pixels[y * width + x].add(splat);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dye_rows_are_flipped() {
        let grid = Grid::new(2, 2).unwrap();
        let dye = [Vec4::X, Vec4::ZERO, Vec4::ZERO, Vec4::Y];
        let pixels = compose_frame::<std::iter::Empty<_>>(&dye, grid, None);
        // texel (0, 0) is bottom-left, so it lands in the last row
        assert_eq!(pixels[2].rgba, [255, 0, 0, 255]);
        assert_eq!(pixels[1].rgba, [0, 255, 0, 255]);
    }

    #[test]
    fn particles_add_tinted_splats() {
        let grid = Grid::new(4, 4).unwrap();
        let dye = vec![Vec4::ZERO; 16];
        let positions = [Vec4::new(0.9, 0.9, 0.0, 0.0), Vec4::new(0.9, 0.9, 0.0, 0.0)];
        let layer = ParticleLayer {
            positions: &positions,
            batches: std::iter::once(0..2),
            tint: Vec4::ONE,
        };
        let pixels = compose_frame(&dye, grid, Some(layer));
        // top-right pixel, two splats of 0.35
        assert_eq!(pixels[3].rgba[0], 2 * (0.35f32 * 255.0) as u8);
        assert_eq!(pixels[0].rgba[0], 0);
    }
}
