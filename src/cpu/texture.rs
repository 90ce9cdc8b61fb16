// host side texture with the addressing rules of the GPU render targets
use glam::{Vec2, Vec4};

use crate::error::{FluidError, Result};
use crate::grid::{ChannelFormat, Grid};

// channels the format does not carry read back as zero
fn mask(format: ChannelFormat, value: Vec4) -> Vec4 {
    match format {
        ChannelFormat::R => Vec4::new(value.x, 0.0, 0.0, 0.0),
        ChannelFormat::Rg => Vec4::new(value.x, value.y, 0.0, 0.0),
        ChannelFormat::Rgba => value,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    grid: Grid,
    format: ChannelFormat,
    texels: Vec<Vec4>,
}

impl Texture {
    pub fn new(grid: Grid, format: ChannelFormat) -> Self {
        Self {
            grid,
            format,
            texels: vec![Vec4::ZERO; grid.texel_count()],
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn format(&self) -> ChannelFormat {
        self.format
    }

    pub fn width(&self) -> i32 {
        self.grid.width() as i32
    }

    pub fn height(&self) -> i32 {
        self.grid.height() as i32
    }

    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    pub fn clear(&mut self, color: Vec4) {
        self.texels.fill(mask(self.format, color));
    }

    pub fn upload(&mut self, data: &[Vec4]) -> Result<()> {
        if data.len() != self.texels.len() {
            return Err(FluidError::SizeMismatch {
                expected: self.texels.len(),
                actual: data.len(),
            });
        }
        for (dst, src) in self.texels.iter_mut().zip(data) {
            *dst = mask(self.format, *src);
        }
        Ok(())
    }

    pub fn copy_from(&mut self, other: &Texture) -> Result<()> {
        self.upload(&other.texels)
    }

    /// Clamp-to-edge texel fetch.
    pub fn fetch(&self, x: i32, y: i32) -> Vec4 {
        let x = x.clamp(0, self.width() - 1);
        let y = y.clamp(0, self.height() - 1);
        self.texels[(y * self.width() + x) as usize]
    }

    /// Texel centre in normalised coordinates.
    pub fn uv(&self, x: i32, y: i32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width() as f32,
            (y as f32 + 0.5) / self.height() as f32,
        )
    }

    /// Bilinear sample at `uv`, clamp-to-edge.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let x = uv.x * self.width() as f32 - 0.5;
        let y = uv.y * self.height() as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (ix, iy) = (x0 as i32, y0 as i32);

        let bottom = self.fetch(ix, iy).lerp(self.fetch(ix + 1, iy), fx);
        let top = self.fetch(ix, iy + 1).lerp(self.fetch(ix + 1, iy + 1), fx);
        bottom.lerp(top, fy)
    }

    /// Overwrites every texel with `f(x, y)`.
    pub fn fill_with(&mut self, mut f: impl FnMut(i32, i32) -> Vec4) {
        let width = self.width();
        for y in 0..self.height() {
            for x in 0..width {
                self.texels[(y * width + x) as usize] = mask(self.format, f(x, y));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Texture {
        let mut texture = Texture::new(Grid::new(4, 2).unwrap(), ChannelFormat::Rgba);
        texture.fill_with(|x, y| Vec4::new(x as f32, y as f32, 0.0, 1.0));
        texture
    }

    #[test]
    fn sample_at_texel_centre_is_exact() {
        let texture = ramp();
        assert_eq!(texture.sample(texture.uv(2, 1)), Vec4::new(2.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn sample_interpolates_between_centres() {
        let texture = ramp();
        let uv = (texture.uv(1, 0) + texture.uv(2, 0)) * 0.5;
        assert!((texture.sample(uv).x - 1.5).abs() < 1e-6);
    }

    #[test]
    fn sampling_clamps_to_edge() {
        let texture = ramp();
        assert_eq!(texture.sample(Vec2::new(-3.0, -3.0)), texture.fetch(0, 0));
        assert_eq!(texture.sample(Vec2::new(5.0, 5.0)), texture.fetch(3, 1));
    }

    #[test]
    fn format_masks_unused_channels() {
        let mut texture = Texture::new(Grid::new(2, 2).unwrap(), ChannelFormat::Rg);
        texture.clear(Vec4::ONE);
        assert_eq!(texture.fetch(1, 1), Vec4::new(1.0, 1.0, 0.0, 0.0));
    }
}
