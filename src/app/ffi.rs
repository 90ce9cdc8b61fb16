use bytemuck::{Pod, Zeroable};
use glam::Vec4;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DisplayPixel {
    // plain bytes, laid out as TextureFormat::Rgba8Unorm expects
    pub rgba: [u8; 4],
}

impl DisplayPixel {
    pub const BLACK: Self = Self { rgba: [0, 0, 0, 255] };

    pub fn from_linear(color: Vec4) -> Self {
        let c = color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
        Self {
            rgba: [c.x as u8, c.y as u8, c.z as u8, 255],
        }
    }

    // additive blend, saturating per channel
    pub fn add(&mut self, color: Vec4) {
        let c = color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
        for (channel, value) in self.rgba.iter_mut().zip([c.x, c.y, c.z]) {
            *channel = channel.saturating_add(value as u8);
        }
    }
}
