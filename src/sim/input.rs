use bevy::prelude::Resource;
use glam::Vec2;

/// Where the pointer state comes from each tick.
pub trait PointerSource {
    fn just_pressed(&self) -> bool;
    fn just_released(&self) -> bool;
    /// Normalised viewport position, `None` while the pointer is outside.
    fn position(&self) -> Option<Vec2>;
}

/// Pointer state consumed by the force and dye passes.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct InputState {
    current: Vec2,
    previous: Vec2,
    button_down: bool,
    has_position: bool,
}

impl InputState {
    pub fn current(&self) -> Vec2 {
        self.current
    }

    pub fn previous(&self) -> Vec2 {
        self.previous
    }

    pub fn is_button_down(&self) -> bool {
        self.button_down
    }

    pub fn press(&mut self) {
        self.button_down = true;
    }

    pub fn release(&mut self) {
        self.button_down = false;
    }

    // last tick's position becomes `previous`; the very first sample fills both
    pub fn move_to(&mut self, position: Vec2) {
        if self.has_position {
            self.previous = self.current;
        } else {
            self.previous = position;
            self.has_position = true;
        }
        self.current = position;
    }

    /// Once per tick, before the fluid step.
    pub fn poll(&mut self, source: &impl PointerSource) {
        if source.just_pressed() {
            self.press();
        }
        if source.just_released() {
            self.release();
        }
        match source.position() {
            Some(position) => self.move_to(position),
            // pointer left the viewport: hold still so no drag is injected
            None => self.previous = self.current,
        }
    }
}

/// Pixel position (origin bottom-left) to the square fluid domain.
/// x is aspect corrected so the domain spans the viewport height.
pub fn normalize_pointer(pixel: Vec2, viewport: Vec2) -> Vec2 {
    let aspect = viewport.x / viewport.y;
    Vec2::new(pixel.x * aspect / viewport.x, pixel.y / viewport.y)
}
