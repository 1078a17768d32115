use nalgebra::Vector3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn scaled(self, s: f32) -> Self {
        Self::new(self.r * s, self.g * s, self.b * s, self.a * s)
    }
}

/// Something drawn as a textured billboard in a given sky direction.
#[derive(Clone, Debug, PartialEq)]
pub struct Sprite {
    pub name: String,
    /// Unit vector
    pub direction: Vector3<f64>,
    pub color: Color,
    pub scale: f64,
    pub magnitude: f64,
    /// Texture file name, resolved by the renderer
    pub texture: &'static str,
}
