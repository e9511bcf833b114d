// renderer/material.rs

use glam::{Vec3, Vec4};

use crate::asset::texture::NULL_TEXTURE_KEY;

/// Upper end of the specular band in the colour W channel.
pub const SPECULAR_BAND_MAX: f32 = 0.49;
/// Start of the emissive band in the colour W channel.
pub const EMISSIVE_BAND_MIN: f32 = 0.5;

/// Surface description written into the colour/normal targets.
///
/// `colour.w` packs either a specular amount (0.0 to 0.49) or an emissive
/// amount (0.5 to 1.0), never both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub texture_key: u32,
    pub colour: Vec4,
    pub specular_power: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self::white()
    }
}

impl Material {
    /// Untextured diffuse white with no specular.
    pub const fn white() -> Self {
        Self {
            texture_key: NULL_TEXTURE_KEY,
            colour: Vec4::new(1.0, 1.0, 1.0, 0.0),
            specular_power: 0.0,
        }
    }

    pub fn textured(texture_key: u32) -> Self {
        Self {
            texture_key,
            ..Self::white()
        }
    }

    pub fn with_tint(mut self, tint: Vec3) -> Self {
        self.colour = tint.extend(self.colour.w);
        self
    }

    /// `amount` in 0..=1 maps onto the specular band.
    pub fn with_specular(mut self, amount: f32, power: f32) -> Self {
        self.colour.w = amount.clamp(0.0, 1.0) * SPECULAR_BAND_MAX;
        self.specular_power = power.clamp(0.0, 255.0);
        self
    }

    /// `amount` in 0..=1 maps onto the emissive band.
    pub fn with_emissive(mut self, amount: f32) -> Self {
        self.colour.w = EMISSIVE_BAND_MIN + amount.clamp(0.0, 1.0) * (1.0 - EMISSIVE_BAND_MIN);
        self
    }

    pub fn specular_amount(&self) -> f32 {
        decode_specular(self.colour.w)
    }

    pub fn emissive_amount(&self) -> f32 {
        decode_emissive(self.colour.w)
    }

    /// Identity used to group static geometry into batches.
    pub fn key(&self) -> MaterialKey {
        MaterialKey {
            texture_key: self.texture_key,
            colour: self.colour.to_array().map(f32::to_bits),
            specular_power: self.specular_power.to_bits(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialKey {
    texture_key: u32,
    colour: [u32; 4],
    specular_power: u32,
}

pub fn decode_specular(w: f32) -> f32 {
    if w < EMISSIVE_BAND_MIN {
        (w / SPECULAR_BAND_MAX).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn decode_emissive(w: f32) -> f32 {
    if w >= EMISSIVE_BAND_MIN {
        ((w - EMISSIVE_BAND_MIN) / (1.0 - EMISSIVE_BAND_MIN)).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
