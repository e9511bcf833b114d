use glam::Vec2;

use crate::renderer::{
    FullScreenQuad, GraphicsDevice, Program, RasterState, TargetDesc, TargetFormat, TargetHandle,
};
use crate::settings::BloomSettings;

/// Half resolution ping-pong pair for extract and blur.
pub(super) struct BloomTargets {
    ping: TargetHandle,
    pong: TargetHandle,
}

impl BloomTargets {
    pub fn new(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Self {
        let desc = |label| TargetDesc {
            label,
            width: (width / 2).max(1),
            height: (height / 2).max(1),
            format: TargetFormat::Rgba8,
            depth: false,
        };
        Self {
            ping: device.create_render_target(&desc("bloom ping")),
            pong: device.create_render_target(&desc("bloom pong")),
        }
    }

    pub fn dispose(&self, device: &mut dyn GraphicsDevice) {
        device.release_render_target(self.ping);
        device.release_render_target(self.pong);
    }

    /// Extract, blur horizontally, blur vertically, then combine with
    /// `source` into `output`.
    pub fn apply(
        &self,
        device: &mut dyn GraphicsDevice,
        source: TargetHandle,
        output: Option<TargetHandle>,
        settings: &BloomSettings,
    ) {
        device.set_render_targets(&[self.ping]);
        FullScreenQuad::draw(
            device,
            Program::BloomExtract {
                source,
                threshold: settings.threshold,
            },
            RasterState::FULLSCREEN,
        );

        device.set_render_targets(&[self.pong]);
        FullScreenQuad::draw(
            device,
            Program::GaussianBlur {
                source: self.ping,
                direction: Vec2::X,
                blur_amount: settings.blur_amount,
            },
            RasterState::FULLSCREEN,
        );

        device.set_render_targets(&[self.ping]);
        FullScreenQuad::draw(
            device,
            Program::GaussianBlur {
                source: self.pong,
                direction: Vec2::Y,
                blur_amount: settings.blur_amount,
            },
            RasterState::FULLSCREEN,
        );

        match output {
            Some(target) => device.set_render_targets(&[target]),
            None => device.set_render_targets(&[]),
        }
        FullScreenQuad::draw(
            device,
            Program::BloomCombine {
                base: source,
                bloom: self.ping,
                bloom_intensity: settings.bloom_intensity,
                base_intensity: settings.base_intensity,
                bloom_saturation: settings.bloom_saturation,
                base_saturation: settings.base_saturation,
            },
            RasterState::FULLSCREEN,
        );
    }
}
