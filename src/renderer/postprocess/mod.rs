// renderer/postprocess/mod.rs
//
// Compose plus optional FXAA and bloom. The stage order is fixed per flag
// combination: anti-aliasing always runs on the un-bloomed composite and bloom
// is always last.

mod bloom;

use bitflags::bitflags;
use glam::Vec3;

use crate::renderer::{
    FullScreenQuad, GBuffer, GraphicsDevice, Program, RasterState, TargetDesc, TargetFormat,
    TargetHandle,
};
use crate::settings::BloomSettings;

use bloom::BloomTargets;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PostEffects: u8 {
        const FXAA = 0b01;
        const BLOOM = 0b10;
    }
}

impl PostEffects {
    pub fn from_flags(fxaa: bool, bloom: bool) -> Self {
        let mut effects = PostEffects::empty();
        effects.set(PostEffects::FXAA, fxaa);
        effects.set(PostEffects::BLOOM, bloom);
        effects
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostStage {
    Compose,
    Fxaa,
    Bloom,
}

/// Where a stage wrote. `None` is the presentation target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: PostStage,
    pub output: Option<TargetHandle>,
}

/// The stage sequence for a flag combination.
pub fn stage_order(effects: PostEffects) -> &'static [PostStage] {
    match (
        effects.contains(PostEffects::FXAA),
        effects.contains(PostEffects::BLOOM),
    ) {
        (false, false) => &[PostStage::Compose],
        (true, false) => &[PostStage::Compose, PostStage::Fxaa],
        (false, true) => &[PostStage::Compose, PostStage::Bloom],
        (true, true) => &[PostStage::Compose, PostStage::Fxaa, PostStage::Bloom],
    }
}

pub struct PostProcessChain {
    effects: PostEffects,
    bloom_settings: BloomSettings,
    intermediate: [TargetHandle; 2],
    bloom: BloomTargets,
    last_run: Vec<StageRecord>,
}

impl PostProcessChain {
    pub fn new(
        device: &mut dyn GraphicsDevice,
        width: u32,
        height: u32,
        effects: PostEffects,
        bloom_settings: BloomSettings,
    ) -> Self {
        Self {
            effects,
            bloom_settings,
            intermediate: Self::allocate(device, width, height),
            bloom: BloomTargets::new(device, width, height),
            last_run: Vec::with_capacity(3),
        }
    }

    fn allocate(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> [TargetHandle; 2] {
        let desc = |label| TargetDesc {
            label,
            width,
            height,
            format: TargetFormat::Rgba8,
            depth: false,
        };
        [
            device.create_render_target(&desc("post intermediate a")),
            device.create_render_target(&desc("post intermediate b")),
        ]
    }

    /// Recreates every intermediate target at the new size.
    pub fn create(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) {
        self.dispose(device);
        self.intermediate = Self::allocate(device, width, height);
        self.bloom = BloomTargets::new(device, width, height);
    }

    pub fn dispose(&self, device: &mut dyn GraphicsDevice) {
        for target in self.intermediate {
            device.release_render_target(target);
        }
        self.bloom.dispose(device);
    }

    pub fn effects(&self) -> PostEffects {
        self.effects
    }

    pub fn set_effects(&mut self, effects: PostEffects) {
        self.effects = effects;
    }

    pub fn bloom_settings(&self) -> &BloomSettings {
        &self.bloom_settings
    }

    pub fn set_bloom_settings(&mut self, settings: BloomSettings) {
        self.bloom_settings = settings;
    }

    /// Stages executed by the most recent `run`, in order.
    pub fn last_run(&self) -> &[StageRecord] {
        &self.last_run
    }

    /// Composes the G-buffer and applies the enabled effects, ending on the
    /// back buffer.
    pub fn run(
        &mut self,
        device: &mut dyn GraphicsDevice,
        gbuffer: &GBuffer,
        ambient_colour: Vec3,
        ambient_intensity: f32,
    ) {
        self.last_run.clear();
        let stages = stage_order(self.effects);
        let mut source = None;

        for (index, stage) in stages.iter().enumerate() {
            let output = if index + 1 == stages.len() {
                None
            } else {
                Some(self.intermediate[index % 2])
            };

            match stage {
                PostStage::Compose => {
                    gbuffer.compose_final(device, output, ambient_colour, ambient_intensity);
                }
                PostStage::Fxaa => {
                    let Some(input) = source else { continue };
                    bind(device, output);
                    FullScreenQuad::draw(
                        device,
                        Program::Fxaa { source: input },
                        RasterState::FULLSCREEN,
                    );
                }
                PostStage::Bloom => {
                    let Some(input) = source else { continue };
                    self.bloom.apply(device, input, output, &self.bloom_settings);
                }
            }

            self.last_run.push(StageRecord {
                stage: *stage,
                output,
            });
            source = output;
        }
    }
}

fn bind(device: &mut dyn GraphicsDevice, output: Option<TargetHandle>) {
    match output {
        Some(target) => device.set_render_targets(&[target]),
        None => device.set_render_targets(&[]),
    }
}
