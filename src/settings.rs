use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub present_mode: PresentModeSetting,
    #[serde(default)]
    pub fxaa: bool,
    #[serde(default)]
    pub bloom: bool,
    #[serde(default)]
    pub bloom_settings: BloomSettings,
    #[serde(default = "RenderSettings::default_ambient_colour")]
    pub ambient_colour: [f32; 3],
    #[serde(default = "RenderSettings::default_ambient_intensity")]
    pub ambient_intensity: f32,
    #[serde(default = "RenderSettings::default_clear_colour")]
    pub clear_colour: [f32; 4],
    #[serde(default)]
    pub show_debug_buffers: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            present_mode: PresentModeSetting::default(),
            fxaa: false,
            bloom: false,
            bloom_settings: BloomSettings::default(),
            ambient_colour: Self::default_ambient_colour(),
            ambient_intensity: Self::default_ambient_intensity(),
            clear_colour: Self::default_clear_colour(),
            show_debug_buffers: false,
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    pub fn validate(mut self) -> Self {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        if !(self.ambient_intensity >= 0.0) {
            warn!("Ambient intensity must not be negative. Using default value.");
            self.ambient_intensity = Self::default_ambient_intensity();
        }

        self.bloom_settings = self.bloom_settings.validate();
        self
    }

    #[cfg(feature = "gpu")]
    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = self.present_mode.to_wgpu();
        if available.contains(&desired) {
            return desired;
        }

        warn!(
            "Requested present mode {:?} is not supported. Falling back to FIFO.",
            desired
        );

        if available.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            available
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        }
    }

    const fn default_ambient_colour() -> [f32; 3] {
        [1.0, 1.0, 1.0]
    }

    const fn default_ambient_intensity() -> f32 {
        0.1
    }

    const fn default_clear_colour() -> [f32; 4] {
        [0.39, 0.58, 0.93, 0.0]
    }
}

/// Bloom parameters, defaulting to the classic "default" preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub threshold: f32,
    pub blur_amount: f32,
    pub bloom_intensity: f32,
    pub base_intensity: f32,
    pub bloom_saturation: f32,
    pub base_saturation: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            threshold: 0.25,
            blur_amount: 4.0,
            bloom_intensity: 1.25,
            base_intensity: 1.0,
            bloom_saturation: 1.0,
            base_saturation: 1.0,
        }
    }
}

impl BloomSettings {
    fn validate(mut self) -> Self {
        if !(0.0..1.0).contains(&self.threshold) {
            warn!("Bloom threshold must be in [0, 1). Using default value.");
            self.threshold = Self::default().threshold;
        }

        if !(self.blur_amount > 0.0) {
            warn!("Bloom blur amount must be greater than zero. Using default value.");
            self.blur_amount = Self::default().blur_amount;
        }

        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    #[default]
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

#[cfg(feature = "gpu")]
impl PresentModeSetting {
    fn to_wgpu(self) -> wgpu::PresentMode {
        match self {
            PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
            PresentModeSetting::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
            PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModeSetting::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModeSetting::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_settings() -> RenderSettings {
        RenderSettings {
            resolution: Resolution {
                width: 0,
                height: 0,
            },
            ambient_intensity: -1.0,
            bloom_settings: BloomSettings {
                threshold: 1.5,
                blur_amount: 0.0,
                ..BloomSettings::default()
            },
            ..RenderSettings::default()
        }
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let validated = invalid_settings().validate();
        let defaults = RenderSettings::default();

        assert_eq!(validated.resolution, defaults.resolution);
        assert_eq!(validated.ambient_intensity, defaults.ambient_intensity);
        assert_eq!(validated.bloom_settings, BloomSettings::default());
    }

    #[test]
    fn validate_preserves_valid_values() {
        let valid = RenderSettings {
            resolution: Resolution {
                width: 1920,
                height: 1080,
            },
            fxaa: true,
            bloom: true,
            ambient_intensity: 0.0,
            ..RenderSettings::default()
        };

        assert_eq!(valid.clone().validate(), valid);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{ "fxaa": true, "bloom_settings": { "threshold": 0.5 } }"#)
                .unwrap();

        assert!(settings.fxaa);
        assert!(!settings.bloom);
        assert_eq!(settings.bloom_settings.threshold, 0.5);
        assert_eq!(settings.bloom_settings.blur_amount, 4.0);
        assert_eq!(settings.ambient_colour, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let settings = RenderSettings::load_from_path("does/not/exist/settings.json");
        assert_eq!(settings, RenderSettings::default());
    }

    #[cfg(feature = "gpu")]
    #[test]
    fn present_mode_falls_back_to_fifo_when_desired_missing() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Immediate];

        assert_eq!(settings.present_mode(&available), wgpu::PresentMode::Fifo);
    }
}
