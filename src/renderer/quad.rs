use crate::renderer::{DrawCall, GeometrySource, GraphicsDevice, Program, RasterState, Rect};

/// Screen covering pass used by clears, lighting and post-processing.
///
/// The backend generates the covering triangle itself, so there is no vertex
/// buffer to own or to lose on a device reset.
pub struct FullScreenQuad;

impl FullScreenQuad {
    pub fn draw(device: &mut dyn GraphicsDevice, program: Program, raster: RasterState) {
        device.draw(&DrawCall {
            program,
            geometry: GeometrySource::FullScreen,
            raster,
            viewport: None,
        });
    }

    /// Restricted to `viewport`; used for the debug buffer thumbnails.
    pub fn draw_in(
        device: &mut dyn GraphicsDevice,
        program: Program,
        raster: RasterState,
        viewport: Rect,
    ) {
        device.draw(&DrawCall {
            program,
            geometry: GeometrySource::FullScreen,
            raster,
            viewport: Some(viewport),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::soft::SoftDevice;
    use glam::Vec4;

    #[test]
    fn covers_every_pixel() {
        let mut device = SoftDevice::new(5, 3);
        FullScreenQuad::draw(
            &mut device,
            Program::Clear {
                colour: Vec4::new(0.0, 1.0, 0.0, 1.0),
            },
            RasterState::FULLSCREEN,
        );

        for y in 0..3 {
            for x in 0..5 {
                assert_eq!(device.pixel(x, y), [0, 255, 0, 255]);
            }
        }
    }
}
