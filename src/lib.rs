pub mod asset;
pub mod demo_scenes;
pub mod error;
pub mod math;
pub mod renderer;
pub mod scene;
pub mod settings;

#[cfg(feature = "gpu")]
pub mod app;

pub use error::{EngineError, Result};
pub use renderer::{GraphicsDevice, Renderer, SoftDevice};
pub use scene::Scene;
pub use settings::RenderSettings;

/// Installs `env_logger` with an `Info` default, overridable through
/// `RUST_LOG`. Calling it twice is harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

#[cfg(feature = "gpu")]
pub fn run(settings: RenderSettings) -> std::result::Result<(), winit::error::EventLoopError> {
    init_logging();
    log::info!("Starting deep-engine preview");

    let event_loop = winit::event_loop::EventLoop::new()?;
    let mut app = app::App::new(settings);
    let result = event_loop.run_app(&mut app);

    if let Err(ref err) = result {
        log::error!("Application error: {}", err);
    }
    log::info!("Application shutdown complete");
    result
}
