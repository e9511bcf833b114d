// app.rs
use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::asset::TextureManager;
use crate::demo_scenes::build_demo_scene;
use crate::renderer::gpu::GpuDevice;
use crate::renderer::Renderer;
use crate::scene::Scene;
use crate::settings::RenderSettings;

const ORBIT_SPEED: f32 = 0.15;
const DEMO_SEED: u64 = 0x5eed;

struct State {
    window: Arc<Window>,
    device: GpuDevice,
    renderer: Renderer,
    textures: TextureManager,
    scene: Scene,
    last_frame: Instant,
}

pub struct App {
    settings: RenderSettings,
    state: Option<State>,
}

impl App {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            state: None,
        }
    }

    fn create_state(&self, event_loop: &ActiveEventLoop) -> Option<State> {
        let size = PhysicalSize::new(self.settings.resolution.width, self.settings.resolution.height);
        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title("Deep Engine Preview")
                .with_inner_size(size),
        ) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {}", err);
                return None;
            }
        };

        let mut device = match pollster::block_on(GpuDevice::new(window.clone(), &self.settings)) {
            Ok(device) => device,
            Err(err) => {
                log::error!("Failed to initialise the GPU device: {}", err);
                return None;
            }
        };

        let renderer = Renderer::new(&mut device, self.settings.clone());
        let mut textures = TextureManager::new(&mut device);
        let scene = match build_demo_scene(&mut device, &mut textures, DEMO_SEED) {
            Ok((scene, _)) => scene,
            Err(err) => {
                log::error!("Failed to build the demo scene: {}", err);
                return None;
            }
        };

        Some(State {
            window,
            device,
            renderer,
            textures,
            scene,
            last_frame: Instant::now(),
        })
    }
}

impl State {
    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.device.resize(size.width, size.height);
        self.renderer
            .on_resize(&mut self.device, size.width, size.height);
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.scene.camera_mut().orbit(dt * ORBIT_SPEED);
        self.scene.update(dt);
        for id in self.scene.collect_disposed(&mut self.device) {
            log::debug!("Entity {} disposed", id);
        }

        self.renderer
            .draw(&mut self.device, &self.textures, &self.scene);
        self.device.present();
        self.window.request_redraw();
    }

    fn handle_key(&mut self, key: NamedKey) {
        let settings = self.renderer.settings().clone();
        match key {
            NamedKey::F1 => self
                .renderer
                .set_show_debug_buffers(!settings.show_debug_buffers),
            NamedKey::F2 => self.renderer.set_fxaa(!settings.fxaa),
            NamedKey::F3 => self.renderer.set_bloom(!settings.bloom),
            _ => {}
        }
    }

    fn shutdown(&mut self) {
        self.scene.dispose(&mut self.device);
        self.renderer.dispose(&mut self.device);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.create_state(event_loop) {
            Some(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            None => event_loop.exit(),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if id != state.window.id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                state.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                state.resize(size);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = state.window.inner_size();
                state.resize(size);
            }
            WindowEvent::RedrawRequested => {
                state.redraw();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                state.shutdown();
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(key),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                state.handle_key(key);
            }
            _ => {}
        }
    }
}
