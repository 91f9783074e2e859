use std::sync::Arc;

use clap::Parser;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use orbit_scene::cli::Cli;
use orbit_scene::config::SceneConfig;
use orbit_scene::core::{
    AnimationLoop, AssetQueue, Clock, ControlPanel, InputRouter, LoopState, Reschedule, WinitInput,
};
use orbit_scene::loaders::FileLoader;
use orbit_scene::renderer::WgpuRenderer;
use orbit_scene::scene::SceneGraph;
use orbit_scene::scenes::{create_panel, create_scene};

// === Constants ===

const INITIAL_WINDOW_WIDTH: u32 = 1280;
const INITIAL_WINDOW_HEIGHT: u32 = 800;

struct App {
    show_ui: bool,
    scene: SceneGraph,
    assets: AssetQueue,
    router: InputRouter,
    input: WinitInput,
    panel: ControlPanel,
    frame_loop: AnimationLoop<Clock>,
    window: Option<Arc<Window>>,
    renderer: Option<WgpuRenderer>,
}

impl App {
    fn new(cli: &Cli, config: &SceneConfig) -> Self {
        let setup = create_scene(config);
        let mut panel = create_panel(config, &setup.lights);
        panel.visible = !cli.no_ui;

        let mut assets = AssetQueue::new(Arc::new(FileLoader));
        for request in setup.requests {
            assets.request(request);
        }

        Self {
            show_ui: !cli.no_ui,
            scene: setup.scene,
            assets,
            router: InputRouter::new(config.scroll.clone(), config.orbit.clone()),
            input: WinitInput::default(),
            panel,
            frame_loop: AnimationLoop::new(Clock::new(), &config.spin, &config.particles),
            window: None,
            renderer: None,
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) else {
            return;
        };

        if self.show_ui {
            let panel = &mut self.panel;
            let scene = &mut self.scene;
            renderer.prepare_ui(|ctx| panel.show(ctx, scene));
        }

        match self
            .frame_loop
            .frame(&mut self.scene, &mut self.assets, &mut self.router, renderer)
        {
            Ok(Reschedule::NextFrame) => window.request_redraw(),
            Ok(Reschedule::Stop) => event_loop.exit(),
            Err(e) => {
                log::error!("Frame skipped: {}", e);
                // A rejected call leaves a live loop scheduled; keep it ticking
                if self.frame_loop.state() == LoopState::Scheduled {
                    window.request_redraw();
                }
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title("Orbit Scene")
                .with_inner_size(winit::dpi::LogicalSize::new(
                    INITIAL_WINDOW_WIDTH,
                    INITIAL_WINDOW_HEIGHT,
                )),
        ) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let mut renderer = match pollster::block_on(WgpuRenderer::new(window.clone())) {
            Ok(r) => r,
            Err(e) => {
                log::error!("Failed to initialize renderer: {:#}", e);
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        self.input = WinitInput::new(window.scale_factor(), (size.width, size.height));
        let (width, height) = self.input.logical_size();
        self.router.resize(
            &mut self.scene,
            &mut renderer,
            width,
            height,
            window.scale_factor() as f32,
        );

        if let Err(e) = self.frame_loop.start(&mut self.scene) {
            log::error!("Failed to start animation loop: {}", e);
            event_loop.exit();
            return;
        }

        window.request_redraw();
        self.window = Some(window);
        self.renderer = Some(renderer);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        // Let egui handle the event first
        if self.show_ui {
            if let Some(renderer) = &mut self.renderer {
                if renderer.handle_event(&event) {
                    return;
                }
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                self.frame_loop.stop_token().stop();
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            event => {
                if let Some(renderer) = &mut self.renderer {
                    self.input
                        .process_event(&event, &mut self.router, &mut self.scene, renderer);
                }
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.no_ui { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let config = SceneConfig::from_cli(&cli)?;

    let event_loop = EventLoop::new()?;
    let mut app = App::new(&cli, &config);

    println!("Orbit Scene - Controls: drag to orbit, right-drag to pan, wheel to scroll, ctrl+wheel to zoom");
    event_loop.run_app(&mut app)?;

    Ok(())
}
