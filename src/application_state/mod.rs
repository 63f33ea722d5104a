//! # Application State Management
//!
//! Drives the engine from the winit event loop:
//! - the window and GPU context are built when the loop resumes
//! - every redraw runs one engine tick and presents it
//! - resize events reach the surface and the camera projection
//! - close, Escape or the configured frame count end the loop

pub mod graphics_resources_builder;

use std::sync::Arc;

use graphics_resources_builder::{Graphics, GraphicsBuilder};
use log::{error, info};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::{
    config::EngineConfig,
    engine_state::{rendering::WgpuContext, EngineState},
    error::{EngineError, EngineResult},
    log_stats,
};

/// The engine running in a window.
pub struct InitializedApplicationState {
    pub engine_state: EngineState<WgpuContext>,
    pub window: Arc<Window>,
    /// Start of the previous frame, for delta time.
    pub last_frame_time: web_time::Instant,
}

/// Event loop handler owning the engine once the graphics are ready.
pub struct ApplicationState {
    config: EngineConfig,
    builder: GraphicsBuilder,
    state: Option<InitializedApplicationState>,
    outcome: EngineResult<()>,
}

impl ApplicationState {
    pub fn new(config: EngineConfig, event_loop_proxy: EventLoopProxy<Graphics>) -> Self {
        Self {
            config,
            builder: GraphicsBuilder::new(event_loop_proxy),
            state: None,
            outcome: Ok(()),
        }
    }

    /// The first fatal error, if the loop stopped because of one.
    pub fn finish(self) -> EngineResult<()> {
        self.outcome
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: EngineError) {
        error!("{err}");
        if self.outcome.is_ok() {
            self.outcome = Err(err);
        }
        event_loop.exit();
    }

    fn start(&mut self, event_loop: &ActiveEventLoop, graphics: Graphics) {
        let Graphics { window, context } = graphics;
        let engine_state = match context.and_then(|context| EngineState::new(&self.config, context)) {
            Ok(engine_state) => engine_state,
            Err(err) => return self.fail(event_loop, err),
        };

        let mut state = InitializedApplicationState {
            engine_state,
            window,
            last_frame_time: web_time::Instant::now(),
        };
        let size = state.window.inner_size();
        state.engine_state.resize(size.width, size.height);
        state.window.request_redraw();
        info!("Engine started");
        self.state = Some(state);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = &mut self.state else {
            return;
        };
        let now = web_time::Instant::now();
        let dt = now - state.last_frame_time;
        state.last_frame_time = now;

        let engine = &mut state.engine_state;
        let report = match engine.tick(dt) {
            Ok(report) => report,
            Err(err) => return self.fail(event_loop, err),
        };
        if self.config.stats_interval > 0 && engine.frame() % self.config.stats_interval == 0 {
            log_stats(engine.frame(), &report, engine.chunks.pending(), engine.scene.len());
        }
        if self.config.frames.is_some_and(|frames| engine.frame() >= frames) {
            info!("Finished after {} frames", engine.frame());
            event_loop.exit();
        }
    }
}

impl ApplicationHandler<Graphics> for ApplicationState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.builder.build_and_send(event_loop, &self.config) {
            self.fail(event_loop, err);
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, graphics: Graphics) {
        self.start(event_loop, graphics);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    state.engine_state.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),
            _ => (),
        }
    }

    /// Keeps frames coming; presentation paces them.
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}
