//! # Graphics Resources Builder
//!
//! Creates the window (bound to the page's canvas on the web) and the
//! `WgpuContext` presenting to it. Device acquisition is asynchronous, so the
//! result is delivered back to the event loop as a user event.

use std::sync::Arc;

#[cfg(target_family = "wasm")]
use log::error;
use winit::{
    dpi::PhysicalSize,
    event_loop::{ActiveEventLoop, EventLoopProxy},
    window::Window,
};

use crate::{
    config::EngineConfig,
    engine_state::rendering::WgpuContext,
    error::{EngineError, EngineResult},
};

/// Title of the native window.
const WINDOW_TITLE: &str = "Voxel World";

/// Id of the canvas the page provides; a canvas is appended to the body without one.
#[cfg(target_family = "wasm")]
pub const CANVAS_ID: &str = "wgpu-canvas";

/// The window and the GPU context created for it.
pub struct Graphics {
    pub window: Arc<Window>,
    pub context: EngineResult<WgpuContext>,
}

/// Opens the window, or takes over the canvas on the web.
fn create_window(event_loop: &ActiveEventLoop, config: &EngineConfig) -> EngineResult<Arc<Window>> {
    #[allow(unused_mut)]
    let mut window_attrs = Window::default_attributes()
        .with_title(WINDOW_TITLE)
        .with_inner_size(PhysicalSize::new(config.surface_width, config.surface_height));

    #[cfg(target_family = "wasm")]
    {
        use wasm_bindgen::JsCast;
        use winit::platform::web::WindowAttributesExtWebSys;

        let canvas = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id(CANVAS_ID))
            .and_then(|element| element.dyn_into::<web_sys::HtmlCanvasElement>().ok());
        window_attrs = match canvas {
            Some(canvas) => window_attrs.with_canvas(Some(canvas)),
            None => window_attrs.with_append(true),
        };
    }

    event_loop
        .create_window(window_attrs)
        .map(Arc::new)
        .map_err(|e| EngineError::Window(e.to_string()))
}

/// Builds the graphics once and sends them to the event loop.
pub struct GraphicsBuilder {
    event_loop_proxy: Option<EventLoopProxy<Graphics>>,
}

impl GraphicsBuilder {
    /// # Arguments
    /// * `event_loop_proxy` - Delivers the finished `Graphics` as a user event
    pub fn new(event_loop_proxy: EventLoopProxy<Graphics>) -> Self {
        Self {
            event_loop_proxy: Some(event_loop_proxy),
        }
    }

    /// Creates the window and starts acquiring the GPU context for it.
    ///
    /// Natively the context is built before this returns; on the web it is built on
    /// the browser's task queue. Calls after the first are ignored.
    ///
    /// # Returns
    /// An error if the window cannot be created or the event loop is gone.
    pub fn build_and_send(
        &mut self,
        event_loop: &ActiveEventLoop,
        config: &EngineConfig,
    ) -> EngineResult<()> {
        let Some(event_loop_proxy) = self.event_loop_proxy.take() else {
            return Ok(());
        };

        let window = create_window(event_loop, config)?;
        let context = WgpuContext::new(window.clone());

        #[cfg(target_family = "wasm")]
        {
            wasm_bindgen_futures::spawn_local(async move {
                let graphics = Graphics {
                    window,
                    context: context.await,
                };
                if event_loop_proxy.send_event(graphics).is_err() {
                    error!("Event loop closed before the graphics were ready");
                }
            });
        }

        #[cfg(not(target_family = "wasm"))]
        {
            let graphics = Graphics {
                window,
                context: pollster::block_on(context),
            };
            event_loop_proxy
                .send_event(graphics)
                .map_err(|_| EngineError::Window("event loop closed".to_owned()))?;
        }

        Ok(())
    }
}
