/// requestAnimationFrame driver for a render session
use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlCanvasElement;

use gridview_core::{CancelToken, RenderError, RenderSession, SurfaceSize, TickOutcome};

use crate::backend::WebGlBackend;

/// Drawing-buffer size for a canvas laid out at `client` CSS pixels.
///
/// A canvas with no layout box keeps its current buffer size.
pub fn fit_surface(client: (i32, i32), current: (u32, u32)) -> SurfaceSize {
    match (u32::try_from(client.0), u32::try_from(client.1)) {
        (Ok(width), Ok(height)) if width > 0 && height > 0 => SurfaceSize::new(width, height),
        _ => SurfaceSize::new(current.0, current.1),
    }
}

struct LoopState {
    gl: WebGlBackend,
    session: Option<RenderSession<WebGlBackend>>,
    canvas: HtmlCanvasElement,
    cancel: CancelToken,
    resize_pending: bool,
    frames: u64,
}

impl LoopState {
    fn step(&mut self) -> TickOutcome {
        let Some(session) = self.session.as_mut() else {
            return TickOutcome::Stop;
        };

        if std::mem::take(&mut self.resize_pending) {
            let surface = fit_surface(
                (self.canvas.client_width(), self.canvas.client_height()),
                (self.canvas.width(), self.canvas.height()),
            );
            self.canvas.set_width(surface.width);
            self.canvas.set_height(surface.height);
            session.resize(&mut self.gl, surface);
        }

        let outcome = session.tick(&mut self.gl, &self.cancel);
        self.frames = session.frames();
        outcome
    }

    fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.dispose(&mut self.gl);
            tracing::info!(frames = self.frames, "render loop stopped");
        }
    }
}

fn window() -> Result<web_sys::Window, RenderError> {
    web_sys::window().ok_or_else(|| RenderError::ContextUnavailable("no global window".to_string()))
}

fn schedule(state: Rc<RefCell<LoopState>>) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
    // One-shot closure per frame; it frees itself after running
    let callback = Closure::once_into_js(move |_timestamp: f64| frame(state));
    window.request_animation_frame(callback.unchecked_ref())?;
    Ok(())
}

fn frame(state: Rc<RefCell<LoopState>>) {
    let outcome = state.borrow_mut().step();
    match outcome {
        TickOutcome::Continue => {
            if let Err(e) = schedule(Rc::clone(&state)) {
                tracing::error!(error = ?e, "could not schedule the next frame");
                state.borrow_mut().shutdown();
            }
        }
        TickOutcome::Stop => state.borrow_mut().shutdown(),
    }
}

/// Start driving `session` once per animation frame
pub fn start(
    gl: WebGlBackend,
    session: RenderSession<WebGlBackend>,
    canvas: HtmlCanvasElement,
) -> Result<RenderHandle, RenderError> {
    let window = window()?;
    let cancel = CancelToken::new();
    let state = Rc::new(RefCell::new(LoopState {
        gl,
        session: Some(session),
        canvas,
        cancel: cancel.clone(),
        resize_pending: true,
        frames: 0,
    }));

    let weak = Rc::downgrade(&state);
    let on_resize = Closure::<dyn FnMut()>::new(move || {
        if let Some(state) = weak.upgrade() {
            if let Ok(mut state) = state.try_borrow_mut() {
                state.resize_pending = true;
            }
        }
    });
    window
        .add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())
        .map_err(|e| RenderError::ContextUnavailable(format!("{e:?}")))?;

    if let Err(e) = schedule(Rc::clone(&state)) {
        state.borrow_mut().shutdown();
        return Err(RenderError::ContextUnavailable(format!("{e:?}")));
    }

    Ok(RenderHandle {
        state,
        cancel,
        on_resize: Some(on_resize),
    })
}

/// Running render loop; dropping the handle stops it
#[wasm_bindgen]
pub struct RenderHandle {
    state: Rc<RefCell<LoopState>>,
    cancel: CancelToken,
    on_resize: Option<Closure<dyn FnMut()>>,
}

#[wasm_bindgen]
impl RenderHandle {
    /// Request a stop; the next frame releases GPU resources
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u32 {
        let frames = self.state.try_borrow().map(|s| s.frames).unwrap_or(0);
        u32::try_from(frames).unwrap_or(u32::MAX)
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .state
                .try_borrow()
                .map(|s| s.session.is_some())
                .unwrap_or(true)
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let (Some(window), Some(on_resize)) = (web_sys::window(), self.on_resize.take()) {
            let _ = window
                .remove_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref());
        }
    }
}
