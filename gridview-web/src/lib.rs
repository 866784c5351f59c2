/// gridview web - WebGL host for the gridview render pipeline
///
/// `launch` finds the canvas, links the shader program, fetches the point
/// dataset and starts a requestAnimationFrame loop. The returned
/// `RenderHandle` stops it.
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlCanvasElement;

use gridview_core::{RenderError, RenderSession, SessionConfig, SurfaceSize};

pub mod backend;
pub mod console;
pub mod driver;
pub mod fetch;

pub use backend::WebGlBackend;
pub use driver::RenderHandle;

#[wasm_bindgen(start)]
pub fn main() {
    install_panic_hook();
    console::install(tracing::Level::INFO);
}

/// Report panics through `console.error` instead of a bare `unreachable` trap
pub fn install_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Set up and start rendering.
///
/// `config_json` is an optional JSON `SessionConfig`; missing fields take
/// their defaults. Setup errors are logged and returned as strings.
#[wasm_bindgen]
pub async fn launch(config_json: Option<String>) -> Result<RenderHandle, JsValue> {
    let config = match config_json {
        Some(json) => SessionConfig::from_json_str(&json).map_err(report)?,
        None => SessionConfig::default(),
    };
    setup(config).await.map_err(report)
}

fn report(err: RenderError) -> JsValue {
    tracing::error!(error = %err, "render setup failed");
    JsValue::from_str(&err.to_string())
}

fn find_canvas(id: &str) -> Result<HtmlCanvasElement, RenderError> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| RenderError::ContextUnavailable("no document".to_string()))?;
    document
        .get_element_by_id(id)
        .ok_or_else(|| RenderError::ContextUnavailable(format!("no element with id '{id}'")))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| RenderError::ContextUnavailable(format!("element '{id}' is not a canvas")))
}

async fn setup(config: SessionConfig) -> Result<RenderHandle, RenderError> {
    let canvas = find_canvas(&config.canvas_id)?;
    let mut gl = WebGlBackend::from_canvas(&canvas)?;
    let surface = SurfaceSize::new(canvas.width(), canvas.height());
    let data_url = config.data_path.clone();

    let setup = RenderSession::begin(&mut gl, config, surface)?;
    let points = match fetch::fetch_points(&data_url).await {
        Ok(points) => points,
        Err(e) => {
            setup.abort(&mut gl);
            return Err(e);
        }
    };
    let session = setup.attach_geometry(&mut gl, &points)?;

    driver::start(gl, session, canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_hook_install_is_idempotent() {
        install_panic_hook();
        install_panic_hook();
        // The hook only reports; unwinding still reaches the caller
        let result = std::panic::catch_unwind(|| panic!("render loop failed"));
        assert!(result.is_err());
    }
}
