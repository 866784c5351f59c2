/// Asynchronous point dataset download
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Response;

use gridview_core::{loader, LoadError, Point, RenderError};

fn network_error(resource: &str, err: JsValue) -> LoadError {
    LoadError::Network {
        resource: resource.to_string(),
        reason: err
            .as_string()
            .or_else(|| err.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
            .unwrap_or_else(|| format!("{err:?}")),
    }
}

/// `GET` `url` and decode the body as a point array.
///
/// No retry and no timeout: the first failure is final.
pub async fn fetch_points(url: &str) -> Result<Vec<Point>, RenderError> {
    let window = web_sys::window()
        .ok_or_else(|| RenderError::ContextUnavailable("no global window".to_string()))?;

    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|e| network_error(url, e))?;
    let response: Response = response
        .dyn_into()
        .map_err(|e| network_error(url, e))?;

    loader::check_status(url, response.status(), &response.status_text())?;

    let body = response.text().map_err(|e| network_error(url, e))?;
    let text = JsFuture::from(body)
        .await
        .map_err(|e| network_error(url, e))?
        .as_string()
        .unwrap_or_default();

    Ok(loader::parse_points(text.as_bytes(), url)?)
}
